//! The caller-facing engine.
//!
//! All mutable state (snapshot, intent, hub ownership) lives behind one
//! async mutex. Toggles take it briefly; `apply` holds it for the whole
//! read, reconcile, execute cycle, so a refresh can never land mid-apply.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use siphon_graph::{Endpoint, EndpointId, GraphSource, HubLayout, NodeId, PwDumpSource, Snapshot};
use siphonconf::{GraphSourceKind, SiphonConfig};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::apply::{Executor, HubSettle};
use crate::command::{ApplyReport, HubOwnership};
use crate::error::EngineError;
use crate::intent::{Intent, PruneReport, Selection};
use crate::reconcile::{LinkStatus, Plan, Reconciler};
use crate::tools::{HubSink, LinkSink, Pactl, PwLink};

#[derive(Debug, Default)]
struct EngineState {
    snapshot: Snapshot,
    intent: Intent,
    hub_ownership: Option<HubOwnership>,
}

struct Inner {
    state: Mutex<EngineState>,
    /// Bumped under the state lock on every intent change and apply.
    epoch: AtomicU64,
    graph: Arc<dyn GraphSource>,
    reconciler: Reconciler,
    executor: Executor,
    adopt_existing: bool,
}

/// Why a background refresh result was not installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discarded {
    /// An apply (or a toggle) held the state lock.
    Busy,
    /// The intent changed while the read was in flight.
    Stale,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointView {
    #[serde(flatten)]
    pub endpoint: Endpoint,
    pub selection: Option<Selection>,
    pub status: LinkStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointListing {
    pub inputs: Vec<EndpointView>,
    pub outputs: Vec<EndpointView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HubStatus {
    pub name: String,
    pub node: Option<NodeId>,
    pub channels: usize,
    pub requested: bool,
    pub ownership: Option<HubOwnership>,
}

/// Options that are not part of the boundaries themselves.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub adopt_existing: bool,
    pub settle: HubSettle,
}

#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl Engine {
    pub fn new(
        reconciler: Reconciler,
        graph: Arc<dyn GraphSource>,
        links: Arc<dyn LinkSink>,
        hubs: Arc<dyn HubSink>,
        options: EngineOptions,
    ) -> Self {
        let executor = Executor::new(reconciler.hub_name(), graph.clone(), links, hubs, options.settle);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(EngineState::default()),
                epoch: AtomicU64::new(0),
                graph,
                reconciler,
                executor,
                adopt_existing: options.adopt_existing,
            }),
        }
    }

    /// Engine wired to the real tools named in `config`.
    pub fn from_config(config: &SiphonConfig) -> Result<Self, EngineError> {
        let layout = HubLayout::parse(&config.hub.channels).map_err(EngineError::Config)?;
        let reconciler = Reconciler::new(&config.hub.name, &config.hub.description, layout);
        let timeout = config.tools.timeout();

        let graph: Arc<dyn GraphSource> = match config.graph.source {
            GraphSourceKind::PwDump => Arc::new(PwDumpSource::new(&config.tools.pw_dump, &config.hub.name, timeout)),
            #[cfg(feature = "native")]
            GraphSourceKind::Native => Arc::new(siphon_graph::NativeSource::new(&config.hub.name, timeout)),
            #[cfg(not(feature = "native"))]
            GraphSourceKind::Native => {
                return Err(EngineError::Config(
                    "graph.source = \"native\" requires building with the `native` feature".to_string(),
                ))
            }
        };

        let options = EngineOptions {
            adopt_existing: config.hub.adopt_existing,
            settle: HubSettle {
                attempts: config.tools.hub_settle_attempts,
                interval: config.tools.hub_settle_interval(),
            },
        };

        Ok(Self::new(
            reconciler,
            graph,
            Arc::new(PwLink::new(&config.tools.pw_link, timeout)),
            Arc::new(Pactl::new(&config.tools.pactl, timeout)),
            options,
        ))
    }

    pub fn graph(&self) -> Arc<dyn GraphSource> {
        self.inner.graph.clone()
    }

    pub fn epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::SeqCst)
    }

    fn bump_epoch(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Read the graph and replace the held snapshot. On failure the last
    /// good snapshot stays in place.
    pub async fn refresh(&self) -> Result<PruneReport, EngineError> {
        let mut state = self.inner.state.lock().await;
        let snapshot = self.inner.graph.read().await.inspect_err(|e| {
            warn!(source = self.inner.graph.name(), error = %e, "graph read failed, keeping last snapshot");
        })?;
        Ok(self.install(&mut state, snapshot))
    }

    /// Install a snapshot read outside the lock, unless an apply is running
    /// or the intent moved on since `epoch`.
    pub fn try_install(&self, snapshot: Snapshot, epoch: u64) -> Result<PruneReport, Discarded> {
        let Ok(mut state) = self.inner.state.try_lock() else {
            return Err(Discarded::Busy);
        };
        if self.epoch() != epoch {
            return Err(Discarded::Stale);
        }
        Ok(self.install(&mut state, snapshot))
    }

    fn install(&self, state: &mut EngineState, snapshot: Snapshot) -> PruneReport {
        match (snapshot.hub(), state.hub_ownership) {
            (Some(hub), None) if self.inner.adopt_existing => {
                info!(hub = %hub.name, node = %hub.id, "adopting existing hub");
                state.hub_ownership = Some(HubOwnership::Adopted);
            }
            (None, Some(HubOwnership::Adopted)) => {
                info!("adopted hub disappeared");
                state.hub_ownership = None;
            }
            _ => {}
        }

        state.snapshot = snapshot;
        state.intent.prune(&state.snapshot)
    }

    pub async fn toggle_input(&self, id: EndpointId, enabled: bool) -> Result<(), EngineError> {
        let mut state = self.inner.state.lock().await;
        state.intent.toggle_input(id, enabled)?;
        self.bump_epoch();
        debug!(endpoint = %id, enabled, "input toggled");
        Ok(())
    }

    pub async fn toggle_output(&self, id: EndpointId, enabled: bool) -> Result<(), EngineError> {
        let mut state = self.inner.state.lock().await;
        state.intent.toggle_output(id, enabled)?;
        self.bump_epoch();
        debug!(endpoint = %id, enabled, "output toggled");
        Ok(())
    }

    pub async fn set_hub_requested(&self, requested: bool) {
        let mut state = self.inner.state.lock().await;
        state.intent.set_hub_requested(requested);
        self.bump_epoch();
        debug!(requested, "hub request set");
    }

    /// Commands `apply` would issue against the held snapshot.
    pub async fn plan(&self) -> Plan {
        let state = self.inner.state.lock().await;
        self.inner
            .reconciler
            .reconcile(&state.intent, &state.snapshot, state.hub_ownership)
    }

    /// One full cycle: fresh read, prune, reconcile, execute, settle.
    ///
    /// A failed read skips the cycle and leaves all state untouched.
    /// Command failures do not make this an error; they are in the report.
    pub async fn apply(&self) -> Result<ApplyReport, EngineError> {
        let mut state = self.inner.state.lock().await;

        let snapshot = self.inner.graph.read().await.inspect_err(|e| {
            warn!(error = %e, "graph read failed, skipping apply");
        })?;
        self.install(&mut state, snapshot);

        let plan = self
            .inner
            .reconciler
            .reconcile(&state.intent, &state.snapshot, state.hub_ownership);
        info!(commands = plan.commands.len(), "applying");

        let mut ownership = state.hub_ownership;
        let report = self.inner.executor.execute(plan.commands, &mut ownership).await;
        state.hub_ownership = ownership;
        state.intent.settle(&report);

        match self.inner.graph.read().await {
            Ok(snapshot) => {
                self.install(&mut state, snapshot);
            }
            Err(e) => warn!(error = %e, "post-apply read failed"),
        }
        self.bump_epoch();

        info!(
            applied = report.applied(),
            failed = report.failed(),
            skipped = report.skipped(),
            "apply finished"
        );
        Ok(report)
    }

    pub async fn endpoints(&self) -> EndpointListing {
        let state = self.inner.state.lock().await;
        let view = |endpoint: Endpoint| EndpointView {
            selection: state.intent.selection(endpoint.id),
            status: self.inner.reconciler.link_status(&state.snapshot, endpoint.id),
            endpoint,
        };
        EndpointListing {
            inputs: state.snapshot.input_endpoints().into_iter().map(view).collect(),
            outputs: state.snapshot.output_endpoints().into_iter().map(view).collect(),
        }
    }

    pub async fn hub_status(&self) -> HubStatus {
        let state = self.inner.state.lock().await;
        let node = state.snapshot.hub().map(|h| h.id);
        HubStatus {
            name: self.inner.reconciler.hub_name().to_string(),
            node,
            channels: state.snapshot.hub_feed_ports().len(),
            requested: state.intent.hub_requested(),
            ownership: state.hub_ownership,
        }
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.inner.state.lock().await.snapshot.clone()
    }

    pub async fn intent(&self) -> Intent {
        self.inner.state.lock().await.intent.clone()
    }
}
