//! Sequential, best-effort execution of a command list.
//!
//! Commands run one at a time in list order. A failure is recorded and the
//! next command runs anyway; nothing already applied is rolled back. Link
//! creates that target a hub created in the same list are skipped when that
//! hub-create failed.

use std::sync::Arc;
use std::time::Duration;

use siphon_graph::{ChannelTag, Direction, GraphSource, HubLayout, NodeId, Port, PortId, Snapshot};
use tracing::{debug, info, warn};

use crate::command::{ApplyReport, Command, FailureKind, HubOwnership, Outcome, PortRef, SkipReason};
use crate::tools::{HubSink, LinkSink};

/// How long to wait for a freshly created hub to show up in the graph.
#[derive(Debug, Clone, Copy)]
pub struct HubSettle {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for HubSettle {
    fn default() -> Self {
        Self {
            attempts: 10,
            interval: Duration::from_millis(100),
        }
    }
}

/// State of the hub-create step within one execution.
enum HubCreate {
    NotAttempted,
    Failed,
    /// First snapshot in which the new hub had ports.
    Ready(Snapshot),
}

pub struct Executor {
    hub_name: String,
    graph: Arc<dyn GraphSource>,
    links: Arc<dyn LinkSink>,
    hubs: Arc<dyn HubSink>,
    settle: HubSettle,
}

impl Executor {
    pub fn new(
        hub_name: impl Into<String>,
        graph: Arc<dyn GraphSource>,
        links: Arc<dyn LinkSink>,
        hubs: Arc<dyn HubSink>,
        settle: HubSettle,
    ) -> Self {
        Self {
            hub_name: hub_name.into(),
            graph,
            links,
            hubs,
            settle,
        }
    }

    /// Run `commands` in order. `ownership` is updated as the hub is created
    /// or destroyed.
    pub async fn execute(&self, commands: Vec<Command>, ownership: &mut Option<HubOwnership>) -> ApplyReport {
        let mut report = ApplyReport::default();
        let mut hub = HubCreate::NotAttempted;

        for command in commands {
            let outcome = match &command {
                Command::CreateHub {
                    name,
                    description,
                    layout,
                } => {
                    let (outcome, state) = self.create_hub(name, description, layout, ownership).await;
                    hub = state;
                    outcome
                }
                Command::CreateLink {
                    source, destination, ..
                } => match resolve_pair(*source, *destination, &hub) {
                    Ok((s, d)) => self.create_link(s, d).await,
                    Err(reason) => Outcome::Skipped { reason },
                },
                Command::DestroyLink {
                    source, destination, ..
                } => match self.links.destroy_link(*source, *destination).await {
                    Ok(()) => Outcome::Applied,
                    Err(e) => failed(e.kind(FailureKind::LinkCommand), e),
                },
                Command::DestroyHub { node, ownership: owned } => self.destroy_hub(*node, *owned, ownership).await,
            };

            match &outcome {
                Outcome::Applied => info!(command = %command, "applied"),
                Outcome::Failed { kind, message } => warn!(command = %command, ?kind, %message, "command failed"),
                Outcome::Skipped { reason } => warn!(command = %command, ?reason, "command skipped"),
            }
            report.push(command, outcome);
        }

        report
    }

    async fn create_link(&self, source: PortId, destination: PortId) -> Outcome {
        match self.links.create_link(source, destination).await {
            Ok(()) => Outcome::Applied,
            Err(e) => failed(e.kind(FailureKind::LinkCommand), e),
        }
    }

    /// Make sure the hub exists, loading its module only when neither the
    /// graph nor `ownership` shows one already.
    async fn create_hub(
        &self,
        name: &str,
        description: &str,
        layout: &HubLayout,
        ownership: &mut Option<HubOwnership>,
    ) -> (Outcome, HubCreate) {
        if let Ok(snapshot) = self.graph.read().await {
            if !snapshot.hub_feed_ports().is_empty() {
                debug!(hub = name, "hub already present, not loading another");
                return (Outcome::Applied, HubCreate::Ready(snapshot));
            }
        }

        let current = *ownership;
        let module_id = match current {
            // Loaded earlier but not visible yet: wait for it instead.
            Some(HubOwnership::Owned { module_id }) => {
                debug!(hub = name, module_id, "hub module already loaded, waiting for it");
                module_id
            }
            _ => match self.hubs.create_hub(name, description, layout).await {
                Ok(id) => {
                    // The module exists from here on, even if the node never appears.
                    *ownership = Some(HubOwnership::Owned { module_id: id });
                    id
                }
                Err(e) => return (failed(e.kind(FailureKind::HubLifecycle), e), HubCreate::Failed),
            },
        };

        match self.wait_for_hub().await {
            Some(snapshot) => (Outcome::Applied, HubCreate::Ready(snapshot)),
            None => (
                Outcome::Failed {
                    kind: FailureKind::HubLifecycle,
                    message: format!(
                        "hub {} (module {}) did not appear after {} reads",
                        name,
                        module_id,
                        self.settle.attempts.max(1)
                    ),
                },
                HubCreate::Failed,
            ),
        }
    }

    /// Re-read the graph until the hub has feed ports.
    async fn wait_for_hub(&self) -> Option<Snapshot> {
        let attempts = self.settle.attempts.max(1);
        for attempt in 1..=attempts {
            match self.graph.read().await {
                Ok(snapshot) if !snapshot.hub_feed_ports().is_empty() => {
                    debug!(attempt, "hub ports appeared");
                    return Some(snapshot);
                }
                Ok(_) => debug!(attempt, "hub not visible yet"),
                Err(e) => debug!(attempt, error = %e, "graph read while waiting for hub failed"),
            }
            if attempt < attempts {
                tokio::time::sleep(self.settle.interval).await;
            }
        }
        None
    }

    async fn destroy_hub(&self, node: NodeId, owned: HubOwnership, ownership: &mut Option<HubOwnership>) -> Outcome {
        debug!(node = %node, "destroying hub");
        match self.hubs.destroy_hub(&self.hub_name, owned).await {
            Ok(()) => {
                *ownership = None;
                Outcome::Applied
            }
            Err(e) => failed(e.kind(FailureKind::HubLifecycle), e),
        }
    }
}

fn failed(kind: FailureKind, err: impl std::fmt::Display) -> Outcome {
    Outcome::Failed {
        kind,
        message: err.to_string(),
    }
}

fn resolve_pair(source: PortRef, destination: PortRef, hub: &HubCreate) -> Result<(PortId, PortId), SkipReason> {
    Ok((resolve(source, hub)?, resolve(destination, hub)?))
}

fn resolve(port: PortRef, hub: &HubCreate) -> Result<PortId, SkipReason> {
    match port {
        PortRef::Live(id) => Ok(id),
        PortRef::PendingHub { direction, tag, ordinal } => match hub {
            HubCreate::Ready(snapshot) => {
                resolve_hub_port(snapshot, direction, tag, ordinal).ok_or(SkipReason::Unresolved)
            }
            HubCreate::Failed => Err(SkipReason::DependencyFailed),
            HubCreate::NotAttempted => Err(SkipReason::Unresolved),
        },
    }
}

/// Find the created hub's port for a template slot: same tag first, then
/// same ordinal.
pub fn resolve_hub_port(snapshot: &Snapshot, direction: Direction, tag: ChannelTag, ordinal: u32) -> Option<PortId> {
    let ports: Vec<&Port> = match direction {
        Direction::Destination => snapshot.hub_feed_ports(),
        Direction::Source => snapshot.hub_monitor_ports(),
    };
    ports
        .iter()
        .find(|p| tag.is_known() && p.tag == tag)
        .or_else(|| ports.iter().find(|p| p.ordinal == ordinal))
        .map(|p| p.id)
}
