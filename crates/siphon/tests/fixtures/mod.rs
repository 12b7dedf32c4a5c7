//! An in-memory PipeWire graph that plays all three boundaries: it serves
//! snapshots, creates and removes links, and loads and unloads the hub.
//! Every mutation is recorded so tests can check what was issued, in order.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use siphon::{Engine, EngineOptions, HubOwnership, HubSettle, HubSink, LinkSink, Reconciler, ToolFailure};
use siphon_graph::{
    Direction, GraphSource, HubLayout, ObjectKind, PortId, RawObject, ReadFailure, Snapshot, SnapshotBuilder,
};

pub const HUB: &str = "siphon";

/// Ids handed out by the fake itself start here, clear of fixture ids.
const FIRST_DYNAMIC_ID: u32 = 1000;
const FIRST_MODULE_ID: u32 = 536870912;

#[derive(Default)]
struct State {
    objects: BTreeMap<u32, RawObject>,
    next_id: u32,
    next_module: u32,
    modules: BTreeMap<u32, u32>,
    calls: Vec<String>,
    read_fails: bool,
    read_delay: Option<Duration>,
    hub_create_fails: bool,
    /// Hub exists but reads do not show it yet.
    hub_hidden: bool,
    failing_links: BTreeMap<(u32, u32), ToolFailure>,
}

impl State {
    fn alloc(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn insert(&mut self, obj: RawObject) {
        self.objects.insert(obj.id, obj);
    }

    fn has_port(&self, id: u32) -> bool {
        self.objects.get(&id).is_some_and(|o| o.kind == ObjectKind::Port)
    }

    fn find_link(&self, out: u32, inp: u32) -> Option<u32> {
        self.objects.values().find_map(|o| {
            let is_match = o.kind == ObjectKind::Link
                && o.props.get("link.output.port") == Some(&out.to_string())
                && o.props.get("link.input.port") == Some(&inp.to_string());
            is_match.then_some(o.id)
        })
    }

    fn remove_node(&mut self, node: u32) {
        let ports: BTreeSet<String> = self
            .objects
            .values()
            .filter(|o| o.kind == ObjectKind::Port && o.props.get("node.id") == Some(&node.to_string()))
            .map(|o| o.id.to_string())
            .collect();
        self.objects.retain(|id, o| {
            if *id == node {
                return false;
            }
            match o.kind {
                ObjectKind::Port => !ports.contains(&id.to_string()),
                ObjectKind::Link => {
                    let touches = |key: &str| o.props.get(key).is_some_and(|p| ports.contains(p));
                    !touches("link.output.port") && !touches("link.input.port")
                }
                ObjectKind::Node => true,
            }
        });
    }
}

pub struct FakeGraph {
    state: Mutex<State>,
}

impl FakeGraph {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                next_id: FIRST_DYNAMIC_ID,
                next_module: FIRST_MODULE_ID,
                ..State::default()
            }),
        })
    }

    fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    /// Stereo application stream; ports `id*10+1` (FL) and `id*10+2` (FR).
    pub fn add_stream(&self, id: u32, app: &str) {
        self.with(|s| {
            s.insert(
                node(id, app, "Stream/Output/Audio")
                    .with_prop("application.name", app)
                    .with_prop("media.name", "track"),
            );
            s.insert(port(id * 10 + 1, id, 0, "output_FL", "out"));
            s.insert(port(id * 10 + 2, id, 1, "output_FR", "out"));
        });
    }

    /// Stereo sink; playback `id*10+1..2`, monitor `id*10+3..4`.
    pub fn add_sink(&self, id: u32, name: &str) {
        self.with(|s| {
            s.insert(node(id, name, "Audio/Sink").with_prop("node.description", name));
            s.insert(port(id * 10 + 1, id, 0, "playback_FL", "in"));
            s.insert(port(id * 10 + 2, id, 1, "playback_FR", "in"));
            s.insert(port(id * 10 + 3, id, 0, "monitor_FL", "out"));
            s.insert(port(id * 10 + 4, id, 1, "monitor_FR", "out"));
        });
    }

    /// Mono capture device; port `id*10+1`.
    pub fn add_mic(&self, id: u32, name: &str) {
        self.with(|s| {
            s.insert(node(id, name, "Audio/Source"));
            s.insert(port(id * 10 + 1, id, 0, "capture_MONO", "out"));
        });
    }

    pub fn add_link(&self, out: u32, inp: u32) {
        self.with(|s| {
            let id = s.alloc();
            s.insert(link(id, out, inp));
        });
    }

    pub fn remove_node(&self, id: u32) {
        self.with(|s| s.remove_node(id));
    }

    pub fn links(&self) -> BTreeSet<(u32, u32)> {
        self.snapshot_now()
            .links()
            .iter()
            .map(|l| (l.source.0, l.destination.0))
            .collect()
    }

    pub fn calls(&self) -> Vec<String> {
        self.with(|s| s.calls.clone())
    }

    pub fn clear_calls(&self) {
        self.with(|s| s.calls.clear());
    }

    pub fn set_read_fails(&self, fails: bool) {
        self.with(|s| s.read_fails = fails);
    }

    pub fn set_read_delay(&self, delay: Duration) {
        self.with(|s| s.read_delay = Some(delay));
    }

    pub fn set_hub_hidden(&self, hidden: bool) {
        self.with(|s| s.hub_hidden = hidden);
    }

    pub fn hub_count(&self) -> usize {
        self.with(|s| {
            s.objects
                .values()
                .filter(|o| o.kind == ObjectKind::Node && o.props.get("node.name").map(String::as_str) == Some(HUB))
                .count()
        })
    }

    pub fn set_hub_create_fails(&self, fails: bool) {
        self.with(|s| s.hub_create_fails = fails);
    }

    pub fn fail_link(&self, out: u32, inp: u32, failure: ToolFailure) {
        self.with(|s| {
            s.failing_links.insert((out, inp), failure);
        });
    }

    /// Hub ports as (feed, monitor) ids in channel order.
    pub fn hub_ports(&self) -> (Vec<u32>, Vec<u32>) {
        let snap = self.snapshot_now();
        let ids = |ports: Vec<&siphon_graph::Port>| ports.iter().map(|p| p.id.0).collect::<Vec<_>>();
        (ids(snap.hub_feed_ports()), ids(snap.hub_monitor_ports()))
    }

    pub fn snapshot_now(&self) -> Snapshot {
        self.with(|s| SnapshotBuilder::new(HUB).build(s.objects.values().cloned()))
    }
}

#[async_trait]
impl GraphSource for FakeGraph {
    async fn read(&self) -> Result<Snapshot, ReadFailure> {
        if let Some(delay) = self.with(|s| s.read_delay) {
            tokio::time::sleep(delay).await;
        }
        if self.with(|s| s.read_fails) {
            return Err(ReadFailure::Unavailable("pipewire is down".to_string()));
        }
        if self.with(|s| s.hub_hidden) {
            let mut hidden = self.with(|s| State {
                objects: s.objects.clone(),
                ..State::default()
            });
            for id in self.with(|s| s.modules.values().copied().collect::<Vec<_>>()) {
                hidden.remove_node(id);
            }
            return Ok(SnapshotBuilder::new(HUB).build(hidden.objects.into_values()));
        }
        Ok(self.snapshot_now())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

#[async_trait]
impl LinkSink for FakeGraph {
    async fn create_link(&self, source: PortId, destination: PortId) -> Result<(), ToolFailure> {
        self.with(|s| {
            s.calls.push(format!("link {} {}", source, destination));
            if let Some(failure) = s.failing_links.get(&(source.0, destination.0)) {
                return Err(failure.clone());
            }
            if !s.has_port(source.0) || !s.has_port(destination.0) {
                return Err(ToolFailure::Rejected("no such port".to_string()));
            }
            if s.find_link(source.0, destination.0).is_none() {
                let id = s.alloc();
                s.insert(link(id, source.0, destination.0));
            }
            Ok(())
        })
    }

    async fn destroy_link(&self, source: PortId, destination: PortId) -> Result<(), ToolFailure> {
        self.with(|s| {
            s.calls.push(format!("unlink {} {}", source, destination));
            if let Some(id) = s.find_link(source.0, destination.0) {
                s.objects.remove(&id);
            }
            Ok(())
        })
    }
}

#[async_trait]
impl HubSink for FakeGraph {
    async fn create_hub(&self, name: &str, description: &str, layout: &HubLayout) -> Result<u32, ToolFailure> {
        self.with(|s| {
            s.calls.push(format!("create-hub {}", name));
            if s.hub_create_fails {
                return Err(ToolFailure::Rejected("Module initialization failed".to_string()));
            }

            let node_id = s.alloc();
            s.insert(node(node_id, name, "Audio/Sink").with_prop("node.description", description));
            for direction in [Direction::Destination, Direction::Source] {
                for slot in layout.template(direction) {
                    let id = s.alloc();
                    s.insert(
                        port(id, node_id, slot.ordinal, &slot.name, &direction.to_string())
                            .with_prop("audio.channel", slot.tag.to_string()),
                    );
                }
            }

            let module = s.next_module;
            s.next_module += 1;
            s.modules.insert(module, node_id);
            Ok(module)
        })
    }

    async fn destroy_hub(&self, name: &str, ownership: HubOwnership) -> Result<(), ToolFailure> {
        self.with(|s| {
            s.calls.push(format!("destroy-hub {}", name));
            let node_id = match ownership {
                HubOwnership::Owned { module_id } => s.modules.remove(&module_id),
                HubOwnership::Adopted => s
                    .objects
                    .values()
                    .find(|o| o.kind == ObjectKind::Node && o.props.get("node.name").map(String::as_str) == Some(name))
                    .map(|o| o.id),
            };
            let node_id = node_id.ok_or_else(|| ToolFailure::Rejected("No such module".to_string()))?;
            s.remove_node(node_id);
            Ok(())
        })
    }
}

pub fn engine(fake: &Arc<FakeGraph>, adopt_existing: bool) -> Engine {
    Engine::new(
        Reconciler::new(HUB, "Siphon", HubLayout::default()),
        fake.clone(),
        fake.clone(),
        fake.clone(),
        EngineOptions {
            adopt_existing,
            settle: HubSettle {
                attempts: 3,
                interval: Duration::from_millis(1),
            },
        },
    )
}

fn node(id: u32, name: &str, class: &str) -> RawObject {
    RawObject::new(id, ObjectKind::Node)
        .with_prop("node.name", name)
        .with_prop("media.class", class)
}

fn port(id: u32, node: u32, local: u32, name: &str, dir: &str) -> RawObject {
    RawObject::new(id, ObjectKind::Port)
        .with_prop("node.id", node.to_string())
        .with_prop("port.id", local.to_string())
        .with_prop("port.name", name)
        .with_prop("port.direction", dir)
}

fn link(id: u32, out: u32, inp: u32) -> RawObject {
    RawObject::new(id, ObjectKind::Link)
        .with_prop("link.output.port", out.to_string())
        .with_prop("link.input.port", inp.to_string())
}
