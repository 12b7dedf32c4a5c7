use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::ChannelTag;

/// Graph object id assigned by PipeWire. Only meaningful inside the
/// [`Snapshot`] that produced it; PipeWire reuses and reassigns ids freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PortId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<u32> for PortId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Port direction. `Source` ports emit audio (PipeWire "out"),
/// `Destination` ports receive it (PipeWire "in").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Source,
    Destination,
}

impl Direction {
    pub fn from_pipewire(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "out" | "output" => Some(Self::Source),
            "in" | "input" => Some(Self::Destination),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "out"),
            Self::Destination => write!(f, "in"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// An application playback stream.
    AppStream,
    /// A capture device (microphone, line in). Monitor sources excluded.
    CaptureSource,
    /// An output sink other than the hub. Selectable as tap input and output.
    Sink,
    /// The shared hub sink, identified by its fixed name.
    HubSink,
    /// Everything else; present in the snapshot, never an endpoint.
    Other,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AppStream => "stream",
            Self::CaptureSource => "source",
            Self::Sink => "sink",
            Self::HubSink => "hub",
            Self::Other => "other",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub name: String,
    pub description: String,
    pub media_class: Option<String>,
    pub application: Option<String>,
    pub media_name: Option<String>,
    pub binary: Option<String>,
    /// Owned ports, ordered by direction then ordinal.
    pub ports: Vec<PortId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub id: PortId,
    pub node_id: NodeId,
    pub name: String,
    pub direction: Direction,
    pub tag: ChannelTag,
    /// Position among the node's ports of the same direction.
    pub ordinal: u32,
}

impl Port {
    /// Monitor ports expose what a sink is currently playing.
    pub fn is_monitor(&self) -> bool {
        self.name.starts_with("monitor_") || self.name.starts_with("monitor.")
    }
}

/// An observed link. Links are mirrored from the graph, never invented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Link {
    pub source: PortId,
    pub destination: PortId,
}

impl Link {
    pub fn new(source: PortId, destination: PortId) -> Self {
        Self { source, destination }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.destination)
    }
}

/// Point-in-time view of the graph. Replaced wholesale on every read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub(crate) hub_name: String,
    pub(crate) nodes: BTreeMap<NodeId, Node>,
    pub(crate) ports: BTreeMap<PortId, Port>,
    pub(crate) links: BTreeSet<Link>,
}

impl Snapshot {
    pub fn hub_name(&self) -> &str {
        &self.hub_name
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn port(&self, id: PortId) -> Option<&Port> {
        self.ports.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.values()
    }

    pub fn links(&self) -> &BTreeSet<Link> {
        &self.links
    }

    pub fn has_link(&self, link: &Link) -> bool {
        self.links.contains(link)
    }

    pub fn find_node_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes.values().find(|n| n.name == name)
    }

    /// Ports of `node` in `direction`, ordered by ordinal.
    pub fn ports_of(&self, node: NodeId, direction: Direction) -> Vec<&Port> {
        self.nodes
            .get(&node)
            .map(|n| {
                n.ports
                    .iter()
                    .filter_map(|id| self.ports.get(id))
                    .filter(|p| p.direction == direction)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn hub(&self) -> Option<&Node> {
        self.nodes.values().find(|n| n.kind == NodeKind::HubSink)
    }

    /// Ports the hub receives on.
    pub fn hub_feed_ports(&self) -> Vec<&Port> {
        self.hub()
            .map(|hub| self.ports_of(hub.id, Direction::Destination))
            .unwrap_or_default()
    }

    /// Ports that carry what is playing into the hub. Falls back to every
    /// hub source port when none carry the monitor prefix.
    pub fn hub_monitor_ports(&self) -> Vec<&Port> {
        match self.hub() {
            Some(hub) => self.monitor_ports_of(hub),
            None => Vec::new(),
        }
    }

    pub(crate) fn monitor_ports_of(&self, sink: &Node) -> Vec<&Port> {
        let outs = self.ports_of(sink.id, Direction::Source);
        let monitors: Vec<&Port> = outs.iter().copied().filter(|p| p.is_monitor()).collect();
        if monitors.is_empty() {
            outs
        } else {
            monitors
        }
    }

    /// Distinct channel tags among a node's ports, or the port count when
    /// none of them is tagged.
    pub fn channel_count(&self, node: NodeId, direction: Direction) -> usize {
        let ports = self.ports_of(node, direction);
        let tags: BTreeSet<ChannelTag> = ports.iter().map(|p| p.tag).filter(|t| t.is_known()).collect();
        if tags.is_empty() {
            ports.len()
        } else {
            tags.len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
