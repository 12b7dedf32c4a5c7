//! Selectable endpoints: logical handles onto a node's relevant port group.
//!
//! An [`EndpointId`] is a non-owning key. It is resolved against whichever
//! [`Snapshot`] is current, and a miss simply means the endpoint is absent.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Direction, Node, NodeId, NodeKind, Port, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    /// Application playback stream feeding the hub.
    AppStream,
    /// Capture device feeding the hub.
    CaptureSource,
    /// A sink's monitor feeding the hub.
    TapSink,
    /// A sink fed from the hub monitor.
    OutputSink,
}

/// Which side of the hub an endpoint sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Input,
    Output,
}

impl EndpointKind {
    pub fn role(&self) -> Role {
        match self {
            Self::AppStream | Self::CaptureSource | Self::TapSink => Role::Input,
            Self::OutputSink => Role::Output,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppStream => "stream",
            Self::CaptureSource => "source",
            Self::TapSink => "tap",
            Self::OutputSink => "sink",
        }
    }

    fn accepts(&self, kind: NodeKind) -> bool {
        matches!(
            (self, kind),
            (Self::AppStream, NodeKind::AppStream)
                | (Self::CaptureSource, NodeKind::CaptureSource)
                | (Self::TapSink, NodeKind::Sink)
                | (Self::OutputSink, NodeKind::Sink)
        )
    }
}

impl FromStr for EndpointKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stream" => Ok(Self::AppStream),
            "source" => Ok(Self::CaptureSource),
            "tap" => Ok(Self::TapSink),
            "sink" => Ok(Self::OutputSink),
            _ => Err(format!("Unknown endpoint kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EndpointId {
    pub kind: EndpointKind,
    pub node: NodeId,
}

impl EndpointId {
    pub fn new(kind: EndpointKind, node: impl Into<NodeId>) -> Self {
        Self {
            kind,
            node: node.into(),
        }
    }

    pub fn role(&self) -> Role {
        self.kind.role()
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.node)
    }
}

impl FromStr for EndpointId {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| format!("Expected <kind>:<node id>, got: {}", s))?;
        let kind: EndpointKind = kind.trim().parse()?;
        let id: u32 = id
            .trim()
            .parse()
            .map_err(|_| format!("Invalid node id in endpoint: {}", s))?;
        Ok(Self::new(kind, id))
    }
}

/// Display projection of an endpoint present in a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct Endpoint {
    pub id: EndpointId,
    pub label: String,
    pub channels: usize,
}

impl Snapshot {
    /// Resolve an endpoint to its node. `None` when the node vanished or no
    /// longer has a kind this endpoint can refer to.
    pub fn endpoint_node(&self, id: EndpointId) -> Option<&Node> {
        self.node(id.node).filter(|n| id.kind.accepts(n.kind))
    }

    pub fn contains_endpoint(&self, id: EndpointId) -> bool {
        self.endpoint_node(id).is_some()
    }

    /// The port group an endpoint refers to: source ports for inputs,
    /// destination ports for outputs. Empty when the endpoint is absent.
    pub fn endpoint_ports(&self, id: EndpointId) -> Vec<&Port> {
        let Some(node) = self.endpoint_node(id) else {
            return Vec::new();
        };

        match id.kind {
            EndpointKind::AppStream | EndpointKind::CaptureSource => {
                self.ports_of(node.id, Direction::Source)
            }
            EndpointKind::TapSink => self.tap_ports(node),
            EndpointKind::OutputSink => self.ports_of(node.id, Direction::Destination),
        }
    }

    /// Monitor ports of a sink, or the ports of its separate `.monitor`
    /// node when the sink exposes none itself.
    fn tap_ports(&self, sink: &Node) -> Vec<&Port> {
        let own: Vec<&Port> = self
            .ports_of(sink.id, Direction::Source)
            .into_iter()
            .filter(|p| p.is_monitor())
            .collect();
        if !own.is_empty() {
            return own;
        }

        self.find_node_by_name(&format!("{}.monitor", sink.name))
            .map(|monitor| self.monitor_ports_of(monitor))
            .unwrap_or_default()
    }

    /// Endpoints that may feed the hub. The hub itself never appears.
    pub fn input_endpoints(&self) -> Vec<Endpoint> {
        let mut out = Vec::new();
        for node in self.nodes() {
            let kind = match node.kind {
                NodeKind::AppStream => EndpointKind::AppStream,
                NodeKind::CaptureSource => EndpointKind::CaptureSource,
                NodeKind::Sink => EndpointKind::TapSink,
                NodeKind::HubSink | NodeKind::Other => continue,
            };
            out.push(self.describe(EndpointId::new(kind, node.id), node));
        }
        out
    }

    /// Endpoints the hub monitor may feed. The hub itself never appears.
    pub fn output_endpoints(&self) -> Vec<Endpoint> {
        self.nodes()
            .filter(|n| n.kind == NodeKind::Sink)
            .map(|n| self.describe(EndpointId::new(EndpointKind::OutputSink, n.id), n))
            .collect()
    }

    fn describe(&self, id: EndpointId, node: &Node) -> Endpoint {
        let direction = match id.role() {
            Role::Input => Direction::Source,
            Role::Output => Direction::Destination,
        };
        let channels = if id.kind == EndpointKind::TapSink {
            self.endpoint_ports(id).len()
        } else {
            self.channel_count(node.id, direction)
        };
        let label = match id.kind {
            EndpointKind::AppStream => stream_label(node),
            _ => format!("{}  [{}]  ({}ch)", node.description, node.name, channels),
        };
        Endpoint { id, label, channels }
    }
}

/// `App — media  [id N]`, or just the app when both names agree.
pub fn stream_label(node: &Node) -> String {
    let app = node
        .application
        .as_deref()
        .or(node.binary.as_deref())
        .unwrap_or("App");
    let media = node.media_name.as_deref().unwrap_or(&node.description);
    let base = if !media.is_empty() && media != app {
        format!("{} — {}", app, media)
    } else {
        app.to_string()
    };
    format!("{}  [id {}]", base, node.id)
}
