//! Commands emitted by reconciliation and their per-command outcomes.

use std::fmt;

use serde::Serialize;
use siphon_graph::{ChannelTag, Direction, EndpointId, HubLayout, NodeId, PortId};

/// A port a command refers to.
///
/// `PendingHub` names a port of a hub that does not exist yet; the executor
/// resolves it once the hub has been created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PortRef {
    Live(PortId),
    PendingHub {
        direction: Direction,
        tag: ChannelTag,
        ordinal: u32,
    },
}

impl PortRef {
    pub fn live(&self) -> Option<PortId> {
        match self {
            Self::Live(id) => Some(*id),
            Self::PendingHub { .. } => None,
        }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live(id) => write!(f, "{}", id),
            Self::PendingHub { direction, tag, ordinal } => write!(f, "hub:{}:{}#{}", direction, tag, ordinal),
        }
    }
}

/// How this process came to be responsible for the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum HubOwnership {
    /// Created by us; unloading `module_id` removes it.
    Owned { module_id: u32 },
    /// Pre-existing hub taken over because `hub.adopt_existing` is set.
    Adopted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum Command {
    CreateHub {
        name: String,
        description: String,
        layout: HubLayout,
    },
    CreateLink {
        endpoint: EndpointId,
        source: PortRef,
        destination: PortRef,
    },
    /// `endpoint` is `None` for hub links torn down only because the hub is
    /// going away.
    DestroyLink {
        endpoint: Option<EndpointId>,
        source: PortId,
        destination: PortId,
    },
    DestroyHub {
        node: NodeId,
        ownership: HubOwnership,
    },
}

impl Command {
    /// Whether executing this needs a hub created earlier in the same list.
    pub fn depends_on_hub_create(&self) -> bool {
        match self {
            Self::CreateLink { source, destination, .. } => source.live().is_none() || destination.live().is_none(),
            _ => false,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateHub { name, layout, .. } => {
                let tags: Vec<String> = layout.tags().iter().map(|t| t.to_string()).collect();
                write!(f, "create hub {} [{}]", name, tags.join(","))
            }
            Self::CreateLink {
                endpoint,
                source,
                destination,
            } => write!(f, "link   {} -> {}  ({})", source, destination, endpoint),
            Self::DestroyLink {
                endpoint,
                source,
                destination,
            } => match endpoint {
                Some(ep) => write!(f, "unlink {} -> {}  ({})", source, destination, ep),
                None => write!(f, "unlink {} -> {}  (hub)", source, destination),
            },
            Self::DestroyHub { node, .. } => write!(f, "destroy hub node {}", node),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    LinkCommand,
    HubLifecycle,
    ToolUnresponsive,
    ToolUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The hub-create this command needed did not succeed.
    DependencyFailed,
    /// A pending hub port had no counterpart on the created hub.
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum Outcome {
    Applied,
    Failed { kind: FailureKind, message: String },
    Skipped { reason: SkipReason },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied => write!(f, "ok"),
            Self::Failed { kind, message } => write!(f, "FAILED ({:?}): {}", kind, message),
            Self::Skipped { reason } => write!(f, "skipped ({:?})", reason),
        }
    }
}

/// Result of one apply cycle, one entry per command in issue order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub outcomes: Vec<(Command, Outcome)>,
}

impl ApplyReport {
    pub fn push(&mut self, command: Command, outcome: Outcome) {
        self.outcomes.push((command, outcome));
    }

    pub fn applied(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Applied))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped { .. }))
    }

    /// Nothing failed and nothing was skipped.
    pub fn is_clean(&self) -> bool {
        self.failed() == 0 && self.skipped() == 0
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}
