//! Staged user selections.
//!
//! Each endpoint is either absent (unmanaged), enabled, or disabled. A
//! disabled entry stays managed until its links are gone so that the
//! reconciler knows to tear them down.

use std::collections::BTreeMap;

use serde::Serialize;
use siphon_graph::{EndpointId, Role, Snapshot};
use tracing::info;

use crate::command::{ApplyReport, Command, Outcome};
use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Selection {
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Intent {
    inputs: BTreeMap<EndpointId, Selection>,
    outputs: BTreeMap<EndpointId, Selection>,
    hub_requested: bool,
}

/// Entries dropped because their endpoint vanished from the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    pub inputs: Vec<EndpointId>,
    pub outputs: Vec<EndpointId>,
}

impl PruneReport {
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inputs.len() + self.outputs.len()
    }
}

impl Intent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle_input(&mut self, id: EndpointId, enabled: bool) -> Result<(), EngineError> {
        if id.role() != Role::Input {
            return Err(EngineError::WrongDirection {
                endpoint: id,
                expected: Role::Input,
            });
        }
        self.inputs.insert(id, selection(enabled));
        Ok(())
    }

    pub fn toggle_output(&mut self, id: EndpointId, enabled: bool) -> Result<(), EngineError> {
        if id.role() != Role::Output {
            return Err(EngineError::WrongDirection {
                endpoint: id,
                expected: Role::Output,
            });
        }
        self.outputs.insert(id, selection(enabled));
        Ok(())
    }

    pub fn set_hub_requested(&mut self, requested: bool) {
        self.hub_requested = requested;
    }

    pub fn hub_requested(&self) -> bool {
        self.hub_requested
    }

    pub fn selection(&self, id: EndpointId) -> Option<Selection> {
        match id.role() {
            Role::Input => self.inputs.get(&id).copied(),
            Role::Output => self.outputs.get(&id).copied(),
        }
    }

    pub fn enabled_inputs(&self) -> impl Iterator<Item = EndpointId> + '_ {
        enabled(&self.inputs)
    }

    pub fn enabled_outputs(&self) -> impl Iterator<Item = EndpointId> + '_ {
        enabled(&self.outputs)
    }

    /// Enabled and disabled inputs: everything whose links are ours to touch.
    pub fn managed_inputs(&self) -> impl Iterator<Item = EndpointId> + '_ {
        self.inputs.keys().copied()
    }

    pub fn managed_outputs(&self) -> impl Iterator<Item = EndpointId> + '_ {
        self.outputs.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty() && !self.hub_requested
    }

    /// Drop entries whose endpoint is absent from `snapshot`. A recreated
    /// node gets a new id and comes back unselected.
    pub fn prune(&mut self, snapshot: &Snapshot) -> PruneReport {
        let report = PruneReport {
            inputs: vanished(&mut self.inputs, snapshot),
            outputs: vanished(&mut self.outputs, snapshot),
        };
        for id in report.inputs.iter().chain(report.outputs.iter()) {
            info!(endpoint = %id, "pruned selection for vanished endpoint");
        }
        report
    }

    /// Forget disabled entries whose link teardown fully succeeded.
    pub fn settle(&mut self, report: &ApplyReport) {
        let unfinished: Vec<EndpointId> = report
            .outcomes
            .iter()
            .filter(|(_, outcome)| !matches!(outcome, Outcome::Applied))
            .filter_map(|(command, _)| match command {
                Command::DestroyLink { endpoint, .. } => *endpoint,
                _ => None,
            })
            .collect();

        for map in [&mut self.inputs, &mut self.outputs] {
            map.retain(|id, sel| *sel == Selection::Enabled || unfinished.contains(id));
        }
    }
}

fn selection(enabled: bool) -> Selection {
    if enabled {
        Selection::Enabled
    } else {
        Selection::Disabled
    }
}

fn enabled(map: &BTreeMap<EndpointId, Selection>) -> impl Iterator<Item = EndpointId> + '_ {
    map.iter()
        .filter(|(_, sel)| **sel == Selection::Enabled)
        .map(|(id, _)| *id)
}

fn vanished(map: &mut BTreeMap<EndpointId, Selection>, snapshot: &Snapshot) -> Vec<EndpointId> {
    let gone: Vec<EndpointId> = map.keys().copied().filter(|id| !snapshot.contains_endpoint(*id)).collect();
    for id in &gone {
        map.remove(id);
    }
    gone
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{FailureKind, PortRef};
    use siphon_graph::{EndpointKind, ObjectKind, PortId, RawObject, SnapshotBuilder};

    fn stream(id: u32) -> EndpointId {
        EndpointId::new(EndpointKind::AppStream, id)
    }

    fn sink(id: u32) -> EndpointId {
        EndpointId::new(EndpointKind::OutputSink, id)
    }

    #[test]
    fn test_toggle_rejects_wrong_direction() {
        let mut intent = Intent::new();
        assert!(matches!(
            intent.toggle_input(sink(1), true),
            Err(EngineError::WrongDirection { expected: Role::Input, .. })
        ));
        assert!(intent.toggle_output(stream(1), true).is_err());
        assert!(intent.is_empty());
    }

    #[test]
    fn test_disable_keeps_entry_managed() {
        let mut intent = Intent::new();
        intent.toggle_input(stream(5), true).unwrap();
        intent.toggle_input(stream(5), false).unwrap();

        assert_eq!(intent.enabled_inputs().count(), 0);
        assert_eq!(intent.managed_inputs().collect::<Vec<_>>(), vec![stream(5)]);
        assert_eq!(intent.selection(stream(5)), Some(Selection::Disabled));
    }

    #[test]
    fn test_prune_drops_vanished_endpoints() {
        let snapshot = SnapshotBuilder::new("siphon").build(vec![RawObject::new(7, ObjectKind::Node)
            .with_prop("node.name", "mpv")
            .with_prop("media.class", "Stream/Output/Audio")]);

        let mut intent = Intent::new();
        intent.toggle_input(stream(7), true).unwrap();
        intent.toggle_input(stream(8), true).unwrap();
        intent.toggle_output(sink(9), false).unwrap();

        let report = intent.prune(&snapshot);
        assert_eq!(report.inputs, vec![stream(8)]);
        assert_eq!(report.outputs, vec![sink(9)]);
        assert_eq!(report.len(), 2);
        assert_eq!(intent.enabled_inputs().collect::<Vec<_>>(), vec![stream(7)]);

        assert!(intent.prune(&snapshot).is_empty());
    }

    #[test]
    fn test_settle_forgets_finished_disables_only() {
        let mut intent = Intent::new();
        intent.toggle_input(stream(1), false).unwrap();
        intent.toggle_input(stream(2), false).unwrap();
        intent.toggle_input(stream(3), true).unwrap();

        let destroy = |node: u32| Command::DestroyLink {
            endpoint: Some(stream(node)),
            source: PortId(node * 10),
            destination: PortId(100),
        };
        let report = ApplyReport {
            outcomes: vec![
                (destroy(1), Outcome::Applied),
                (
                    destroy(2),
                    Outcome::Failed {
                        kind: FailureKind::LinkCommand,
                        message: "busy".into(),
                    },
                ),
                (
                    Command::CreateLink {
                        endpoint: stream(3),
                        source: PortRef::Live(PortId(30)),
                        destination: PortRef::Live(PortId(100)),
                    },
                    Outcome::Applied,
                ),
            ],
        };

        intent.settle(&report);
        assert_eq!(intent.selection(stream(1)), None);
        assert_eq!(intent.selection(stream(2)), Some(Selection::Disabled));
        assert_eq!(intent.selection(stream(3)), Some(Selection::Enabled));
    }
}
