//! Reconciliation: Intent + Snapshot -> ordered command list.
//!
//! Pure. Desired links are recomputed from scratch on every pass and diffed
//! against the live links in the managed scope only; links the user never
//! touched through us are left alone.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use siphon_graph::{
    map_channels, ChannelTag, Channelled, Direction, EndpointId, HubLayout, Link, NodeId, Port, PortId, Role,
    Snapshot,
};
use tracing::debug;

use crate::command::{Command, HubOwnership, PortRef};
use crate::intent::Intent;

/// A hub port as seen by the mapper: live, or predicted from the layout.
#[derive(Debug, Clone)]
struct HubPort {
    port: PortRef,
    tag: ChannelTag,
    ordinal: u32,
}

impl Channelled for HubPort {
    fn tag(&self) -> ChannelTag {
        self.tag
    }

    fn ordinal(&self) -> u32 {
        self.ordinal
    }
}

/// Display state of an endpoint's links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    /// Every link the endpoint would get exists.
    Active,
    Partial,
    Inactive,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Partial => "partial",
            Self::Inactive => "inactive",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unmatched {
    pub endpoint: EndpointId,
    pub sources: usize,
    pub destinations: usize,
}

/// Informational mapping conditions. Never errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MappingReport {
    /// Enabled endpoints for which one side had no ports at all.
    pub skipped: Vec<EndpointId>,
    /// Endpoints that mapped, with ports left over on the longer side.
    pub unmatched: Vec<Unmatched>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub commands: Vec<Command>,
    pub mapping: MappingReport,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Fixed hub identity the reconciler plans against.
#[derive(Debug, Clone)]
pub struct Reconciler {
    hub_name: String,
    hub_description: String,
    layout: HubLayout,
}

impl Reconciler {
    pub fn new(hub_name: impl Into<String>, hub_description: impl Into<String>, layout: HubLayout) -> Self {
        Self {
            hub_name: hub_name.into(),
            hub_description: hub_description.into(),
            layout,
        }
    }

    pub fn hub_name(&self) -> &str {
        &self.hub_name
    }

    /// Compute the commands that move `snapshot` towards `intent`.
    ///
    /// Order: hub-create, link creates, link destroys, hub-destroy. Within
    /// each link group commands are sorted by (endpoint, source, destination).
    /// A hub is only destroyed when `ownership` says it is ours.
    pub fn reconcile(&self, intent: &Intent, snapshot: &Snapshot, ownership: Option<HubOwnership>) -> Plan {
        let hub = snapshot.hub();
        let create_hub = intent.hub_requested() && hub.is_none();
        let destroy_hub = match (hub, ownership) {
            (Some(hub), Some(ownership)) if !intent.hub_requested() => Some((hub.id, ownership)),
            _ => None,
        };

        let mut mapping = MappingReport::default();
        let desired = if destroy_hub.is_some() {
            BTreeMap::new()
        } else {
            let (feed, monitor) = self.hub_ports(snapshot, create_hub);
            self.desired_links(intent, snapshot, &feed, &monitor, &mut mapping)
        };

        let actual = managed_links(intent, snapshot, destroy_hub.map(|(node, _)| node));
        let desired_live: BTreeSet<Link> = desired
            .keys()
            .filter_map(|(s, d)| Some(Link::new(s.live()?, d.live()?)))
            .collect();

        let mut creates: Vec<(EndpointId, PortRef, PortRef)> = desired
            .iter()
            .filter(|((s, d), _)| match (s.live(), d.live()) {
                (Some(s), Some(d)) => !snapshot.has_link(&Link::new(s, d)),
                _ => true,
            })
            .map(|((s, d), ep)| (*ep, *s, *d))
            .collect();
        creates.sort();

        let mut destroys: Vec<(Option<EndpointId>, PortId, PortId)> = actual
            .iter()
            .filter(|(link, _)| !desired_live.contains(*link))
            .map(|(link, ep)| (*ep, link.source, link.destination))
            .collect();
        destroys.sort();

        let mut commands = Vec::with_capacity(creates.len() + destroys.len() + 2);
        if create_hub {
            commands.push(Command::CreateHub {
                name: self.hub_name.clone(),
                description: self.hub_description.clone(),
                layout: self.layout.clone(),
            });
        }
        commands.extend(creates.into_iter().map(|(endpoint, source, destination)| Command::CreateLink {
            endpoint,
            source,
            destination,
        }));
        commands.extend(destroys.into_iter().map(|(endpoint, source, destination)| Command::DestroyLink {
            endpoint,
            source,
            destination,
        }));
        if let Some((node, ownership)) = destroy_hub {
            commands.push(Command::DestroyHub { node, ownership });
        }

        debug!(commands = commands.len(), skipped = mapping.skipped.len(), "reconciled");
        Plan { commands, mapping }
    }

    /// Link state of one endpoint against the live hub, for display.
    pub fn link_status(&self, snapshot: &Snapshot, endpoint: EndpointId) -> LinkStatus {
        let (feed, monitor) = self.hub_ports(snapshot, false);
        let mut scratch = MappingReport::default();
        let pairs = self.endpoint_pairs(snapshot, endpoint, &feed, &monitor, &mut scratch);

        let present = pairs
            .iter()
            .filter(|(s, d)| match (s.live(), d.live()) {
                (Some(s), Some(d)) => snapshot.has_link(&Link::new(s, d)),
                _ => false,
            })
            .count();

        match present {
            0 => LinkStatus::Inactive,
            n if n == pairs.len() => LinkStatus::Active,
            _ => LinkStatus::Partial,
        }
    }

    /// Feed and monitor ports of the hub, from the graph when it exists,
    /// from the layout template when it is about to be created.
    fn hub_ports(&self, snapshot: &Snapshot, use_template: bool) -> (Vec<HubPort>, Vec<HubPort>) {
        if snapshot.hub().is_some() {
            let live = |ports: Vec<&Port>| -> Vec<HubPort> {
                ports
                    .into_iter()
                    .map(|p| HubPort {
                        port: PortRef::Live(p.id),
                        tag: p.tag,
                        ordinal: p.ordinal,
                    })
                    .collect()
            };
            return (live(snapshot.hub_feed_ports()), live(snapshot.hub_monitor_ports()));
        }
        if !use_template {
            return (Vec::new(), Vec::new());
        }

        let template = |direction: Direction| -> Vec<HubPort> {
            self.layout
                .template(direction)
                .into_iter()
                .map(|t| HubPort {
                    port: PortRef::PendingHub {
                        direction,
                        tag: t.tag,
                        ordinal: t.ordinal,
                    },
                    tag: t.tag,
                    ordinal: t.ordinal,
                })
                .collect()
        };
        (template(Direction::Destination), template(Direction::Source))
    }

    fn desired_links(
        &self,
        intent: &Intent,
        snapshot: &Snapshot,
        feed: &[HubPort],
        monitor: &[HubPort],
        mapping: &mut MappingReport,
    ) -> BTreeMap<(PortRef, PortRef), EndpointId> {
        let mut desired = BTreeMap::new();
        for endpoint in intent.enabled_inputs().chain(intent.enabled_outputs()) {
            for pair in self.endpoint_pairs(snapshot, endpoint, feed, monitor, mapping) {
                desired.entry(pair).or_insert(endpoint);
            }
        }
        desired
    }

    /// Port pairs one endpoint contributes: its ports into the hub feed for
    /// inputs, the hub monitor into its ports for outputs.
    fn endpoint_pairs(
        &self,
        snapshot: &Snapshot,
        endpoint: EndpointId,
        feed: &[HubPort],
        monitor: &[HubPort],
        mapping: &mut MappingReport,
    ) -> Vec<(PortRef, PortRef)> {
        let ports = snapshot.endpoint_ports(endpoint);

        let (pairs, unmatched_sources, unmatched_destinations) = match endpoint.role() {
            Role::Input => {
                let map = map_channels(&ports, feed);
                let pairs: Vec<_> = map.pairs.iter().map(|(s, d, _)| (PortRef::Live(s.id), d.port)).collect();
                (pairs, map.unmatched_sources, map.unmatched_destinations)
            }
            Role::Output => {
                let map = map_channels(monitor, &ports);
                let pairs: Vec<_> = map.pairs.iter().map(|(s, d, _)| (s.port, PortRef::Live(d.id))).collect();
                (pairs, map.unmatched_sources, map.unmatched_destinations)
            }
        };

        if pairs.is_empty() {
            debug!(endpoint = %endpoint, "mapping skipped: no ports on one side");
            mapping.skipped.push(endpoint);
        } else if unmatched_sources > 0 || unmatched_destinations > 0 {
            mapping.unmatched.push(Unmatched {
                endpoint,
                sources: unmatched_sources,
                destinations: unmatched_destinations,
            });
        }
        pairs
    }
}

/// Live links we are allowed to touch, each attributed to the managed
/// endpoint on its far side (`None` for hub-only links during teardown).
fn managed_links(intent: &Intent, snapshot: &Snapshot, destroying_hub: Option<NodeId>) -> BTreeMap<Link, Option<EndpointId>> {
    let hub_feed: BTreeSet<PortId> = snapshot.hub_feed_ports().iter().map(|p| p.id).collect();
    let hub_monitor: BTreeSet<PortId> = snapshot.hub_monitor_ports().iter().map(|p| p.id).collect();

    let input_owner = port_owners(snapshot, intent.managed_inputs());
    let output_owner = port_owners(snapshot, intent.managed_outputs());

    let touches_hub = |id: PortId| {
        destroying_hub.is_some_and(|hub| snapshot.port(id).is_some_and(|p| p.node_id == hub))
    };

    let mut scoped = BTreeMap::new();
    for link in snapshot.links() {
        let owner = if hub_feed.contains(&link.destination) {
            input_owner.get(&link.source).copied()
        } else if hub_monitor.contains(&link.source) {
            output_owner.get(&link.destination).copied()
        } else {
            None
        };

        if owner.is_some() || touches_hub(link.source) || touches_hub(link.destination) {
            scoped.insert(*link, owner);
        }
    }
    scoped
}

fn port_owners(snapshot: &Snapshot, endpoints: impl Iterator<Item = EndpointId>) -> BTreeMap<PortId, EndpointId> {
    let mut owner = BTreeMap::new();
    for endpoint in endpoints {
        for port in snapshot.endpoint_ports(endpoint) {
            owner.entry(port.id).or_insert(endpoint);
        }
    }
    owner
}
