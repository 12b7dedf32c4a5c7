//! Normalization of raw graph objects into a [`Snapshot`].
//!
//! Both snapshot sources (pw-dump JSON and the native registry) reduce the
//! graph to flat [`RawObject`]s with stringly-typed props. Everything past
//! that point, classification, channel tags and ordinals, happens here once.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::{ChannelTag, Direction, Link, Node, NodeId, NodeKind, Port, PortId, Snapshot};

const INTERNAL_APPLICATIONS: [&str; 3] = ["PipeWire", "WirePlumber", "PulseAudio"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Node,
    Port,
    Link,
}

impl ObjectKind {
    /// Map a PipeWire interface type (`PipeWire:Interface:Node`) to a kind.
    pub fn from_type(type_name: &str) -> Option<Self> {
        if type_name.ends_with(":Node") {
            Some(Self::Node)
        } else if type_name.ends_with(":Port") {
            Some(Self::Port)
        } else if type_name.ends_with(":Link") {
            Some(Self::Link)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct RawObject {
    pub id: u32,
    pub kind: ObjectKind,
    pub props: BTreeMap<String, String>,
    /// `info.direction` for ports, used when `port.direction` is absent.
    pub info_direction: Option<String>,
}

impl RawObject {
    pub fn new(id: u32, kind: ObjectKind) -> Self {
        Self {
            id,
            kind,
            props: BTreeMap::new(),
            info_direction: None,
        }
    }

    pub fn with_prop(mut self, key: &str, value: impl Into<String>) -> Self {
        self.props.insert(key.to_string(), value.into());
        self
    }

    fn prop(&self, key: &str) -> Option<&str> {
        self.props.get(key).map(String::as_str).filter(|v| !v.trim().is_empty())
    }

    fn prop_u32(&self, key: &str) -> Option<u32> {
        self.prop(key).and_then(|v| v.trim().parse().ok())
    }
}

/// Builds snapshots for a given hub name.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    hub_name: String,
}

impl SnapshotBuilder {
    pub fn new(hub_name: impl Into<String>) -> Self {
        Self {
            hub_name: hub_name.into(),
        }
    }

    pub fn build(&self, objects: impl IntoIterator<Item = RawObject>) -> Snapshot {
        let mut node_objs = Vec::new();
        let mut port_objs = Vec::new();
        let mut link_objs = Vec::new();

        for obj in objects {
            match obj.kind {
                ObjectKind::Node => node_objs.push(obj),
                ObjectKind::Port => port_objs.push(obj),
                ObjectKind::Link => link_objs.push(obj),
            }
        }

        let mut nodes: BTreeMap<NodeId, Node> = node_objs
            .iter()
            .map(|obj| {
                let node = self.build_node(obj);
                (node.id, node)
            })
            .collect();

        let ports = build_ports(&port_objs, &nodes);
        for port in ports.values() {
            if let Some(node) = nodes.get_mut(&port.node_id) {
                node.ports.push(port.id);
            }
        }
        for node in nodes.values_mut() {
            node.ports.sort_by_key(|id| ports.get(id).map(|p| (p.direction, p.ordinal)));
        }

        let links: BTreeSet<Link> = link_objs.iter().filter_map(build_link).collect();

        debug!(
            nodes = nodes.len(),
            ports = ports.len(),
            links = links.len(),
            "built graph snapshot"
        );

        Snapshot {
            hub_name: self.hub_name.clone(),
            nodes,
            ports,
            links,
        }
    }

    fn build_node(&self, obj: &RawObject) -> Node {
        let name = obj
            .prop("node.name")
            .map(String::from)
            .unwrap_or_else(|| format!("node-{}", obj.id));
        let description = obj
            .prop("node.description")
            .or_else(|| obj.prop("node.nick"))
            .map(String::from)
            .unwrap_or_else(|| name.clone());
        let media_class = obj.prop("media.class").map(String::from);
        let application = obj.prop("application.name").map(|s| s.trim().to_string());

        let kind = self.classify(&name, media_class.as_deref(), application.as_deref());

        Node {
            id: NodeId(obj.id),
            kind,
            name,
            description,
            media_class,
            application,
            media_name: obj.prop("media.name").map(String::from),
            binary: obj.prop("application.process.binary").map(String::from),
            ports: Vec::new(),
        }
    }

    fn classify(&self, name: &str, media_class: Option<&str>, application: Option<&str>) -> NodeKind {
        let Some(mc) = media_class else {
            return NodeKind::Other;
        };

        match mc {
            "Audio/Sink" if name == self.hub_name => NodeKind::HubSink,
            "Audio/Sink" => NodeKind::Sink,
            // Covers `<hub>.monitor` as well.
            "Audio/Source" if name.ends_with(".monitor") => NodeKind::Other,
            "Audio/Source" => NodeKind::CaptureSource,
            mc if mc.starts_with("Stream/") && mc.contains("Output") && mc.ends_with("/Audio") => {
                let internal = application.is_some_and(|app| INTERNAL_APPLICATIONS.contains(&app));
                if internal {
                    NodeKind::Other
                } else {
                    NodeKind::AppStream
                }
            }
            _ => NodeKind::Other,
        }
    }
}

fn build_ports(objs: &[RawObject], nodes: &BTreeMap<NodeId, Node>) -> BTreeMap<PortId, Port> {
    // (node, direction) -> [(port.id prop, global id, object)]
    let mut groups: BTreeMap<(NodeId, Direction), Vec<(Option<u32>, u32, &RawObject)>> = BTreeMap::new();

    for obj in objs {
        let direction = obj
            .prop("port.direction")
            .and_then(Direction::from_pipewire)
            .or_else(|| obj.info_direction.as_deref().and_then(Direction::from_pipewire));
        let Some(direction) = direction else {
            debug!(port = obj.id, "skipping port without direction");
            continue;
        };
        let Some(node_id) = obj.prop_u32("node.id").map(NodeId) else {
            debug!(port = obj.id, "skipping port without owning node");
            continue;
        };
        if !nodes.contains_key(&node_id) {
            debug!(port = obj.id, node = %node_id, "skipping port of unknown node");
            continue;
        }

        groups
            .entry((node_id, direction))
            .or_default()
            .push((obj.prop_u32("port.id"), obj.id, obj));
    }

    let mut ports = BTreeMap::new();
    for ((node_id, direction), mut members) in groups {
        // Ports without a local index go last, in global id order.
        members.sort_by_key(|(local, global, _)| (local.is_none(), *local, *global));
        for (ordinal, (_, _, obj)) in members.into_iter().enumerate() {
            let port = Port {
                id: PortId(obj.id),
                node_id,
                name: obj
                    .prop("port.name")
                    .map(String::from)
                    .unwrap_or_else(|| format!("port-{}", obj.id)),
                direction,
                tag: ChannelTag::from_port_props(&obj.props),
                ordinal: ordinal as u32,
            };
            ports.insert(port.id, port);
        }
    }
    ports
}

fn build_link(obj: &RawObject) -> Option<Link> {
    let output = obj
        .prop_u32("link.output.port")
        .or_else(|| obj.prop_u32("link.output.port.id"))?;
    let input = obj
        .prop_u32("link.input.port")
        .or_else(|| obj.prop_u32("link.input.port.id"))?;
    Some(Link::new(PortId(output), PortId(input)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: u32, name: &str, class: &str) -> RawObject {
        RawObject::new(id, ObjectKind::Node)
            .with_prop("node.name", name)
            .with_prop("media.class", class)
    }

    fn port(id: u32, node: u32, name: &str, dir: &str) -> RawObject {
        RawObject::new(id, ObjectKind::Port)
            .with_prop("node.id", node.to_string())
            .with_prop("port.name", name)
            .with_prop("port.direction", dir)
    }

    #[test]
    fn test_classification() {
        let snap = SnapshotBuilder::new("siphon").build(vec![
            node(10, "siphon", "Audio/Sink"),
            node(11, "alsa_output.pci", "Audio/Sink"),
            node(12, "alsa_input.usb", "Audio/Source"),
            node(13, "alsa_output.pci.monitor", "Audio/Source"),
            node(14, "firefox", "Stream/Output/Audio").with_prop("application.name", "Firefox"),
            node(15, "speech", "Stream/Output/Audio").with_prop("application.name", "PipeWire"),
            node(16, "recorder", "Stream/Input/Audio"),
            node(17, "midi-bridge", "Midi/Bridge"),
            RawObject::new(18, ObjectKind::Node),
        ]);

        let kind = |id| snap.node(NodeId(id)).unwrap().kind;
        assert_eq!(kind(10), NodeKind::HubSink);
        assert_eq!(kind(11), NodeKind::Sink);
        assert_eq!(kind(12), NodeKind::CaptureSource);
        assert_eq!(kind(13), NodeKind::Other);
        assert_eq!(kind(14), NodeKind::AppStream);
        assert_eq!(kind(15), NodeKind::Other);
        assert_eq!(kind(16), NodeKind::Other);
        assert_eq!(kind(17), NodeKind::Other);
        assert_eq!(snap.node(NodeId(18)).unwrap().name, "node-18");
    }

    #[test]
    fn test_ordinals_follow_local_port_index() {
        let snap = SnapshotBuilder::new("siphon").build(vec![
            node(1, "app", "Stream/Output/Audio"),
            port(30, 1, "output_FR", "out").with_prop("port.id", "1"),
            port(20, 1, "output_FL", "out").with_prop("port.id", "0"),
            port(40, 1, "extra", "out"),
            port(50, 1, "input_MONO", "in"),
        ]);

        let outs = snap.ports_of(NodeId(1), Direction::Source);
        let ids: Vec<u32> = outs.iter().map(|p| p.id.0).collect();
        assert_eq!(ids, vec![20, 30, 40]);
        assert_eq!(outs.iter().map(|p| p.ordinal).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(outs[0].tag, ChannelTag::FL);

        let ins = snap.ports_of(NodeId(1), Direction::Destination);
        assert_eq!(ins.len(), 1);
        assert_eq!(ins[0].ordinal, 0);
        assert_eq!(ins[0].tag, ChannelTag::Mono);
    }

    #[test]
    fn test_ports_without_direction_or_node_are_dropped() {
        let mut no_dir = RawObject::new(3, ObjectKind::Port).with_prop("node.id", "1");
        no_dir.info_direction = Some("out".into());
        let snap = SnapshotBuilder::new("siphon").build(vec![
            node(1, "app", "Stream/Output/Audio"),
            no_dir,
            RawObject::new(4, ObjectKind::Port).with_prop("node.id", "1"),
            port(5, 99, "orphan", "out"),
        ]);

        assert!(snap.port(PortId(3)).is_some(), "info.direction is a fallback");
        assert!(snap.port(PortId(4)).is_none());
        assert!(snap.port(PortId(5)).is_none());
    }

    #[test]
    fn test_links_accept_both_key_spellings() {
        let snap = SnapshotBuilder::new("siphon").build(vec![
            RawObject::new(1, ObjectKind::Link)
                .with_prop("link.output.port", "10")
                .with_prop("link.input.port", "11"),
            RawObject::new(2, ObjectKind::Link)
                .with_prop("link.output.port.id", "12")
                .with_prop("link.input.port.id", "13"),
            RawObject::new(3, ObjectKind::Link).with_prop("link.output.port", "14"),
            RawObject::new(4, ObjectKind::Link)
                .with_prop("link.output.port", "x")
                .with_prop("link.input.port", "15"),
        ]);

        assert_eq!(snap.links().len(), 2);
        assert!(snap.has_link(&Link::new(PortId(10), PortId(11))));
        assert!(snap.has_link(&Link::new(PortId(12), PortId(13))));
    }

    #[test]
    fn test_hub_monitor_ports_fall_back_to_all_outputs() {
        let snap = SnapshotBuilder::new("siphon").build(vec![
            node(1, "siphon", "Audio/Sink"),
            port(2, 1, "playback_FL", "in"),
            port(3, 1, "playback_FR", "in"),
            port(4, 1, "out_FL", "out"),
        ]);
        assert_eq!(snap.hub_feed_ports().len(), 2);
        let monitors = snap.hub_monitor_ports();
        assert_eq!(monitors.len(), 1);
        assert_eq!(monitors[0].id, PortId(4));
    }
}
