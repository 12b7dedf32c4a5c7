//! A trimmed `pw-dump` of a desktop session: one hub, one stereo sink, a
//! mono microphone and a browser playing into the hub.

pub const HUB: &str = "siphon";

pub const DESKTOP_DUMP: &str = r#"[
  { "id": 0, "type": "PipeWire:Interface:Core", "info": { "name": "pipewire-0" } },
  { "id": 33, "type": "PipeWire:Interface:Client", "info": { "props": { "application.name": "WirePlumber" } } },

  { "id": 30, "type": "PipeWire:Interface:Node",
    "info": { "props": { "node.name": "siphon", "node.description": "Siphon",
                         "media.class": "Audio/Sink", "factory.name": "support.null-audio-sink" } } },
  { "id": 131, "type": "PipeWire:Interface:Port",
    "info": { "direction": "input", "props": { "node.id": 30, "port.id": 0, "port.name": "playback_FL", "audio.channel": "FL" } } },
  { "id": 132, "type": "PipeWire:Interface:Port",
    "info": { "direction": "input", "props": { "node.id": 30, "port.id": 1, "port.name": "playback_FR", "audio.channel": "FR" } } },
  { "id": 133, "type": "PipeWire:Interface:Port",
    "info": { "direction": "output", "props": { "node.id": 30, "port.id": 0, "port.name": "monitor_FL", "audio.channel": "FL", "port.monitor": true } } },
  { "id": 134, "type": "PipeWire:Interface:Port",
    "info": { "direction": "output", "props": { "node.id": 30, "port.id": 1, "port.name": "monitor_FR", "audio.channel": "FR", "port.monitor": true } } },

  { "id": 40, "type": "PipeWire:Interface:Node",
    "info": { "props": { "node.name": "alsa_output.pci-0000_00_1f.3.analog-stereo",
                         "node.description": "Built-in Audio Analog Stereo", "media.class": "Audio/Sink" } } },
  { "id": 141, "type": "PipeWire:Interface:Port",
    "info": { "direction": "input", "props": { "node.id": 40, "port.id": 0, "port.name": "playback_FL", "audio.channel": "FL" } } },
  { "id": 142, "type": "PipeWire:Interface:Port",
    "info": { "direction": "input", "props": { "node.id": 40, "port.id": 1, "port.name": "playback_FR", "audio.channel": "FR" } } },
  { "id": 143, "type": "PipeWire:Interface:Port",
    "info": { "direction": "output", "props": { "node.id": 40, "port.id": 0, "port.name": "monitor_FL", "audio.channel": "FL" } } },
  { "id": 144, "type": "PipeWire:Interface:Port",
    "info": { "direction": "output", "props": { "node.id": 40, "port.id": 1, "port.name": "monitor_FR", "audio.channel": "FR" } } },

  { "id": 50, "type": "PipeWire:Interface:Node",
    "info": { "props": { "node.name": "alsa_input.usb-Blue_Yeti-00.mono", "node.nick": "Yeti",
                         "media.class": "Audio/Source" } } },
  { "id": 151, "type": "PipeWire:Interface:Port",
    "info": { "direction": "output", "props": { "node.id": 50, "port.id": 0, "port.name": "capture_MONO", "audio.channel": "MONO" } } },

  { "id": 60, "type": "PipeWire:Interface:Node",
    "info": { "props": { "node.name": "Firefox", "media.class": "Stream/Output/Audio",
                         "application.name": "Firefox", "media.name": "Lo-fi beats",
                         "application.process.binary": "firefox" } } },
  { "id": 161, "type": "PipeWire:Interface:Port",
    "info": { "direction": "output", "props": { "node.id": 60, "port.id": 0, "port.name": "output_FL", "audio.channel": "FL" } } },
  { "id": 162, "type": "PipeWire:Interface:Port",
    "info": { "direction": "output", "props": { "node.id": 60, "port.id": 1, "port.name": "output_FR", "audio.channel": "FR" } } },

  { "id": 70, "type": "PipeWire:Interface:Link",
    "info": { "output-node-id": 60, "output-port-id": 161, "input-node-id": 30, "input-port-id": 131,
              "props": { "link.output.port": 161, "link.input.port": 131 } } },
  { "id": 71, "type": "PipeWire:Interface:Link",
    "info": { "output-node-id": 60, "output-port-id": 162, "input-node-id": 30, "input-port-id": 132,
              "props": {} } }
]"#;
