use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Semantic channel label of a port.
///
/// Variant order is the pairing preference order: `Ord` compares variants by
/// declaration position and `Aux` by its number, so iterating a
/// `BTreeMap<ChannelTag, _>` visits tags in preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChannelTag {
    Mono,
    FL,
    FR,
    FC,
    LFE,
    SL,
    SR,
    RL,
    RR,
    Aux(u32),
    Unknown,
}

/// Tags recognized as a port-name suffix when no explicit position exists.
const SUFFIX_TAGS: [ChannelTag; 9] = [
    ChannelTag::FL,
    ChannelTag::FR,
    ChannelTag::FC,
    ChannelTag::LFE,
    ChannelTag::RL,
    ChannelTag::RR,
    ChannelTag::SL,
    ChannelTag::SR,
    ChannelTag::Mono,
];

impl ChannelTag {
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Normalize a free-form channel label. Accepts short (`fl`) and long
    /// (`front-left`) PipeWire spellings, `mono`, and `auxN`.
    pub fn normalize(raw: &str) -> Self {
        let s = raw.trim().to_ascii_lowercase();
        match s.as_str() {
            "fl" | "front-left" => Self::FL,
            "fr" | "front-right" => Self::FR,
            "fc" | "front-center" => Self::FC,
            "lfe" | "low-frequency" => Self::LFE,
            "sl" | "side-left" => Self::SL,
            "sr" | "side-right" => Self::SR,
            "rl" | "rear-left" => Self::RL,
            "rr" | "rear-right" => Self::RR,
            "mono" => Self::Mono,
            _ => s
                .strip_prefix("aux")
                .filter(|tail| !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|tail| tail.parse().ok())
                .map(Self::Aux)
                .unwrap_or(Self::Unknown),
        }
    }

    /// Derive the tag of a port from its properties.
    ///
    /// `audio.channel` / `audio.position` win; otherwise the last
    /// `_`-separated segment of `port.name`, then a known suffix of the name.
    pub fn from_port_props(props: &BTreeMap<String, String>) -> Self {
        for key in ["audio.channel", "audio.position"] {
            if let Some(v) = props.get(key).filter(|v| !v.trim().is_empty()) {
                return Self::normalize(v);
            }
        }

        let name = props.get("port.name").map(|s| s.trim()).unwrap_or_default();
        Self::from_port_name(name)
    }

    pub fn from_port_name(name: &str) -> Self {
        if name.is_empty() {
            return Self::Unknown;
        }

        if let Some((_, last)) = name.rsplit_once('_') {
            let tag = Self::normalize(last);
            if tag.is_known() {
                return tag;
            }
        }

        let upper = name.to_ascii_uppercase();
        SUFFIX_TAGS
            .into_iter()
            .find(|tag| upper.ends_with(tag.as_pulse_short()))
            .unwrap_or(Self::Unknown)
    }

    fn as_pulse_short(&self) -> &'static str {
        match self {
            Self::Mono => "MONO",
            Self::FL => "FL",
            Self::FR => "FR",
            Self::FC => "FC",
            Self::LFE => "LFE",
            Self::SL => "SL",
            Self::SR => "SR",
            Self::RL => "RL",
            Self::RR => "RR",
            Self::Aux(_) | Self::Unknown => "",
        }
    }

    /// PulseAudio `channel_map` spelling, used when creating the hub sink.
    pub fn pulse_position(&self) -> Option<String> {
        let name = match self {
            Self::Mono => "mono",
            Self::FL => "front-left",
            Self::FR => "front-right",
            Self::FC => "front-center",
            Self::LFE => "lfe",
            Self::SL => "side-left",
            Self::SR => "side-right",
            Self::RL => "rear-left",
            Self::RR => "rear-right",
            Self::Aux(n) => return Some(format!("aux{}", n)),
            Self::Unknown => return None,
        };
        Some(name.to_string())
    }
}

impl fmt::Display for ChannelTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aux(n) => write!(f, "AUX{}", n),
            Self::Unknown => write!(f, "UNK"),
            other => write!(f, "{}", other.as_pulse_short()),
        }
    }
}

impl FromStr for ChannelTag {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::normalize(s) {
            Self::Unknown => Err(format!("Unknown channel tag: {}", s)),
            tag => Ok(tag),
        }
    }
}
