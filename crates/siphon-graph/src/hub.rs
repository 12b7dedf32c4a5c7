use serde::{Deserialize, Serialize};

use crate::{ChannelTag, Direction};

/// Channel layout of the hub sink.
///
/// While the hub does not exist yet, its ports are predicted from this
/// layout so links into and out of it can be planned before it is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubLayout {
    tags: Vec<ChannelTag>,
}

/// A predicted hub port. Never carries a graph id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplatePort {
    pub direction: Direction,
    pub tag: ChannelTag,
    pub ordinal: u32,
    pub name: String,
}

impl HubLayout {
    pub fn new(tags: Vec<ChannelTag>) -> Self {
        Self { tags }
    }

    /// Parse a layout from channel names such as `["FL", "FR"]`.
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Result<Self, String> {
        let tags = names
            .iter()
            .map(|n| n.as_ref().parse::<ChannelTag>())
            .collect::<Result<Vec<_>, _>>()?;
        if tags.is_empty() {
            return Err("hub layout needs at least one channel".to_string());
        }
        for (i, tag) in tags.iter().enumerate() {
            if tags[..i].contains(tag) {
                return Err(format!("hub layout lists {} twice", tag));
            }
        }
        Ok(Self { tags })
    }

    pub fn tags(&self) -> &[ChannelTag] {
        &self.tags
    }

    pub fn channels(&self) -> usize {
        self.tags.len()
    }

    /// PulseAudio `channel_map` argument, e.g. `front-left,front-right`.
    pub fn pulse_channel_map(&self) -> String {
        self.tags
            .iter()
            .filter_map(|t| t.pulse_position())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Predicted feed (`Destination`) or monitor (`Source`) ports, named the
    /// way a null sink names them.
    pub fn template(&self, direction: Direction) -> Vec<TemplatePort> {
        let prefix = match direction {
            Direction::Destination => "playback",
            Direction::Source => "monitor",
        };
        self.tags
            .iter()
            .enumerate()
            .map(|(i, tag)| TemplatePort {
                direction,
                tag: *tag,
                ordinal: i as u32,
                name: format!("{}_{}", prefix, tag),
            })
            .collect()
    }
}

impl Default for HubLayout {
    fn default() -> Self {
        Self::new(vec![ChannelTag::FL, ChannelTag::FR])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_layout() {
        let layout = HubLayout::parse(&["FL", "FR", "LFE"]).unwrap();
        assert_eq!(layout.channels(), 3);
        assert_eq!(layout.pulse_channel_map(), "front-left,front-right,lfe");

        assert!(HubLayout::parse(&["FL", "nope"]).is_err());
        assert!(HubLayout::parse::<&str>(&[]).is_err());
    }

    #[test]
    fn test_parse_rejects_repeated_channel() {
        let err = HubLayout::parse(&["FL", "FR", "front-left"]).unwrap_err();
        assert!(err.contains("FL"), "{}", err);
        assert!(HubLayout::parse(&["AUX0", "AUX1"]).is_ok());
    }

    #[test]
    fn test_template_ports() {
        let layout = HubLayout::default();
        let feed = layout.template(Direction::Destination);
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].name, "playback_FL");
        assert_eq!(feed[1].tag, ChannelTag::FR);
        assert_eq!(feed[1].ordinal, 1);

        let monitor = layout.template(Direction::Source);
        assert_eq!(monitor[0].name, "monitor_FL");
    }
}
