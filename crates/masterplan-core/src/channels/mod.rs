//! Channel/format compatibility table and format repair.
//!
//! The built-in table is defined in `channels.toml` and embedded in the
//! binary at compile time. Extra channels and formats can be merged in from
//! configuration with [`ChannelFormatTable::with_custom`].

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Format used when a campaign names a channel the table does not know.
pub const FALLBACK_FORMAT: &str = "Display";

/// The formats allowed for one channel. The first format is the default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelFormats {
    pub name: String,
    #[serde(default)]
    pub formats: Vec<String>,
}

/// Ordered mapping from channel name to its allowed formats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelFormatTable {
    #[serde(default)]
    channels: Vec<ChannelFormats>,
}

/// The embedded channel table TOML.
static CHANNELS_TOML: &str = include_str!("channels.toml");

/// Parsed once on first use. The embedded TOML is checked by the tests, so
/// a built binary always carries a valid table.
static BUILTIN: Lazy<ChannelFormatTable> =
    Lazy::new(|| toml::from_str(CHANNELS_TOML).expect("embedded channels.toml is invalid"));

fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

impl ChannelFormatTable {
    pub fn new(channels: Vec<ChannelFormats>) -> Self {
        Self { channels }
    }

    /// The built-in table.
    pub fn builtin() -> &'static ChannelFormatTable {
        &BUILTIN
    }

    pub fn channels(&self) -> &[ChannelFormats] {
        &self.channels
    }

    /// Look up a channel by name, ignoring case and surrounding whitespace.
    pub fn channel(&self, name: &str) -> Option<&ChannelFormats> {
        self.channels.iter().find(|c| same_name(&c.name, name))
    }

    /// Allowed formats for `channel`, if the channel is known.
    pub fn formats_for(&self, channel: &str) -> Option<&[String]> {
        self.channel(channel).map(|c| c.formats.as_slice())
    }

    /// Whether `format` is listed under `channel`.
    pub fn is_allowed(&self, channel: &str, format: &str) -> bool {
        self.formats_for(channel)
            .is_some_and(|formats| formats.iter().any(|f| same_name(f, format)))
    }

    /// Merge extra channels and formats into this table.
    ///
    /// Formats for channels already present are appended after the existing
    /// ones (duplicates skipped), so existing defaults do not change.
    /// Unknown channels are added at the end.
    pub fn with_custom(mut self, extra: &[ChannelFormats]) -> Self {
        for custom in extra {
            if custom.name.trim().is_empty() {
                continue;
            }
            match self
                .channels
                .iter_mut()
                .find(|c| same_name(&c.name, &custom.name))
            {
                Some(existing) => {
                    for format in &custom.formats {
                        if !existing.formats.iter().any(|f| same_name(f, format)) {
                            existing.formats.push(format.trim().to_string());
                        }
                    }
                }
                None => {
                    let mut formats: Vec<String> = Vec::new();
                    for format in &custom.formats {
                        if !formats.iter().any(|f| same_name(f, format)) {
                            formats.push(format.trim().to_string());
                        }
                    }
                    self.channels.push(ChannelFormats {
                        name: custom.name.trim().to_string(),
                        formats,
                    });
                }
            }
        }
        self
    }
}

impl Default for ChannelFormatTable {
    fn default() -> Self {
        Self::builtin().clone()
    }
}

/// Return a format that is valid for `channel`.
///
/// A listed format is returned in the table's spelling. An unlisted format
/// is replaced by the channel's default, and an unknown channel gets
/// [`FALLBACK_FORMAT`].
pub fn validate_format(channel: &str, format: &str, table: &ChannelFormatTable) -> String {
    let Some(entry) = table.channel(channel) else {
        return FALLBACK_FORMAT.to_string();
    };
    if let Some(listed) = entry.formats.iter().find(|f| same_name(f, format)) {
        return listed.clone();
    }
    entry
        .formats
        .first()
        .cloned()
        .unwrap_or_else(|| FALLBACK_FORMAT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_table_parses() {
        let table = ChannelFormatTable::builtin();
        assert_eq!(table.channels().len(), 6);
        assert_eq!(table.channels()[0].name, "Google Ads");
        assert_eq!(
            table.formats_for("Google Ads").unwrap().first().unwrap(),
            "Search"
        );
    }

    #[test]
    fn valid_pair_is_unchanged() {
        let table = ChannelFormatTable::default();
        assert_eq!(validate_format("Meta Ads", "Reels", &table), "Reels");
        assert_eq!(validate_format("YouTube", "Shorts", &table), "Shorts");
    }

    #[test]
    fn case_differences_return_table_spelling() {
        let table = ChannelFormatTable::default();
        assert_eq!(validate_format("meta ads", "stories", &table), "Stories");
    }

    #[test]
    fn invalid_format_falls_back_to_channel_default() {
        let table = ChannelFormatTable::default();
        assert_eq!(validate_format("Google Ads", "Reels", &table), "Search");
        assert_eq!(validate_format("LinkedIn Ads", "", &table), "Sponsored Content");
    }

    #[test]
    fn unknown_channel_gets_global_fallback() {
        let table = ChannelFormatTable::default();
        assert_eq!(validate_format("Rádio", "Spot 30s", &table), FALLBACK_FORMAT);
    }

    #[test]
    fn every_repair_is_allowed_or_fallback() {
        let table = ChannelFormatTable::default();
        for channel in ["Google Ads", "YouTube", "TikTok Ads", "Orkut"] {
            for format in ["Search", "Bumper", "Spark Ads", "nonsense"] {
                let repaired = validate_format(channel, format, &table);
                assert!(
                    table.is_allowed(channel, &repaired) || repaired == FALLBACK_FORMAT,
                    "{channel}/{format} -> {repaired}"
                );
            }
        }
    }

    #[test]
    fn custom_formats_merge() {
        let table = ChannelFormatTable::default().with_custom(&[
            ChannelFormats {
                name: "google ads".into(),
                formats: vec!["Demand Gen".into(), "search".into()],
            },
            ChannelFormats {
                name: "Spotify Ads".into(),
                formats: vec!["Audio".into(), "Video".into(), "audio".into()],
            },
        ]);

        let google = table.formats_for("Google Ads").unwrap();
        assert_eq!(google.first().unwrap(), "Search");
        assert_eq!(google.last().unwrap(), "Demand Gen");
        assert_eq!(google.len(), 6);

        let spotify = table.channels().last().unwrap();
        assert_eq!(spotify.name, "Spotify Ads");
        assert_eq!(spotify.formats, ["Audio", "Video"]);
        assert_eq!(validate_format("Spotify Ads", "Podcast", &table), "Audio");
    }

    #[test]
    fn channel_without_formats_uses_fallback() {
        let table = ChannelFormatTable::new(vec![ChannelFormats {
            name: "Outdoor".into(),
            formats: vec![],
        }]);
        assert_eq!(validate_format("Outdoor", "Billboard", &table), FALLBACK_FORMAT);
    }
}
