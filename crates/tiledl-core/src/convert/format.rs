use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Artifact kinds a run can produce per tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Fetched bytes, unmodified.
    Raw,
    /// 8-bit indexed PNG.
    Png8,
    /// Packed RGB565, big-endian, no header.
    Rgb565,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [OutputFormat::Raw, OutputFormat::Png8, OutputFormat::Rgb565];

    /// Subdirectory under `{output}/{provider}/`.
    pub fn dir_name(self) -> &'static str {
        match self {
            OutputFormat::Raw => "raw",
            OutputFormat::Png8 => "png",
            OutputFormat::Rgb565 => "rgb565",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Raw => "raw",
            OutputFormat::Png8 => "png8",
            OutputFormat::Rgb565 => "rgb565",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" => Ok(OutputFormat::Raw),
            "png8" | "png" => Ok(OutputFormat::Png8),
            "rgb565" | "bin" => Ok(OutputFormat::Rgb565),
            other => Err(format!("unknown output format {other:?} (expected raw, png8 or rgb565)")),
        }
    }
}

/// The formats requested for a run. Never empty: an empty request means `{raw}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatSet(BTreeSet<OutputFormat>);

impl Default for FormatSet {
    fn default() -> Self {
        Self(BTreeSet::from([OutputFormat::Raw]))
    }
}

impl FormatSet {
    pub fn new(formats: impl IntoIterator<Item = OutputFormat>) -> Self {
        let set: BTreeSet<_> = formats.into_iter().collect();
        if set.is_empty() {
            Self::default()
        } else {
            Self(set)
        }
    }

    pub fn contains(&self, format: OutputFormat) -> bool {
        self.0.contains(&format)
    }

    /// True when the 8-bit palette decode has to run (png8 or rgb565).
    pub fn needs_palette(&self) -> bool {
        self.contains(OutputFormat::Png8) || self.contains(OutputFormat::Rgb565)
    }

    pub fn iter(&self) -> impl Iterator<Item = OutputFormat> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FormatSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(OutputFormat::as_str).collect();
        f.write_str(&names.join(","))
    }
}
