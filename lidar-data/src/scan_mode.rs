use std::fmt;
use std::str::FromStr;
use thiserror::Error;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Operating mode of the sensor for one connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum ScanMode {
    /// Lower density, quality reported for every sample.
    Standard,
    /// Higher density, quality omitted.
    #[default]
    Express,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("Unknown scan mode \"{0}\". Expected STANDARD, NORMAL or EXPRESS.")]
pub struct UnknownScanMode(pub String);

impl ScanMode {
    /// Token sent on the wire during the mode handshake.
    pub fn token(&self) -> &'static str {
        match self {
            ScanMode::Standard => "STANDARD",
            ScanMode::Express => "EXPRESS",
        }
    }

    /// Like `from_str`, but any unrecognised input falls back to the default
    /// mode instead of failing.
    pub fn resolve(input: &str) -> ScanMode {
        input.parse().unwrap_or_default()
    }

    pub fn reports_quality(&self) -> bool {
        matches!(self, ScanMode::Standard)
    }
}

impl FromStr for ScanMode {
    type Err = UnknownScanMode;

    /// Case-insensitive; surrounding whitespace is ignored. `NORMAL` is an
    /// alias of `STANDARD`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STANDARD" | "NORMAL" => Ok(ScanMode::Standard),
            "EXPRESS" => Ok(ScanMode::Express),
            _ => Err(UnknownScanMode(s.to_string())),
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.token())
    }
}
