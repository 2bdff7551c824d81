use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Scope tag on a descriptor dependency, deciding when it is needed.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum MavenScope {
    #[default]
    Compile,
    Provided,
    Runtime,
    Test,
    System,
    Import,
}

impl MavenScope {
    /// Parses a descriptor `<scope>` value; absent or unknown values fall back to `compile`.
    #[must_use]
    pub fn from_descriptor(raw: Option<&str>) -> Self {
        raw.and_then(|value| value.trim().parse().ok())
            .unwrap_or(Self::Compile)
    }
}
