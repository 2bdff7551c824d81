//! Snapshot `maven-metadata.xml` model and selection rules.

use roxmltree::{Document, Node, ParsingOptions};
use serde::Serialize;

use crate::Coordinate;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    #[error("malformed snapshot metadata: {0}")]
    Malformed(String),
}

/// One `<snapshotVersion>` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotVersionEntry {
    pub classifier: Option<String>,
    pub extension: String,
    pub value: String,
    pub build_number: u32,
}

impl SnapshotVersionEntry {
    fn matches(&self, classifier: Option<&str>, extension: &str) -> bool {
        self.classifier.as_deref() == classifier && self.extension == extension
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotMetadata {
    pub timestamp: Option<String>,
    pub build_number: Option<String>,
    pub versions: Vec<SnapshotVersionEntry>,
}

impl SnapshotMetadata {
    /// Parses metadata from untrusted XML. Documents carrying a DOCTYPE are rejected, so no
    /// entity expansion can happen.
    ///
    /// # Errors
    /// Returns [`MetadataError::Malformed`] for invalid XML or a DOCTYPE declaration.
    pub fn parse(xml: &str) -> Result<Self, MetadataError> {
        let document = parse_untrusted(xml)?;
        let root = document.root_element();

        let mut metadata = Self::default();
        if let Some(snapshot) = root.descendants().find(|node| node.has_tag_name("snapshot")) {
            for child in snapshot.children().filter(Node::is_element) {
                match child.tag_name().name() {
                    "timestamp" => metadata.timestamp = Some(text_of(child)),
                    "buildNumber" => metadata.build_number = Some(text_of(child)),
                    _ => {}
                }
            }
        }

        for entry in root
            .descendants()
            .filter(|node| node.has_tag_name("snapshotVersion"))
        {
            let mut classifier = None;
            let mut extension = None;
            let mut value = None;
            for child in entry.children().filter(Node::is_element) {
                match child.tag_name().name() {
                    "classifier" => classifier = Some(text_of(child)),
                    "extension" => extension = Some(text_of(child)),
                    "value" => value = Some(text_of(child)),
                    _ => {}
                }
            }
            let (Some(extension), Some(value)) = (extension, value) else {
                continue;
            };
            metadata.versions.push(SnapshotVersionEntry {
                classifier: classifier.filter(|c| !c.is_empty()),
                extension,
                build_number: trailing_build_number(&value),
                value,
            });
        }

        Ok(metadata)
    }

    /// Newest entry for the classifier/extension pair: highest build number, then the
    /// lexicographically greatest version string.
    #[must_use]
    pub fn find_version(&self, classifier: Option<&str>, extension: &str) -> Option<&str> {
        self.versions
            .iter()
            .filter(|entry| entry.matches(classifier, extension))
            .max_by(|a, b| {
                a.build_number
                    .cmp(&b.build_number)
                    .then_with(|| a.value.cmp(&b.value))
            })
            .map(|entry| entry.value.as_str())
    }

    /// Falls back to `<timestamp>-<buildNumber>` substitution when both are present.
    #[must_use]
    pub fn timestamped_version(&self, coordinate: &Coordinate) -> Option<String> {
        match (&self.timestamp, &self.build_number) {
            (Some(timestamp), Some(build)) => {
                Some(coordinate.timestamped_version(timestamp, build))
            }
            _ => None,
        }
    }

    /// Concrete version string for a coordinate's file with the given extension.
    #[must_use]
    pub fn resolve_version(&self, coordinate: &Coordinate, extension: &str) -> Option<String> {
        self.find_version(coordinate.classifier(), extension)
            .map(ToOwned::to_owned)
            .or_else(|| self.timestamped_version(coordinate))
    }
}

pub(crate) fn parse_untrusted(xml: &str) -> Result<Document<'_>, MetadataError> {
    let options = ParsingOptions {
        allow_dtd: false,
        ..ParsingOptions::default()
    };
    Document::parse_with_options(xml, options).map_err(|err| MetadataError::Malformed(err.to_string()))
}

pub(crate) fn text_of(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(Node::is_text)
        .filter_map(|text| text.text())
        .collect::<String>()
        .trim()
        .to_string()
}

fn trailing_build_number(value: &str) -> u32 {
    match value.rsplit_once('-') {
        Some((_, tail)) if !tail.is_empty() => tail.parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const METADATA: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata>
  <groupId>com.example</groupId>
  <artifactId>lib</artifactId>
  <version>1.0-SNAPSHOT</version>
  <versioning>
    <snapshot>
      <timestamp>20240301.120000</timestamp>
      <buildNumber>9</buildNumber>
    </snapshot>
    <snapshotVersions>
      <snapshotVersion>
        <extension>jar</extension>
        <value>1.0-20240101.080000-3</value>
      </snapshotVersion>
      <snapshotVersion>
        <extension>jar</extension>
        <value>1.0-20240201.080000-7</value>
      </snapshotVersion>
      <snapshotVersion>
        <classifier>sources</classifier>
        <extension>jar</extension>
        <value>1.0-20240201.080000-8</value>
      </snapshotVersion>
      <snapshotVersion>
        <extension>pom</extension>
        <value>1.0-20240201.080000-7</value>
      </snapshotVersion>
    </snapshotVersions>
  </versioning>
</metadata>"#;

    fn snapshot_coordinate(classifier: Option<&str>) -> Coordinate {
        Coordinate::new("com.example", "lib", "1.0-SNAPSHOT", classifier).unwrap()
    }

    #[test]
    fn selects_highest_build_number() {
        let metadata = SnapshotMetadata::parse(METADATA).unwrap();
        assert_eq!(metadata.versions.len(), 4);
        assert_eq!(metadata.find_version(None, "jar"), Some("1.0-20240201.080000-7"));
        assert_eq!(
            metadata.find_version(Some("sources"), "jar"),
            Some("1.0-20240201.080000-8")
        );
    }

    #[test]
    fn ties_break_on_greatest_version_string() {
        let metadata = SnapshotMetadata {
            timestamp: None,
            build_number: None,
            versions: vec![
                SnapshotVersionEntry {
                    classifier: None,
                    extension: "jar".into(),
                    value: "1.0-20240101.000000-5".into(),
                    build_number: 5,
                },
                SnapshotVersionEntry {
                    classifier: None,
                    extension: "jar".into(),
                    value: "1.0-20240202.000000-5".into(),
                    build_number: 5,
                },
            ],
        };
        assert_eq!(metadata.find_version(None, "jar"), Some("1.0-20240202.000000-5"));
    }

    #[test]
    fn falls_back_to_timestamp_when_no_entry_matches() {
        let metadata = SnapshotMetadata::parse(METADATA).unwrap();
        let coordinate = snapshot_coordinate(Some("javadoc"));
        assert_eq!(
            metadata.resolve_version(&coordinate, "jar").as_deref(),
            Some("1.0-20240301.120000-9")
        );
    }

    #[test]
    fn no_entry_and_no_timestamp_yields_none() {
        let xml = "<metadata><versioning><snapshotVersions/></versioning></metadata>";
        let metadata = SnapshotMetadata::parse(xml).unwrap();
        assert_eq!(metadata.resolve_version(&snapshot_coordinate(None), "jar"), None);
    }

    #[test]
    fn entries_without_value_are_skipped() {
        let xml = "<metadata><snapshotVersion><extension>jar</extension></snapshotVersion>\
                   <snapshotVersion><extension>jar</extension><value>1.0-x</value></snapshotVersion></metadata>";
        let metadata = SnapshotMetadata::parse(xml).unwrap();
        assert_eq!(metadata.versions.len(), 1);
        assert_eq!(metadata.versions[0].build_number, 0);
    }

    #[test]
    fn rejects_doctype_declarations() {
        let xml = r#"<?xml version="1.0"?>
<!DOCTYPE metadata [<!ENTITY xxe SYSTEM "file:///etc/passwd">]>
<metadata><versioning><snapshot><timestamp>&xxe;</timestamp></snapshot></versioning></metadata>"#;
        assert!(matches!(
            SnapshotMetadata::parse(xml),
            Err(MetadataError::Malformed(_))
        ));
    }
}
