//! The practical subset of a POM descriptor needed for transitive discovery.

use roxmltree::Node;
use serde::Serialize;

use crate::snapshot::{parse_untrusted, text_of};
use crate::{Coordinate, MavenScope};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    #[error("malformed descriptor for {coordinate}: {reason}")]
    Malformed { coordinate: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescriptorDependency {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub classifier: Option<String>,
    pub scope: MavenScope,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Descriptor {
    pub dependencies: Vec<DescriptorDependency>,
    pub repositories: Vec<String>,
}

impl Descriptor {
    /// Reads the top-level `<dependencies>` and `<repositories>` blocks. Nested blocks such as
    /// `<dependencyManagement>` are not consulted.
    ///
    /// # Errors
    /// Returns [`DescriptorError::Malformed`] when the document is not acceptable XML.
    pub fn parse(owner: &Coordinate, xml: &str) -> Result<Self, DescriptorError> {
        let document = parse_untrusted(xml).map_err(|err| DescriptorError::Malformed {
            coordinate: owner.to_string(),
            reason: err.to_string(),
        })?;
        let mut descriptor = Self::default();
        for block in document.root_element().children().filter(Node::is_element) {
            match block.tag_name().name() {
                "dependencies" => {
                    descriptor.dependencies = block
                        .children()
                        .filter(Node::is_element)
                        .filter_map(parse_dependency)
                        .collect();
                }
                "repositories" => {
                    descriptor.repositories = block
                        .children()
                        .filter(Node::is_element)
                        .filter_map(|repo| {
                            repo.descendants()
                                .find(|node| node.has_tag_name("url"))
                                .map(text_of)
                        })
                        .filter(|url| !url.is_empty())
                        .collect();
                }
                _ => {}
            }
        }
        Ok(descriptor)
    }

    /// Dependencies whose scope is accepted, with `${project.groupId}` / `${project.version}`
    /// substituted from `owner`. Entries with an empty version are dropped.
    pub fn coordinates_for<'a>(
        &'a self,
        owner: &'a Coordinate,
        accepts: impl Fn(MavenScope) -> bool + 'a,
    ) -> impl Iterator<Item = Coordinate> + 'a {
        self.dependencies
            .iter()
            .filter(move |dependency| accepts(dependency.scope))
            .filter_map(move |dependency| {
                let group_id = owner.interpolate(&dependency.group_id);
                let version = owner.interpolate(&dependency.version);
                if version.is_empty() {
                    return None;
                }
                Coordinate::new(
                    group_id,
                    dependency.artifact_id.clone(),
                    version,
                    dependency.classifier.as_deref(),
                )
                .ok()
            })
    }
}

fn parse_dependency(node: Node<'_, '_>) -> Option<DescriptorDependency> {
    let field = |name: &str| {
        node.children()
            .find(|child| child.has_tag_name(name))
            .map(text_of)
    };
    let group_id = field("groupId").filter(|value| !value.is_empty())?;
    let artifact_id = field("artifactId").filter(|value| !value.is_empty())?;
    Some(DescriptorDependency {
        group_id,
        artifact_id,
        version: field("version").unwrap_or_default(),
        classifier: field("classifier").filter(|value| !value.is_empty()),
        scope: MavenScope::from_descriptor(field("scope").as_deref()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const POM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
  <modelVersion>4.0.0</modelVersion>
  <groupId>com.example</groupId>
  <artifactId>app</artifactId>
  <version>2.1</version>
  <dependencyManagement>
    <dependencies>
      <dependency>
        <groupId>com.managed</groupId>
        <artifactId>bom</artifactId>
        <version>9</version>
      </dependency>
    </dependencies>
  </dependencyManagement>
  <dependencies>
    <dependency>
      <groupId>com.example</groupId>
      <artifactId>core</artifactId>
      <version>1.0</version>
    </dependency>
    <dependency>
      <groupId>${project.groupId}</groupId>
      <artifactId>sibling</artifactId>
      <version>${project.version}</version>
      <scope>runtime</scope>
    </dependency>
    <dependency>
      <groupId>junit</groupId>
      <artifactId>junit</artifactId>
      <version>4.13</version>
      <scope>test</scope>
    </dependency>
    <dependency>
      <groupId>com.example</groupId>
      <artifactId>unversioned</artifactId>
    </dependency>
  </dependencies>
  <repositories>
    <repository>
      <id>extra</id>
      <url>https://extra.example.com/maven</url>
    </repository>
    <repository>
      <id>no-url</id>
    </repository>
  </repositories>
</project>"#;

    fn owner() -> Coordinate {
        Coordinate::new("com.example", "app", "2.1", None).unwrap()
    }

    #[test]
    fn parses_top_level_blocks_only() {
        let descriptor = Descriptor::parse(&owner(), POM).unwrap();
        let names: Vec<&str> = descriptor
            .dependencies
            .iter()
            .map(|dep| dep.artifact_id.as_str())
            .collect();
        assert_eq!(names, ["core", "sibling", "junit", "unversioned"]);
        assert_eq!(descriptor.repositories, ["https://extra.example.com/maven"]);
    }

    #[test]
    fn substitutes_project_properties_and_filters_scope() {
        let owner = owner();
        let descriptor = Descriptor::parse(&owner, POM).unwrap();
        let runtime: Vec<Coordinate> = descriptor
            .coordinates_for(&owner, |scope| scope == MavenScope::Runtime)
            .collect();
        assert_eq!(
            runtime,
            [Coordinate::new("com.example", "sibling", "2.1", None).unwrap()]
        );

        let compile: Vec<String> = descriptor
            .coordinates_for(&owner, |scope| scope == MavenScope::Compile)
            .map(|c| c.to_string())
            .collect();
        assert_eq!(compile, ["com.example:core:1.0"]);
    }

    #[test]
    fn malformed_xml_is_reported() {
        let err = Descriptor::parse(&owner(), "<project><dependencies>").unwrap_err();
        assert!(err.to_string().contains("com.example:app:2.1"));
    }
}
