//! Maven coordinate model, repository addressing, and the descriptor/metadata documents the
//! resolver consumes. Nothing in this crate touches the network.

mod coordinate;
pub mod declared;
mod descriptor;
mod repository;
mod scope;
mod sets;
mod snapshot;

pub use coordinate::{Coordinate, CoordinateError};
pub use declared::{ConfigError, DeclaredConfig};
pub use descriptor::{Descriptor, DescriptorDependency, DescriptorError};
pub use repository::{
    MavenRepository, RepositoryUrlError, JITPACK_URL, MAVEN_CENTRAL_URL, MINECRAFT_URL, PAPER_URL,
};
pub use scope::MavenScope;
pub use sets::{RelocationRule, RelocationRules, RepositorySet};
pub use snapshot::{MetadataError, SnapshotMetadata, SnapshotVersionEntry};
