//! Repository protocol resolution: release and snapshot addressing, bounded HTTP fetches of
//! untrusted documents, and transitive discovery through descriptors.

mod error;
pub mod http;
mod repository;
mod transitive;

pub use error::ResolutionError;
pub use http::{HttpClient, HttpError, HttpSettings};
pub use repository::{MavenResolver, RepositoryResolver};
pub use transitive::{TransitiveResolver, TransitiveResolverBuilder, DEFAULT_MAX_DESCRIPTORS};
