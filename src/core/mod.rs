//! The data model (spec.md §3): interfaces, implementations, dependency
//! edges, and the version/stability scalars they're ordered by.

pub mod implementation;
pub mod interface;
pub mod stability;
pub mod version;

pub use implementation::{
    Binding, Dependency, DownloadSource, Implementation, Recipe, RetrievalMethod, Restriction, Uri,
};
pub use interface::{FeedRef, Interface};
pub use stability::Stability;
pub use version::Version;
