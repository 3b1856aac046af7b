//! Shared filesystem primitives: atomic writes, content digests, and the
//! per-application config/cache directory layout. None of this is specific
//! to the solver; it's the kind of small, dependency-light utility crate
//! every layer above it (`Policy`, `FetchCoordinator`, the `Store`/`ini`
//! config glue) ends up needing.

pub mod atomic;
pub mod basedir;
pub mod digest;

pub use atomic::{write_file_atomic, AtomicError};
pub use digest::{digest_tree, DigestAlgorithm, DigestError};
