//! File-backed persistence for songvec: the model artifact, record corpora
//! and encoded outputs, plus the hot-swappable model registry used when
//! serving.

pub mod artifact;
pub mod corpus;
pub mod registry;

pub use artifact::{decode_artifact, encode_artifact, ArtifactDescription, ArtifactStore};
pub use corpus::{read_embedded, read_records, write_embedded};
pub use registry::ModelRegistry;
