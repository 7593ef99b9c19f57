pub mod local;
pub mod qdrant;

pub use local::{LocalIndex, LOCAL_INDEX_FILE};
pub use qdrant::QdrantStore;
