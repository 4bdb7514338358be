pub mod hash;
pub mod record;
pub mod storage;
pub mod store;

pub use record::{DuoMetadata, GenerationMetadata, HistoryRecord, NewHistoryRecord};
pub use storage::LocalFileStorage;
pub use store::HistoryStore;
