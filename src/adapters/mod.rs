// Adapters layer: concrete implementations of the domain ports.

pub mod assistant;
pub mod storage;
pub mod translation;

pub use assistant::{HttpAssistant, OfflineAssistant};
pub use storage::LocalStorage;
pub use translation::{CachedTranslator, HttpTranslator, PassthroughTranslator};
