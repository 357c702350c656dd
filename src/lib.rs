pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{Cli, Command};

pub use adapters::{LocalStorage, PassthroughTranslator};
pub use app::AppState;
pub use config::AppConfig;
pub use core::catalog::Catalog;
pub use core::export::{ExportEngine, ExportPipeline};
pub use core::glossary::Glossary;
pub use utils::error::{FormError, Result};
