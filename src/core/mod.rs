pub mod assist;
pub mod catalog;
pub mod export;
pub mod glossary;
pub mod localize;
pub mod pdf;
pub mod session;
pub mod values;

pub use crate::domain::model::{FormSchema, FormSession, LocalizedForm};
pub use crate::domain::ports::{Assistant, Pipeline, Storage, Translator};
pub use crate::utils::error::Result;
