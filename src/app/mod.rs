// Application layer: wires configuration to concrete adapters.

use crate::adapters::{
    CachedTranslator, HttpAssistant, HttpTranslator, LocalStorage, OfflineAssistant,
    PassthroughTranslator,
};
use crate::config::{AppConfig, TranslationProvider};
use crate::core::catalog::Catalog;
use crate::core::glossary::Glossary;
use crate::core::session::SessionStore;
use crate::domain::ports::{Assistant, Translator};
use crate::utils::error::{FormError, Result};
use std::sync::Arc;

/// Shared state handed to every request handler.
pub struct AppState {
    pub config: AppConfig,
    pub catalog: Arc<Catalog>,
    pub glossary: Arc<Glossary>,
    pub sessions: Arc<SessionStore<LocalStorage>>,
    pub translator: Arc<dyn Translator>,
    pub assistant: Arc<dyn Assistant>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        catalog: Catalog,
        glossary: Glossary,
        translator: Arc<dyn Translator>,
        assistant: Arc<dyn Assistant>,
    ) -> Self {
        let storage = LocalStorage::new(config.storage.data_dir.clone());
        Self {
            config,
            catalog: Arc::new(catalog),
            glossary: Arc::new(glossary),
            sessions: Arc::new(SessionStore::new(storage)),
            translator,
            assistant,
        }
    }

    pub fn from_config(config: AppConfig) -> Result<Self> {
        let mut catalog = Catalog::builtin();
        if let Some(dir) = &config.forms.directory {
            let loaded = catalog.load_forms_dir(dir)?;
            tracing::info!("📄 Loaded {} form schema(s) from {}", loaded, dir);
        }

        let mut glossary = Glossary::builtin();
        for file in &config.glossary.extra_files {
            let merged = glossary.merge_file(file)?;
            tracing::info!("📖 Merged {} glossary term(s) from {}", merged, file);
        }

        let translator = build_translator(&config)?;
        let assistant = build_assistant(&config)?;

        Ok(Self::new(config, catalog, glossary, translator, assistant))
    }

    /// Accepts a language only when the catalog lists it.
    pub fn check_language(&self, code: &str) -> Result<()> {
        self.catalog.language(code).map(|_| ())
    }
}

fn build_translator(config: &AppConfig) -> Result<Arc<dyn Translator>> {
    match config.translation.provider {
        TranslationProvider::None => {
            tracing::warn!("No translation provider configured, forms will be shown in English");
            Ok(Arc::new(PassthroughTranslator))
        }
        TranslationProvider::Libretranslate => {
            let endpoint = config.translation.endpoint.as_deref().ok_or_else(|| {
                FormError::MissingConfigError {
                    field: "translation.endpoint".to_string(),
                }
            })?;
            tracing::info!("🌐 Translation provider: {}", endpoint);
            let http = HttpTranslator::new(
                endpoint,
                config.translation.api_key.clone(),
                config.translation.timeout_seconds,
            )?;
            Ok(Arc::new(CachedTranslator::new(http)))
        }
    }
}

fn build_assistant(config: &AppConfig) -> Result<Arc<dyn Assistant>> {
    if !config.assistant.enabled {
        tracing::info!("Assistant disabled, answering from help text and glossary");
        return Ok(Arc::new(OfflineAssistant));
    }

    let api_key = config
        .assistant
        .api_key
        .clone()
        .ok_or_else(|| FormError::MissingConfigError {
            field: "assistant.api_key".to_string(),
        })?;
    tracing::info!(
        "🤖 Assistant: {} ({})",
        config.assistant.endpoint,
        config.assistant.model
    );
    Ok(Arc::new(HttpAssistant::new(
        &config.assistant.endpoint,
        api_key,
        config.assistant.model.clone(),
        config.assistant.temperature,
        config.assistant.timeout_seconds,
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_default_config() {
        let state = AppState::from_config(AppConfig::default()).unwrap();
        assert!(state.check_language("tr").is_ok());
        assert!(state.check_language("zz").is_err());
        assert_eq!(state.catalog.forms().len(), 1);
    }

    #[test]
    fn test_missing_forms_dir_fails() {
        let mut config = AppConfig::default();
        config.forms.directory = Some("/nonexistent/formbridge/forms".to_string());
        assert!(AppState::from_config(config).is_err());
    }

    #[test]
    fn test_enabled_assistant_needs_key() {
        let mut config = AppConfig::default();
        config.assistant.enabled = true;
        assert!(matches!(
            AppState::from_config(config),
            Err(FormError::MissingConfigError { .. })
        ));
    }
}
