use crate::utils::error::{FormError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub translation: TranslationConfig,
    pub assistant: AssistantConfig,
    pub glossary: GlossaryConfig,
    pub forms: FormsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub cors_allow_any: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
            cors_allow_any: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    /// Forms are shown in English only.
    #[default]
    None,
    Libretranslate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    pub provider: TranslationProvider,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
    pub concurrent_requests: usize,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::None,
            endpoint: None,
            api_key: None,
            timeout_seconds: 10,
            concurrent_requests: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlossaryConfig {
    pub extra_files: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FormsConfig {
    pub directory: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(FormError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| FormError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR_NAME}` with the environment value. Unset variables are
    /// left as-is so validation can point at them.
    fn substitute_env_vars(content: &str) -> String {
        static ENV_VAR: OnceLock<Regex> = OnceLock::new();
        let re = ENV_VAR.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid regex"));

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .to_string()
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_socket_addr("server.bind", &self.server.bind)?;
        validation::validate_path("storage.data_dir", &self.storage.data_dir)?;

        if self.translation.provider == TranslationProvider::Libretranslate {
            let endpoint =
                validation::validate_required_field("translation.endpoint", &self.translation.endpoint)?;
            validation::validate_url("translation.endpoint", endpoint)?;
            validation::validate_positive_number(
                "translation.concurrent_requests",
                self.translation.concurrent_requests,
                1,
            )?;
            validation::validate_positive_number(
                "translation.timeout_seconds",
                self.translation.timeout_seconds as usize,
                1,
            )?;
        }

        if self.assistant.enabled {
            validation::validate_url("assistant.endpoint", &self.assistant.endpoint)?;
            validation::validate_non_empty_string("assistant.model", &self.assistant.model)?;
            let key = validation::validate_required_field("assistant.api_key", &self.assistant.api_key)?;
            if key.starts_with("${") {
                return Err(FormError::MissingConfigError {
                    field: format!("assistant.api_key (environment variable {})", key),
                });
            }
            validation::validate_range("assistant.temperature", self.assistant.temperature, 0.0, 2.0)?;
        }

        validation::validate_file_extensions("glossary.extra_files", &self.glossary.extra_files, &["toml"])?;

        if let Some(dir) = &self.forms.directory {
            validation::validate_path("forms.directory", dir)?;
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(FormError::InvalidConfigValueError {
                field: "logging.level".to_string(),
                value: self.logging.level.clone(),
                reason: format!("Valid levels: {}", valid_levels.join(", ")),
            });
        }

        Ok(())
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();

        assert_eq!(config.server.bind, "127.0.0.1:8000");
        assert_eq!(config.storage.data_dir, "./data");
        assert_eq!(config.translation.provider, TranslationProvider::None);
        assert!(!config.assistant.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[server]
bind = "0.0.0.0:9000"

[storage]
data_dir = "/var/lib/formbridge"

[translation]
provider = "libretranslate"
endpoint = "https://translate.example.com"
concurrent_requests = 8

[assistant]
enabled = true
endpoint = "https://llm.example.com/v1"
api_key = "secret"
model = "small-model"

[glossary]
extra_files = ["terms.toml"]

[logging]
level = "debug"
json = true
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert_eq!(config.translation.provider, TranslationProvider::Libretranslate);
        assert_eq!(config.translation.concurrent_requests, 8);
        assert_eq!(config.translation.timeout_seconds, 10);
        assert_eq!(config.assistant.model, "small-model");
        assert!(config.logging.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("FORMBRIDGE_TEST_TRANSLATE_URL", "https://translate.test");

        let toml_content = r#"
[translation]
provider = "libretranslate"
endpoint = "${FORMBRIDGE_TEST_TRANSLATE_URL}"
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(
            config.translation.endpoint.as_deref(),
            Some("https://translate.test")
        );

        std::env::remove_var("FORMBRIDGE_TEST_TRANSLATE_URL");
    }

    #[test]
    fn test_translation_provider_requires_endpoint() {
        let config = AppConfig::from_toml_str("[translation]\nprovider = \"libretranslate\"\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(FormError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_assistant_with_unresolved_key_is_rejected() {
        let toml_content = r#"
[assistant]
enabled = true
api_key = "${FORMBRIDGE_TEST_UNSET_KEY}"
"#;
        let config = AppConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_bind_address() {
        let config = AppConfig::from_toml_str("[server]\nbind = \"nowhere\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[storage]\ndata_dir = \"./sessions\"\n")
            .unwrap();

        let config = AppConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.storage.data_dir, "./sessions");
    }
}
