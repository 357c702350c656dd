use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("PDF generation error: {0}")]
    PdfError(#[from] lopdf::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Unsupported language: {code}")]
    UnsupportedLanguage { code: String },

    #[error("Invalid request body: {message}")]
    InvalidRequest { message: String },

    #[error("Invalid value for field '{field}': {reason}")]
    InvalidFieldValue { field: String, reason: String },

    #[error("Form is incomplete, missing required fields: {}", fields.join(", "))]
    IncompleteForm { fields: Vec<String> },

    #[error("Invalid form schema '{form}': {reason}")]
    SchemaError { form: String, reason: String },

    #[error("Translation service error: {message}")]
    TranslationError { message: String },

    #[error("Assistant service error: {message}")]
    AssistantError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    NotFound,
    ExternalService,
    Storage,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl FormError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        FormError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        FormError::InvalidFieldValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            FormError::ConfigError { .. }
            | FormError::ConfigValidationError { .. }
            | FormError::InvalidConfigValueError { .. }
            | FormError::MissingConfigError { .. }
            | FormError::SchemaError { .. } => ErrorCategory::Configuration,
            FormError::UnsupportedLanguage { .. }
            | FormError::InvalidRequest { .. }
            | FormError::InvalidFieldValue { .. }
            | FormError::IncompleteForm { .. } => ErrorCategory::Input,
            FormError::NotFound { .. } => ErrorCategory::NotFound,
            FormError::ApiError(_)
            | FormError::TranslationError { .. }
            | FormError::AssistantError { .. } => ErrorCategory::ExternalService,
            FormError::IoError(_) | FormError::ZipError(_) => ErrorCategory::Storage,
            FormError::CsvError(_) | FormError::SerializationError(_) | FormError::PdfError(_) => {
                ErrorCategory::Internal
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input | ErrorCategory::NotFound => ErrorSeverity::Low,
            ErrorCategory::ExternalService => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::Internal => ErrorSeverity::High,
            ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    /// Stable machine-readable code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            FormError::NotFound { .. } => "not_found",
            FormError::UnsupportedLanguage { .. } => "unsupported_language",
            FormError::InvalidRequest { .. } => "invalid_request",
            FormError::InvalidFieldValue { .. } => "invalid_field_value",
            FormError::IncompleteForm { .. } => "incomplete_form",
            FormError::TranslationError { .. } => "translation_failed",
            FormError::AssistantError { .. } => "assistant_failed",
            FormError::ApiError(_) => "upstream_request_failed",
            _ => match self.category() {
                ErrorCategory::Configuration => "configuration",
                ErrorCategory::Storage => "storage",
                _ => "internal",
            },
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            FormError::ConfigError { .. } | FormError::ConfigValidationError { .. } => {
                "Check the configuration file syntax and values".to_string()
            }
            FormError::InvalidConfigValueError { field, .. } => {
                format!("Fix the value of '{}' in the configuration file", field)
            }
            FormError::MissingConfigError { field } => {
                format!("Add '{}' to the configuration file or environment", field)
            }
            FormError::SchemaError { .. } => {
                "Correct the form schema JSON in the forms directory".to_string()
            }
            FormError::NotFound { kind, .. } => {
                format!("Check that the {} identifier is correct", kind.to_lowercase())
            }
            FormError::UnsupportedLanguage { .. } => {
                "Choose one of the languages listed by /api/languages".to_string()
            }
            FormError::InvalidRequest { .. } => {
                "Send a JSON body with the fields this endpoint expects".to_string()
            }
            FormError::InvalidFieldValue { .. } => {
                "Correct the value using the format shown in the field help".to_string()
            }
            FormError::IncompleteForm { .. } => {
                "Fill in all required fields before exporting".to_string()
            }
            FormError::ApiError(_)
            | FormError::TranslationError { .. }
            | FormError::AssistantError { .. } => {
                "Check the service endpoint and API key, then retry".to_string()
            }
            FormError::IoError(_) | FormError::ZipError(_) => {
                "Check that the data directory exists and is writable".to_string()
            }
            FormError::CsvError(_) | FormError::SerializationError(_) | FormError::PdfError(_) => {
                "Retry the request; report the problem if it persists".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Input => self.to_string(),
            ErrorCategory::NotFound => self.to_string(),
            ErrorCategory::ExternalService => {
                format!("An external service is unavailable: {}", self)
            }
            ErrorCategory::Storage => format!("Could not read or write saved data: {}", self),
            ErrorCategory::Internal => format!("Unexpected internal error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, FormError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_errors_are_low_severity() {
        let err = FormError::invalid_field("date_of_birth", "expected YYYY-MM-DD");
        assert_eq!(err.category(), ErrorCategory::Input);
        assert_eq!(err.severity(), ErrorSeverity::Low);
        assert_eq!(err.code(), "invalid_field_value");
    }

    #[test]
    fn test_incomplete_form_lists_fields() {
        let err = FormError::IncompleteForm {
            fields: vec!["family_name".to_string(), "uci".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Form is incomplete, missing required fields: family_name, uci"
        );
    }

    #[test]
    fn test_config_errors_have_suggestions() {
        let err = FormError::MissingConfigError {
            field: "translation.endpoint".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert!(err.recovery_suggestion().contains("translation.endpoint"));
    }
}
