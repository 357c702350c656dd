use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Every form is authored in English; translations are derived from it.
pub const SOURCE_LANGUAGE: &str = "en";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub code: String,
    pub label: String,
    pub flag: String,
    pub greeting: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub const LETTER: PageSize = PageSize {
        width: 612.0,
        height: 792.0,
    };
}

/// Position of a field on the printed form, in PDF points with the origin
/// at the bottom-left corner of the page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldBox {
    pub page: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Text {
        #[serde(default = "default_max_len")]
        max_len: usize,
    },
    Date,
    Number {
        min: Option<f64>,
        max: Option<f64>,
    },
    Email,
    Phone,
    Checkbox,
    Choice {
        options: Vec<ChoiceOption>,
    },
}

fn default_max_len() -> usize {
    100
}

impl FieldKind {
    pub fn option(&self, id: &str) -> Option<&ChoiceOption> {
        match self {
            FieldKind::Choice { options } => options.iter().find(|o| o.id == id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub help: Option<String>,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    /// Free text that should be converted back to English on export.
    /// Names, addresses and identifiers are copied verbatim.
    #[serde(default)]
    pub translatable: bool,
    pub layout: FieldBox,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub fields: Vec<FieldSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSchema {
    pub id: String,
    /// Official form number, e.g. `IMM 5444`.
    pub code: String,
    pub title: String,
    pub pages: Vec<PageSize>,
    pub sections: Vec<Section>,
}

impl FormSchema {
    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.sections.iter().flat_map(|s| s.fields.iter())
    }

    pub fn field(&self, id: &str) -> Option<&FieldSpec> {
        self.fields().find(|f| f.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizedText {
    pub text: String,
    pub source: String,
}

impl LocalizedText {
    pub fn untranslated(source: &str) -> Self {
        Self {
            text: source.to_string(),
            source: source.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizedOption {
    pub id: String,
    pub label: LocalizedText,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizedField {
    pub id: String,
    pub label: LocalizedText,
    pub help: Option<LocalizedText>,
    pub kind: FieldKind,
    pub options: Vec<LocalizedOption>,
    pub required: bool,
    pub layout: FieldBox,
    /// Font scale to apply to the translated label so it fits in the space
    /// of the English one.
    pub label_scale: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizedSection {
    pub id: String,
    pub title: LocalizedText,
    pub fields: Vec<LocalizedField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizedForm {
    pub id: String,
    pub code: String,
    pub language: String,
    pub title: LocalizedText,
    pub pages: Vec<PageSize>,
    pub sections: Vec<LocalizedSection>,
}

impl LocalizedForm {
    pub fn fields(&self) -> impl Iterator<Item = &LocalizedField> {
        self.sections.iter().flat_map(|s| s.fields.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlossaryTerm {
    pub term: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub definition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermMatch {
    pub term: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tooltip {
    pub term: String,
    pub definition: String,
    pub source_definition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Bool(bool),
    Number(f64),
    Choice(String),
    Date(NaiveDate),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSession {
    pub id: Uuid,
    pub form_id: String,
    pub language: String,
    pub values: BTreeMap<String, FieldValue>,
    /// Language the applicant was using when each value was entered.
    #[serde(default)]
    pub value_languages: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FormSession {
    pub fn new(form_id: &str, language: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            form_id: form_id.to_string(),
            language: language.to_string(),
            values: BTreeMap::new(),
            value_languages: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Language `field_id` was entered in. Values stored before languages
    /// were tracked fall back to the session language.
    pub fn value_language(&self, field_id: &str) -> &str {
        self.value_languages
            .get(field_id)
            .map(String::as_str)
            .unwrap_or(&self.language)
    }
}

/// A completed form with every answer rendered as English text, in schema order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnglishAnswers {
    pub session_id: Uuid,
    pub form_id: String,
    pub form_code: String,
    pub source_language: String,
    pub answers: Vec<Answer>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub field_id: String,
    pub label: String,
    pub value: String,
    /// The value as the applicant typed it, when it differs from `value`.
    pub original: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExportBundle {
    pub answers: EnglishAnswers,
    pub pdf: Vec<u8>,
}
