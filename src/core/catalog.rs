use crate::domain::model::{
    ChoiceOption, FieldBox, FieldKind, FieldSpec, FormSchema, Language, PageSize, Section,
};
use crate::utils::error::{FormError, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

pub const PR_CARD_FORM_ID: &str = "pr-card";

#[derive(Debug, Clone, Serialize)]
pub struct FormSummary {
    pub id: String,
    pub code: String,
    pub title: String,
    pub field_count: usize,
}

/// Languages and form schemas known to the application.
#[derive(Debug, Clone)]
pub struct Catalog {
    languages: Vec<Language>,
    forms: BTreeMap<String, FormSchema>,
}

impl Catalog {
    pub fn builtin() -> Self {
        let mut forms = BTreeMap::new();
        let pr_card = pr_card_form();
        forms.insert(pr_card.id.clone(), pr_card);
        Self {
            languages: builtin_languages(),
            forms,
        }
    }

    /// Adds every `*.json` schema in `dir`. A schema with the id of an
    /// existing form replaces it.
    pub fn load_forms_dir<P: AsRef<Path>>(&mut self, dir: P) -> Result<usize> {
        let mut loaded = 0;
        let mut entries: Vec<_> = std::fs::read_dir(dir.as_ref())?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect();
        entries.sort();

        for path in entries {
            let content = std::fs::read_to_string(&path)?;
            let schema: FormSchema =
                serde_json::from_str(&content).map_err(|e| FormError::SchemaError {
                    form: path.display().to_string(),
                    reason: e.to_string(),
                })?;
            validate_schema(&schema)?;
            if self.forms.contains_key(&schema.id) {
                tracing::warn!("Form '{}' from {} replaces an existing form", schema.id, path.display());
            }
            tracing::info!("Loaded form '{}' ({}) from {}", schema.id, schema.code, path.display());
            self.forms.insert(schema.id.clone(), schema);
            loaded += 1;
        }

        Ok(loaded)
    }

    pub fn languages(&self) -> &[Language] {
        &self.languages
    }

    pub fn language(&self, code: &str) -> Result<&Language> {
        self.languages
            .iter()
            .find(|l| l.code == code)
            .ok_or_else(|| FormError::UnsupportedLanguage {
                code: code.to_string(),
            })
    }

    pub fn forms(&self) -> Vec<FormSummary> {
        self.forms
            .values()
            .map(|f| FormSummary {
                id: f.id.clone(),
                code: f.code.clone(),
                title: f.title.clone(),
                field_count: f.fields().count(),
            })
            .collect()
    }

    pub fn form(&self, id: &str) -> Result<&FormSchema> {
        self.forms
            .get(id)
            .ok_or_else(|| FormError::not_found("Form", id))
    }
}

pub fn validate_schema(schema: &FormSchema) -> Result<()> {
    let fail = |reason: String| FormError::SchemaError {
        form: schema.id.clone(),
        reason,
    };

    if schema.pages.is_empty() {
        return Err(fail("form has no pages".to_string()));
    }

    let mut seen = HashSet::new();
    for field in schema.fields() {
        if !seen.insert(field.id.as_str()) {
            return Err(fail(format!("duplicate field id '{}'", field.id)));
        }

        let layout = &field.layout;
        let page = schema
            .pages
            .get(layout.page)
            .ok_or_else(|| fail(format!("field '{}' is on missing page {}", field.id, layout.page)))?;
        if layout.x < 0.0
            || layout.y < 0.0
            || layout.width <= 0.0
            || layout.height <= 0.0
            || layout.x + layout.width > page.width
            || layout.y + layout.height > page.height
        {
            return Err(fail(format!("field '{}' lies outside its page", field.id)));
        }

        match &field.kind {
            FieldKind::Choice { options } => {
                if options.is_empty() {
                    return Err(fail(format!("choice field '{}' has no options", field.id)));
                }
                let mut ids = HashSet::new();
                if !options.iter().all(|o| ids.insert(o.id.as_str())) {
                    return Err(fail(format!("choice field '{}' repeats an option id", field.id)));
                }
            }
            FieldKind::Number {
                min: Some(min),
                max: Some(max),
            } if min > max => {
                return Err(fail(format!("number field '{}' has min > max", field.id)));
            }
            _ => {}
        }
    }

    Ok(())
}

fn builtin_languages() -> Vec<Language> {
    [
        ("en", "English", "🇬🇧", "Hello! This is a simple multilingual page."),
        ("es", "Espanol", "🇪🇸", "Hola. Esta es una pagina sencilla en varios idiomas."),
        ("fr", "Francais", "🇫🇷", "Bonjour. Ceci est une page simple en plusieurs langues."),
        ("de", "Deutsch", "🇩🇪", "Hallo. Dies ist eine einfache mehrsprachige Seite."),
        ("tr", "Turkce", "🇹🇷", "Merhaba. Bu, cok dilli basit bir sayfadir."),
    ]
    .into_iter()
    .map(|(code, label, flag, greeting)| Language {
        code: code.to_string(),
        label: label.to_string(),
        flag: flag.to_string(),
        greeting: greeting.to_string(),
    })
    .collect()
}

// Layout grid for the built-in form: two columns on a Letter page.
const LEFT: f32 = 48.0;
const RIGHT: f32 = 312.0;
const FULL: f32 = 516.0;
const HALF: f32 = 252.0;
const ROW: f32 = 30.0;

struct FieldBuilder(FieldSpec);

impl FieldBuilder {
    fn new(id: &str, label: &str, kind: FieldKind, page: usize, x: f32, y: f32, width: f32) -> Self {
        Self(FieldSpec {
            id: id.to_string(),
            label: label.to_string(),
            help: None,
            kind,
            required: false,
            translatable: false,
            layout: FieldBox {
                page,
                x,
                y,
                width,
                height: ROW,
            },
        })
    }

    fn help(mut self, help: &str) -> Self {
        self.0.help = Some(help.to_string());
        self
    }

    fn required(mut self) -> Self {
        self.0.required = true;
        self
    }

    fn translatable(mut self) -> Self {
        self.0.translatable = true;
        self
    }

    fn height(mut self, rows: f32) -> Self {
        self.0.layout.height = ROW * rows;
        self
    }

    fn build(self) -> FieldSpec {
        self.0
    }
}

fn text(max_len: usize) -> FieldKind {
    FieldKind::Text { max_len }
}

fn choice(options: &[(&str, &str)]) -> FieldKind {
    FieldKind::Choice {
        options: options
            .iter()
            .map(|(id, label)| ChoiceOption {
                id: id.to_string(),
                label: label.to_string(),
            })
            .collect(),
    }
}

/// Application for a Permanent Resident Card (IMM 5444).
pub fn pr_card_form() -> FormSchema {
    let application = Section {
        id: "application".to_string(),
        title: "Section A: Reason for application".to_string(),
        fields: vec![
            FieldBuilder::new(
                "reason",
                "Why are you applying for a PR card?",
                choice(&[
                    ("first_card", "I did not receive my first PR card"),
                    ("renewal", "My PR card has expired or will expire within 9 months"),
                    ("replacement", "My PR card was lost, stolen, destroyed or damaged"),
                    ("name_change", "I changed my name or sex designation"),
                ]),
                0, LEFT, 660.0, FULL,
            )
            .required()
            .build(),
            FieldBuilder::new("reason_details", "Explain the circumstances", text(300), 0, LEFT, 600.0, FULL)
                .help("If your card was lost, stolen, destroyed or damaged, describe what happened and when.")
                .translatable()
                .height(2.0)
                .build(),
        ],
    };

    let personal = Section {
        id: "personal".to_string(),
        title: "Section B: Personal details".to_string(),
        fields: vec![
            FieldBuilder::new("uci", "UCI (Unique Client Identifier)", text(10), 0, LEFT, 540.0, HALF)
                .help("The 8 or 10 digit number on your Confirmation of Permanent Residence or your previous PR card.")
                .required()
                .build(),
            FieldBuilder::new("family_name", "Family name", text(60), 0, LEFT, 500.0, HALF)
                .help("As shown on your passport or travel document.")
                .required()
                .build(),
            FieldBuilder::new("given_names", "Given name(s)", text(60), 0, RIGHT, 500.0, HALF)
                .required()
                .build(),
            FieldBuilder::new(
                "sex",
                "Sex",
                choice(&[("F", "Female"), ("M", "Male"), ("X", "Another gender")]),
                0, LEFT, 460.0, HALF,
            )
            .required()
            .build(),
            FieldBuilder::new("date_of_birth", "Date of birth", FieldKind::Date, 0, RIGHT, 460.0, HALF)
                .required()
                .build(),
            FieldBuilder::new("place_of_birth", "City or town of birth", text(60), 0, LEFT, 420.0, HALF)
                .build(),
            FieldBuilder::new("country_of_birth", "Country of birth", text(60), 0, RIGHT, 420.0, HALF)
                .required()
                .build(),
            FieldBuilder::new("citizenship", "Country of citizenship", text(60), 0, LEFT, 380.0, HALF)
                .required()
                .build(),
            FieldBuilder::new("eye_colour", "Eye colour", text(20), 0, RIGHT, 380.0, HALF / 2.0)
                .translatable()
                .build(),
            FieldBuilder::new(
                "height_cm",
                "Height (cm)",
                FieldKind::Number {
                    min: Some(50.0),
                    max: Some(250.0),
                },
                0, RIGHT + HALF / 2.0, 380.0, HALF / 2.0,
            )
            .build(),
            FieldBuilder::new(
                "marital_status",
                "Current marital status",
                choice(&[
                    ("single", "Single"),
                    ("married", "Married"),
                    ("common_law", "Common-law"),
                    ("divorced", "Divorced"),
                    ("separated", "Separated"),
                    ("widowed", "Widowed"),
                    ("annulled", "Annulled marriage"),
                ]),
                0, LEFT, 340.0, HALF,
            )
            .help("Choose common-law if you have lived with your partner in a conjugal relationship for at least one year.")
            .required()
            .build(),
            FieldBuilder::new("date_of_landing", "Date you became a permanent resident", FieldKind::Date, 0, RIGHT, 340.0, HALF)
                .help("The date of landing shown on your Confirmation of Permanent Residence (COPR).")
                .required()
                .build(),
        ],
    };

    let contact = Section {
        id: "contact".to_string(),
        title: "Section C: Contact information".to_string(),
        fields: vec![
            FieldBuilder::new("mailing_address", "Mailing address in Canada", text(120), 1, LEFT, 680.0, FULL)
                .help("Street number, street name and apartment number. Your PR card will be mailed here.")
                .required()
                .build(),
            FieldBuilder::new("city", "City or town", text(60), 1, LEFT, 640.0, HALF)
                .required()
                .build(),
            FieldBuilder::new(
                "province",
                "Province or territory",
                choice(&[
                    ("AB", "Alberta"),
                    ("BC", "British Columbia"),
                    ("MB", "Manitoba"),
                    ("NB", "New Brunswick"),
                    ("NL", "Newfoundland and Labrador"),
                    ("NS", "Nova Scotia"),
                    ("NT", "Northwest Territories"),
                    ("NU", "Nunavut"),
                    ("ON", "Ontario"),
                    ("PE", "Prince Edward Island"),
                    ("QC", "Quebec"),
                    ("SK", "Saskatchewan"),
                    ("YT", "Yukon"),
                ]),
                1, RIGHT, 640.0, HALF / 2.0,
            )
            .required()
            .build(),
            FieldBuilder::new("postal_code", "Postal code", text(7), 1, RIGHT + HALF / 2.0, 640.0, HALF / 2.0)
                .required()
                .build(),
            FieldBuilder::new("phone", "Telephone number", FieldKind::Phone, 1, LEFT, 600.0, HALF)
                .required()
                .build(),
            FieldBuilder::new("email", "Email address", FieldKind::Email, 1, RIGHT, 600.0, HALF)
                .build(),
            FieldBuilder::new(
                "correspondence_language",
                "Language of correspondence",
                choice(&[("english", "English"), ("french", "French")]),
                1, LEFT, 560.0, HALF,
            )
            .required()
            .build(),
        ],
    };

    let residence = Section {
        id: "residence".to_string(),
        title: "Section D: Residency obligation".to_string(),
        fields: vec![
            FieldBuilder::new(
                "days_in_canada",
                "Days physically present in Canada in the last five years",
                FieldKind::Number {
                    min: Some(0.0),
                    max: Some(1826.0),
                },
                1, LEFT, 500.0, FULL,
            )
            .help("A permanent resident must be physically present in Canada for at least 730 days in every five-year period.")
            .required()
            .build(),
            FieldBuilder::new("absences", "Describe your absences from Canada", text(500), 1, LEFT, 410.0, FULL)
                .help("List each trip outside Canada with the destination and reason.")
                .translatable()
                .height(3.0)
                .build(),
            FieldBuilder::new(
                "declaration",
                "I declare that the information I have given is truthful, complete and correct.",
                FieldKind::Checkbox,
                1, LEFT, 340.0, FULL,
            )
            .required()
            .build(),
        ],
    };

    FormSchema {
        id: PR_CARD_FORM_ID.to_string(),
        code: "IMM 5444".to_string(),
        title: "Application for a Permanent Resident Card".to_string(),
        pages: vec![PageSize::LETTER, PageSize::LETTER],
        sections: vec![application, personal, contact, residence],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_catalog() {
        let catalog = Catalog::builtin();

        let codes: Vec<&str> = catalog.languages().iter().map(|l| l.code.as_str()).collect();
        assert_eq!(codes, vec!["en", "es", "fr", "de", "tr"]);
        assert_eq!(catalog.language("fr").unwrap().label, "Francais");
        assert!(matches!(
            catalog.language("xx"),
            Err(FormError::UnsupportedLanguage { .. })
        ));

        let form = catalog.form(PR_CARD_FORM_ID).unwrap();
        assert_eq!(form.code, "IMM 5444");
        assert!(catalog.form("missing").is_err());
    }

    #[test]
    fn test_pr_card_form_is_valid() {
        let form = pr_card_form();
        assert!(validate_schema(&form).is_ok());
        assert!(form.field("marital_status").unwrap().required);
        assert!(form
            .field("marital_status")
            .unwrap()
            .kind
            .option("common_law")
            .is_some());
    }

    #[test]
    fn test_duplicate_field_ids_rejected() {
        let mut form = pr_card_form();
        let dup = form.sections[0].fields[0].clone();
        form.sections[1].fields.push(dup);
        assert!(matches!(
            validate_schema(&form),
            Err(FormError::SchemaError { .. })
        ));
    }

    #[test]
    fn test_field_outside_page_rejected() {
        let mut form = pr_card_form();
        form.sections[0].fields[0].layout.x = 600.0;
        assert!(validate_schema(&form).is_err());

        let mut form = pr_card_form();
        form.sections[0].fields[0].layout.page = 9;
        assert!(validate_schema(&form).is_err());
    }

    #[test]
    fn test_load_forms_dir() {
        let dir = TempDir::new().unwrap();
        let mut schema = pr_card_form();
        schema.id = "pr-card-copy".to_string();
        schema.title = "Copy".to_string();
        let mut file = std::fs::File::create(dir.path().join("copy.json")).unwrap();
        file.write_all(serde_json::to_string(&schema).unwrap().as_bytes())
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut catalog = Catalog::builtin();
        let loaded = catalog.load_forms_dir(dir.path()).unwrap();

        assert_eq!(loaded, 1);
        assert_eq!(catalog.forms().len(), 2);
        assert_eq!(catalog.form("pr-card-copy").unwrap().title, "Copy");
    }

    #[test]
    fn test_load_forms_dir_rejects_bad_json() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{ not json").unwrap();

        let mut catalog = Catalog::builtin();
        assert!(matches!(
            catalog.load_forms_dir(dir.path()),
            Err(FormError::SchemaError { .. })
        ));
    }
}
