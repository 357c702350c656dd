use crate::core::catalog::Catalog;
use crate::core::pdf::render_pdf;
use crate::core::session::{export_path, missing_required, SessionStore};
use crate::core::values::render_value;
use crate::domain::model::{
    Answer, EnglishAnswers, ExportBundle, FieldValue, FormSchema, FormSession, SOURCE_LANGUAGE,
};
use crate::domain::ports::{Pipeline, Storage, Translator};
use crate::utils::error::{FormError, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;
use uuid::Uuid;
use zip::write::{SimpleFileOptions, ZipWriter};

/// Converts a filled-in session back to English and renders it.
pub struct ExportPipeline<S: Storage> {
    catalog: Arc<Catalog>,
    sessions: Arc<SessionStore<S>>,
    translator: Arc<dyn Translator>,
    session_id: Uuid,
}

impl<S: Storage> ExportPipeline<S> {
    pub fn new(
        catalog: Arc<Catalog>,
        sessions: Arc<SessionStore<S>>,
        translator: Arc<dyn Translator>,
        session_id: Uuid,
    ) -> Self {
        Self {
            catalog,
            sessions,
            translator,
            session_id,
        }
    }
}

/// Builds the English answers for `session`. Only free-text fields marked
/// translatable go through the translator, each from the language it was
/// typed in; everything else is rendered from the English schema or copied
/// verbatim.
pub async fn back_translate(
    schema: &FormSchema,
    session: &FormSession,
    translator: &dyn Translator,
) -> Result<EnglishAnswers> {
    let mut answers = Vec::new();
    let mut pending: BTreeMap<&str, Vec<(usize, String)>> = BTreeMap::new();

    for field in schema.fields() {
        let Some(value) = session.values.get(&field.id) else {
            continue;
        };
        let language = session.value_language(&field.id);
        if field.translatable && language != SOURCE_LANGUAGE {
            if let FieldValue::Text(text) = value {
                pending
                    .entry(language)
                    .or_default()
                    .push((answers.len(), text.clone()));
            }
        }
        answers.push(Answer {
            field_id: field.id.clone(),
            label: field.label.clone(),
            value: render_value(field, value),
            original: None,
        });
    }

    for (language, entries) in pending {
        let texts: Vec<String> = entries.iter().map(|(_, t)| t.clone()).collect();
        tracing::debug!(
            "Back-translating {} answers from {} for session {}",
            texts.len(),
            language,
            session.id
        );
        let translated = translator
            .translate_batch(&texts, language, SOURCE_LANGUAGE)
            .await?;
        for ((index, original), english) in entries.into_iter().zip(translated) {
            let answer = &mut answers[index];
            if english != original {
                answer.original = Some(original);
            }
            answer.value = english;
        }
    }

    Ok(EnglishAnswers {
        session_id: session.id,
        form_id: schema.id.clone(),
        form_code: schema.code.clone(),
        source_language: session.language.clone(),
        answers,
        generated_at: Utc::now(),
    })
}

#[async_trait::async_trait]
impl<S: Storage + 'static> Pipeline for ExportPipeline<S> {
    async fn extract(&self) -> Result<(FormSchema, FormSession)> {
        let session = self.sessions.get(&self.session_id).await?;
        let schema = self.catalog.form(&session.form_id)?.clone();

        let missing = missing_required(&session, &schema);
        if !missing.is_empty() {
            return Err(FormError::IncompleteForm { fields: missing });
        }
        Ok((schema, session))
    }

    async fn transform(&self, schema: &FormSchema, session: FormSession) -> Result<EnglishAnswers> {
        back_translate(schema, &session, self.translator.as_ref()).await
    }

    async fn load(&self, schema: &FormSchema, answers: EnglishAnswers) -> Result<ExportBundle> {
        let pdf = render_pdf(schema, &answers)?;
        let path = export_path(&answers.session_id);
        tracing::debug!("Writing PDF ({} bytes) to {}", pdf.len(), path);
        self.sessions.storage().write_file(&path, &pdf).await?;
        Ok(ExportBundle { answers, pdf })
    }
}

pub struct ExportEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> ExportEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<ExportBundle> {
        tracing::info!("Starting export");

        let (schema, session) = self.pipeline.extract().await?;
        tracing::info!(
            "Extracted session {} ({} values, language {})",
            session.id,
            session.values.len(),
            session.language
        );

        let answers = self.pipeline.transform(&schema, session).await?;
        tracing::info!("Converted {} answers to English", answers.answers.len());

        let bundle = self.pipeline.load(&schema, answers).await?;
        tracing::info!("Rendered PDF ({} bytes)", bundle.pdf.len());

        Ok(bundle)
    }
}

fn answers_csv(answers: &EnglishAnswers) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["field_id", "label", "value", "original"])?;
    for answer in &answers.answers {
        writer.write_record([
            answer.field_id.as_str(),
            answer.label.as_str(),
            answer.value.as_str(),
            answer.original.as_deref().unwrap_or(""),
        ])?;
    }
    writer
        .into_inner()
        .map_err(|e| FormError::IoError(e.into_error()))
}

/// Zip archive with the PDF plus the answers as CSV and JSON.
pub fn bundle_zip(bundle: &ExportBundle) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    zip.start_file("form.pdf", options)?;
    zip.write_all(&bundle.pdf)?;

    zip.start_file("answers.csv", options)?;
    zip.write_all(&answers_csv(&bundle.answers)?)?;

    zip.start_file("answers.json", options)?;
    zip.write_all(&serde_json::to_vec_pretty(&bundle.answers)?)?;

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::LocalStorage;
    use crate::adapters::translation::PassthroughTranslator;
    use crate::core::catalog::PR_CARD_FORM_ID;
    use async_trait::async_trait;
    use serde_json::json;
    use tempfile::TempDir;

    struct EchoTranslator;

    #[async_trait]
    impl Translator for EchoTranslator {
        async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
            Ok(format!("{}>{}: {}", source, target, text))
        }
    }

    fn complete_values() -> Vec<(&'static str, serde_json::Value)> {
        vec![
            ("reason", json!("replacement")),
            ("reason_details", json!("Me robaron la cartera en el metro")),
            ("uci", json!("1234567890")),
            ("family_name", json!("García")),
            ("given_names", json!("Lucía")),
            ("sex", json!("F")),
            ("date_of_birth", json!("1988-04-12")),
            ("country_of_birth", json!("México")),
            ("citizenship", json!("México")),
            ("marital_status", json!("common_law")),
            ("date_of_landing", json!("2019-06-01")),
            ("mailing_address", json!("123 Rue Principale, apt 4")),
            ("city", json!("Montréal")),
            ("province", json!("QC")),
            ("postal_code", json!("H2X 1Y4")),
            ("phone", json!("+1 514 555 0199")),
            ("correspondence_language", json!("french")),
            ("days_in_canada", json!(1200)),
            ("declaration", json!(true)),
        ]
    }

    async fn filled_session(
        store: &SessionStore<LocalStorage>,
        catalog: &Catalog,
        language: &str,
    ) -> Uuid {
        let schema = catalog.form(PR_CARD_FORM_ID).unwrap();
        let session = store.create(schema, language).await.unwrap();
        for (field, value) in complete_values() {
            store.set_value(&session.id, schema, field, &value).await.unwrap();
        }
        session.id
    }

    #[tokio::test]
    async fn test_back_translate_only_touches_translatable_text() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(LocalStorage::new(dir.path().to_str().unwrap().to_string()));
        let catalog = Catalog::builtin();
        let id = filled_session(&store, &catalog, "es").await;
        let session = store.get(&id).await.unwrap();
        let schema = catalog.form(PR_CARD_FORM_ID).unwrap();

        let answers = back_translate(schema, &session, &EchoTranslator).await.unwrap();
        let find = |id: &str| answers.answers.iter().find(|a| a.field_id == id).unwrap();

        let details = find("reason_details");
        assert_eq!(details.value, "es>en: Me robaron la cartera en el metro");
        assert_eq!(details.original.as_deref(), Some("Me robaron la cartera en el metro"));

        assert_eq!(find("family_name").value, "García");
        assert!(find("family_name").original.is_none());
        assert_eq!(find("marital_status").value, "Common-law");
        assert_eq!(find("province").value, "Quebec");
        assert_eq!(find("days_in_canada").value, "1200");
        assert_eq!(find("declaration").value, "Yes");

        let order: Vec<&str> = answers.answers.iter().map(|a| a.field_id.as_str()).collect();
        let expected: Vec<&str> = schema
            .fields()
            .filter(|f| session.values.contains_key(&f.id))
            .map(|f| f.id.as_str())
            .collect();
        assert_eq!(order, expected);
    }

    #[tokio::test]
    async fn test_back_translate_uses_language_text_was_typed_in() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(LocalStorage::new(dir.path().to_str().unwrap().to_string()));
        let catalog = Catalog::builtin();
        let id = filled_session(&store, &catalog, "es").await;
        let schema = catalog.form(PR_CARD_FORM_ID).unwrap();

        store.set_language(&id, "fr").await.unwrap();
        store
            .set_value(&id, schema, "eye_colour", &json!("marron"))
            .await
            .unwrap();
        let session = store.get(&id).await.unwrap();

        let answers = back_translate(schema, &session, &EchoTranslator).await.unwrap();
        let find = |id: &str| answers.answers.iter().find(|a| a.field_id == id).unwrap();

        assert_eq!(
            find("reason_details").value,
            "es>en: Me robaron la cartera en el metro"
        );
        assert_eq!(find("eye_colour").value, "fr>en: marron");
    }

    #[tokio::test]
    async fn test_english_session_is_not_translated() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(LocalStorage::new(dir.path().to_str().unwrap().to_string()));
        let catalog = Catalog::builtin();
        let id = filled_session(&store, &catalog, "en").await;
        let session = store.get(&id).await.unwrap();
        let schema = catalog.form(PR_CARD_FORM_ID).unwrap();

        let answers = back_translate(schema, &session, &EchoTranslator).await.unwrap();
        assert!(answers.answers.iter().all(|a| a.original.is_none()));
    }

    #[tokio::test]
    async fn test_engine_rejects_incomplete_form() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SessionStore::new(LocalStorage::new(
            dir.path().to_str().unwrap().to_string(),
        )));
        let catalog = Arc::new(Catalog::builtin());
        let schema = catalog.form(PR_CARD_FORM_ID).unwrap();
        let session = store.create(schema, "fr").await.unwrap();

        let pipeline = ExportPipeline::new(
            catalog.clone(),
            store.clone(),
            Arc::new(PassthroughTranslator),
            session.id,
        );
        let err = ExportEngine::new(pipeline).run().await.unwrap_err();

        match err {
            FormError::IncompleteForm { fields } => {
                assert!(fields.contains(&"family_name".to_string()));
                assert!(fields.contains(&"declaration".to_string()));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_engine_writes_pdf_and_bundle() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SessionStore::new(LocalStorage::new(
            dir.path().to_str().unwrap().to_string(),
        )));
        let catalog = Arc::new(Catalog::builtin());
        let id = filled_session(&store, &catalog, "es").await;

        let pipeline = ExportPipeline::new(catalog.clone(), store.clone(), Arc::new(EchoTranslator), id);
        let bundle = ExportEngine::new(pipeline).run().await.unwrap();

        assert!(bundle.pdf.starts_with(b"%PDF"));
        assert!(dir.path().join("exports").join(format!("{}.pdf", id)).exists());

        let zip_bytes = bundle_zip(&bundle).unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_bytes)).unwrap();
        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["answers.csv", "answers.json", "form.pdf"]);

        let csv_content = {
            let mut file = archive.by_name("answers.csv").unwrap();
            let mut content = String::new();
            std::io::Read::read_to_string(&mut file, &mut content).unwrap();
            content
        };
        assert!(csv_content.starts_with("field_id,label,value,original\n"));
        assert!(csv_content.contains("marital_status,Current marital status,Common-law,\n"));
    }
}
