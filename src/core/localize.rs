use crate::domain::model::{
    FieldKind, FieldSpec, FormSchema, LocalizedField, LocalizedForm, LocalizedOption,
    LocalizedSection, LocalizedText, SOURCE_LANGUAGE,
};
use crate::domain::ports::Translator;
use crate::utils::error::{FormError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Strings per translation request.
const BATCH_SIZE: usize = 16;
const MIN_LABEL_SCALE: f32 = 0.6;

/// Font scale that keeps a translated label inside the box sized for the
/// English one.
pub fn label_scale(source: &str, translated: &str) -> f32 {
    let source_len = source.chars().count();
    let translated_len = translated.chars().count();
    if translated_len == 0 || translated_len <= source_len {
        return 1.0;
    }
    (source_len as f32 / translated_len as f32).clamp(MIN_LABEL_SCALE, 1.0)
}

fn collect_strings(schema: &FormSchema) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    let mut push = |s: &str| {
        if !s.trim().is_empty() && seen.insert(s.to_string()) {
            out.push(s.to_string());
        }
    };

    push(&schema.title);
    for section in &schema.sections {
        push(&section.title);
        for field in &section.fields {
            push(&field.label);
            if let Some(help) = &field.help {
                push(help);
            }
            if let FieldKind::Choice { options } = &field.kind {
                for option in options {
                    push(&option.label);
                }
            }
        }
    }
    out
}

/// Translates every string with at most `concurrency` batches in flight.
async fn translate_all(
    strings: Vec<String>,
    language: &str,
    translator: Arc<dyn Translator>,
    concurrency: usize,
) -> Result<HashMap<String, String>> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for chunk in strings.chunks(BATCH_SIZE) {
        let chunk = chunk.to_vec();
        let semaphore = Arc::clone(&semaphore);
        let translator = Arc::clone(&translator);
        let language = language.to_string();
        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| FormError::TranslationError {
                    message: e.to_string(),
                })?;
            let translated = translator
                .translate_batch(&chunk, SOURCE_LANGUAGE, &language)
                .await?;
            Ok::<_, FormError>(chunk.into_iter().zip(translated).collect::<Vec<_>>())
        });
    }

    let mut map = HashMap::with_capacity(strings.len());
    while let Some(joined) = tasks.join_next().await {
        let pairs = joined.map_err(|e| FormError::TranslationError {
            message: format!("translation task failed: {}", e),
        })??;
        map.extend(pairs);
    }
    Ok(map)
}

fn localized(map: &HashMap<String, String>, source: &str) -> LocalizedText {
    LocalizedText {
        text: map.get(source).cloned().unwrap_or_else(|| source.to_string()),
        source: source.to_string(),
    }
}

fn localize_field(field: &FieldSpec, map: &HashMap<String, String>) -> LocalizedField {
    let label = localized(map, &field.label);
    let options = match &field.kind {
        FieldKind::Choice { options } => options
            .iter()
            .map(|o| LocalizedOption {
                id: o.id.clone(),
                label: localized(map, &o.label),
            })
            .collect(),
        _ => Vec::new(),
    };

    LocalizedField {
        id: field.id.clone(),
        label_scale: label_scale(&label.source, &label.text),
        label,
        help: field.help.as_deref().map(|h| localized(map, h)),
        kind: field.kind.clone(),
        options,
        required: field.required,
        layout: field.layout,
    }
}

fn build(schema: &FormSchema, language: &str, map: &HashMap<String, String>) -> LocalizedForm {
    LocalizedForm {
        id: schema.id.clone(),
        code: schema.code.clone(),
        language: language.to_string(),
        title: localized(map, &schema.title),
        pages: schema.pages.clone(),
        sections: schema
            .sections
            .iter()
            .map(|section| LocalizedSection {
                id: section.id.clone(),
                title: localized(map, &section.title),
                fields: section.fields.iter().map(|f| localize_field(f, map)).collect(),
            })
            .collect(),
    }
}

/// Produces the form in `language`. Field ids, order, kinds and layout boxes
/// are carried over from the schema unchanged.
pub async fn localize_form(
    schema: &FormSchema,
    language: &str,
    translator: Arc<dyn Translator>,
    concurrency: usize,
) -> Result<LocalizedForm> {
    if language == SOURCE_LANGUAGE {
        return Ok(build(schema, language, &HashMap::new()));
    }

    let strings = collect_strings(schema);
    tracing::debug!(
        "Localizing form '{}' into {} ({} strings)",
        schema.id,
        language,
        strings.len()
    );
    let map = translate_all(strings, language, translator, concurrency).await?;
    Ok(build(schema, language, &map))
}
