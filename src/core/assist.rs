use crate::core::glossary::Glossary;
use crate::core::values::{parse_field_value, render_value};
use crate::domain::model::{FieldKind, FormSchema, FormSession, SOURCE_LANGUAGE};
use crate::domain::ports::{AssistReply, AssistRequest, Assistant, Translator};
use crate::utils::error::{FormError, Result};
use serde::Serialize;

fn kind_name(kind: &FieldKind) -> &'static str {
    match kind {
        FieldKind::Text { .. } => "text",
        FieldKind::Date => "date (YYYY-MM-DD)",
        FieldKind::Number { .. } => "number",
        FieldKind::Email => "email address",
        FieldKind::Phone => "telephone number",
        FieldKind::Checkbox => "checkbox (true/false)",
        FieldKind::Choice { .. } => "choice",
    }
}

/// Context for one question about one field, in the session's language.
pub async fn build_request(
    schema: &FormSchema,
    session: &FormSession,
    field_id: &str,
    question: &str,
    glossary: &Glossary,
    translator: &dyn Translator,
) -> Result<AssistRequest> {
    let field = schema
        .field(field_id)
        .ok_or_else(|| FormError::not_found("Field", field_id))?;
    if question.trim().is_empty() {
        return Err(FormError::invalid_field(field_id, "question cannot be empty"));
    }

    let option_labels: Vec<&str> = match &field.kind {
        FieldKind::Choice { options } => options.iter().map(|o| o.label.as_str()).collect(),
        _ => Vec::new(),
    };

    // Label, help and option labels are translated together in one batch.
    let mut sources = vec![field.label.as_str()];
    if let Some(help) = &field.help {
        sources.push(help.as_str());
    }
    sources.extend(option_labels.iter().copied());

    let mut texts = vec![schema.title.clone()];
    texts.extend(sources.iter().map(|s| s.to_string()));

    let language = session.language.as_str();
    let translated = if language == SOURCE_LANGUAGE {
        texts
    } else {
        translator
            .translate_batch(&texts, SOURCE_LANGUAGE, language)
            .await?
    };
    let mut translated = translated.into_iter();
    let form_title = translated.next().unwrap_or_default();
    let field_label = translated.next().unwrap_or_default();
    let field_help = if field.help.is_some() {
        translated.next()
    } else {
        None
    };
    let options: Vec<String> = translated.collect();

    let definitions = glossary
        .tooltips(&sources, language, translator)
        .await?
        .into_iter()
        .map(|t| (t.term, t.definition))
        .collect();

    Ok(AssistRequest {
        form_title,
        field_label,
        field_help,
        field_kind: kind_name(&field.kind).to_string(),
        options,
        current_value: session.values.get(field_id).map(|v| render_value(field, v)),
        question: question.trim().to_string(),
        language: language.to_string(),
        definitions,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct AssistAnswer {
    pub field_id: String,
    pub answer: String,
    pub suggested_value: Option<String>,
    /// Whether the suggestion passes the field's validation as-is.
    pub suggestion_valid: bool,
}

/// Asks the assistant and checks its suggestion against the field. The
/// suggestion is never stored.
pub async fn ask_about_field(
    schema: &FormSchema,
    session: &FormSession,
    field_id: &str,
    question: &str,
    glossary: &Glossary,
    translator: &dyn Translator,
    assistant: &dyn Assistant,
) -> Result<AssistAnswer> {
    let request = build_request(schema, session, field_id, question, glossary, translator).await?;
    let AssistReply {
        answer,
        suggested_value,
    } = assistant.ask(&request).await?;

    let suggestion_valid = match (&suggested_value, schema.field(field_id)) {
        (Some(value), Some(field)) => {
            parse_field_value(field, &serde_json::Value::String(value.clone()))
                .map(|v| v.is_some())
                .unwrap_or(false)
        }
        _ => false,
    };

    Ok(AssistAnswer {
        field_id: field_id.to_string(),
        answer,
        suggested_value,
        suggestion_valid,
    })
}
