use crate::app::AppState;
use crate::core::assist::{ask_about_field, AssistAnswer};
use crate::core::catalog::FormSummary;
use crate::core::export::{bundle_zip, ExportEngine, ExportPipeline};
use crate::core::localize::localize_form;
use crate::core::session::{missing_required, parse_session_id};
use crate::domain::model::{
    ExportBundle, FormSession, GlossaryTerm, Language, LocalizedForm, TermMatch, Tooltip,
    SOURCE_LANGUAGE,
};
use crate::server::extract::ApiJson;
use crate::utils::error::{FormError, Result};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

type AppStateRef = State<Arc<AppState>>;

const INDEX_HTML: &str = include_str!("index.html");

#[derive(Debug, Deserialize)]
pub struct LangQuery {
    pub lang: Option<String>,
}

impl LangQuery {
    fn resolve(&self, state: &AppState) -> Result<String> {
        let code = self.lang.as_deref().unwrap_or(SOURCE_LANGUAGE);
        state.check_language(code)?;
        Ok(code.to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub form_id: String,
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LanguageRequest {
    pub language: String,
}

#[derive(Debug, Deserialize)]
pub struct FieldValueRequest {
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Deserialize)]
pub struct AssistRequestBody {
    pub field_id: String,
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct FieldTerms {
    pub field_id: String,
    pub label_terms: Vec<TermMatch>,
    pub help_terms: Vec<TermMatch>,
    pub tooltips: Vec<Tooltip>,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub session: FormSession,
    pub missing_required: Vec<String>,
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn list_languages(State(state): AppStateRef) -> Json<Vec<Language>> {
    Json(state.catalog.languages().to_vec())
}

pub async fn list_forms(State(state): AppStateRef) -> Json<Vec<FormSummary>> {
    Json(state.catalog.forms())
}

pub async fn get_form(
    State(state): AppStateRef,
    Path(form_id): Path<String>,
    Query(query): Query<LangQuery>,
) -> Result<Json<LocalizedForm>> {
    let language = query.resolve(&state)?;
    let schema = state.catalog.form(&form_id)?;
    let form = localize_form(
        schema,
        &language,
        state.translator.clone(),
        state.config.translation.concurrent_requests,
    )
    .await?;
    Ok(Json(form))
}

pub async fn field_terms(
    State(state): AppStateRef,
    Path((form_id, field_id)): Path<(String, String)>,
    Query(query): Query<LangQuery>,
) -> Result<Json<FieldTerms>> {
    let language = query.resolve(&state)?;
    let schema = state.catalog.form(&form_id)?;
    let field = schema
        .field(&field_id)
        .ok_or_else(|| FormError::not_found("Field", &field_id))?;

    let mut texts = vec![field.label.as_str()];
    if let Some(help) = &field.help {
        texts.push(help.as_str());
    }
    let tooltips = state
        .glossary
        .tooltips(&texts, &language, state.translator.as_ref())
        .await?;

    Ok(Json(FieldTerms {
        field_id,
        label_terms: state.glossary.find_terms(&field.label),
        help_terms: field
            .help
            .as_deref()
            .map(|h| state.glossary.find_terms(h))
            .unwrap_or_default(),
        tooltips,
    }))
}

pub async fn get_glossary(
    State(state): AppStateRef,
    Query(query): Query<LangQuery>,
) -> Result<Json<Vec<Tooltip>>> {
    let language = query.resolve(&state)?;
    let terms: Vec<&GlossaryTerm> = state.glossary.terms().iter().collect();
    let tooltips = state
        .glossary
        .localize_terms(&terms, &language, state.translator.as_ref())
        .await?;
    Ok(Json(tooltips))
}

fn session_view(state: &AppState, session: FormSession) -> Result<SessionView> {
    let schema = state.catalog.form(&session.form_id)?;
    Ok(SessionView {
        missing_required: missing_required(&session, schema),
        session,
    })
}

pub async fn create_session(
    State(state): AppStateRef,
    ApiJson(body): ApiJson<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionView>)> {
    let language = body.language.as_deref().unwrap_or(SOURCE_LANGUAGE);
    state.check_language(language)?;
    let schema = state.catalog.form(&body.form_id)?;
    let session = state.sessions.create(schema, language).await?;
    Ok((StatusCode::CREATED, Json(session_view(&state, session)?)))
}

pub async fn get_session(
    State(state): AppStateRef,
    Path(id): Path<String>,
) -> Result<Json<SessionView>> {
    let id = parse_session_id(&id)?;
    let session = state.sessions.get(&id).await?;
    Ok(Json(session_view(&state, session)?))
}

pub async fn set_session_language(
    State(state): AppStateRef,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<LanguageRequest>,
) -> Result<Json<SessionView>> {
    let id = parse_session_id(&id)?;
    state.check_language(&body.language)?;
    let session = state.sessions.set_language(&id, &body.language).await?;
    Ok(Json(session_view(&state, session)?))
}

pub async fn set_field(
    State(state): AppStateRef,
    Path((id, field_id)): Path<(String, String)>,
    ApiJson(body): ApiJson<FieldValueRequest>,
) -> Result<Json<SessionView>> {
    let id = parse_session_id(&id)?;
    let current = state.sessions.get(&id).await?;
    let schema = state.catalog.form(&current.form_id)?;
    let session = state
        .sessions
        .set_value(&id, schema, &field_id, &body.value)
        .await?;
    Ok(Json(session_view(&state, session)?))
}

pub async fn clear_field(
    State(state): AppStateRef,
    Path((id, field_id)): Path<(String, String)>,
) -> Result<Json<SessionView>> {
    let id = parse_session_id(&id)?;
    let current = state.sessions.get(&id).await?;
    let schema = state.catalog.form(&current.form_id)?;
    if schema.field(&field_id).is_none() {
        return Err(FormError::not_found("Field", field_id));
    }
    let session = state.sessions.clear_value(&id, &field_id).await?;
    Ok(Json(session_view(&state, session)?))
}

pub async fn delete_session(
    State(state): AppStateRef,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = parse_session_id(&id)?;
    state.sessions.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn assist(
    State(state): AppStateRef,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<AssistRequestBody>,
) -> Result<Json<AssistAnswer>> {
    let id = parse_session_id(&id)?;
    let session = state.sessions.get(&id).await?;
    let schema = state.catalog.form(&session.form_id)?;
    let answer = ask_about_field(
        schema,
        &session,
        &body.field_id,
        &body.question,
        &state.glossary,
        state.translator.as_ref(),
        state.assistant.as_ref(),
    )
    .await?;
    Ok(Json(answer))
}

async fn run_export(state: &AppState, id: Uuid) -> Result<ExportBundle> {
    let pipeline = ExportPipeline::new(
        state.catalog.clone(),
        state.sessions.clone(),
        state.translator.clone(),
        id,
    );
    ExportEngine::new(pipeline).run().await
}

fn attachment(content_type: &'static str, filename: String, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

fn export_name(bundle: &ExportBundle, extension: &str) -> String {
    format!(
        "{}-{}.{}",
        bundle.answers.form_id,
        bundle.answers.session_id.simple(),
        extension
    )
}

pub async fn export_pdf(State(state): AppStateRef, Path(id): Path<String>) -> Result<Response> {
    let id = parse_session_id(&id)?;
    let bundle = run_export(&state, id).await?;
    let filename = export_name(&bundle, "pdf");
    Ok(attachment("application/pdf", filename, bundle.pdf))
}

pub async fn export_zip(State(state): AppStateRef, Path(id): Path<String>) -> Result<Response> {
    let id = parse_session_id(&id)?;
    let bundle = run_export(&state, id).await?;
    let bytes = bundle_zip(&bundle)?;
    Ok(attachment("application/zip", export_name(&bundle, "zip"), bytes))
}
