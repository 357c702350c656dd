use crate::domain::model::{EnglishAnswers, ExportBundle, FormSchema, FormSession};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn delete_file(&self, path: &str) -> impl std::future::Future<Output = Result<()>> + Send;
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String>;

    async fn translate_batch(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
    ) -> Result<Vec<String>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.translate(text, source, target).await?);
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistRequest {
    pub form_title: String,
    pub field_label: String,
    pub field_help: Option<String>,
    pub field_kind: String,
    pub options: Vec<String>,
    pub current_value: Option<String>,
    pub question: String,
    /// Language the answer should be written in.
    pub language: String,
    pub definitions: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistReply {
    pub answer: String,
    pub suggested_value: Option<String>,
}

#[async_trait]
pub trait Assistant: Send + Sync {
    async fn ask(&self, request: &AssistRequest) -> Result<AssistReply>;
}

/// Three-stage export of a filled-in session.
#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<(FormSchema, FormSession)>;
    async fn transform(&self, schema: &FormSchema, session: FormSession) -> Result<EnglishAnswers>;
    async fn load(&self, schema: &FormSchema, answers: EnglishAnswers) -> Result<ExportBundle>;
}
