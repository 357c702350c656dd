use crate::domain::model::SOURCE_LANGUAGE;
use crate::domain::ports::Translator;
use crate::utils::error::{FormError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

/// Returns text unchanged. Used when no translation provider is configured.
#[derive(Debug, Clone, Default)]
pub struct PassthroughTranslator;

#[async_trait]
impl Translator for PassthroughTranslator {
    async fn translate(&self, text: &str, _source: &str, _target: &str) -> Result<String> {
        Ok(text.to_string())
    }
}

#[derive(Serialize)]
struct TranslateRequest<'a, Q: Serialize> {
    q: Q,
    source: &'a str,
    target: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
struct TranslateResponse<T> {
    #[serde(rename = "translatedText")]
    translated_text: T,
}

#[derive(Deserialize)]
struct ServiceError {
    error: String,
}

/// Client for a LibreTranslate compatible `/translate` endpoint.
pub struct HttpTranslator {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpTranslator {
    pub fn new(endpoint: &str, api_key: Option<String>, timeout_seconds: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/translate", endpoint.trim_end_matches('/')),
            api_key,
        })
    }

    async fn post<Q: Serialize + Send + Sync, T: DeserializeOwned + Send>(
        &self,
        q: Q,
        source: &str,
        target: &str,
    ) -> Result<T> {
        let body = TranslateRequest {
            q,
            source,
            target,
            format: "text",
            api_key: self.api_key.as_deref(),
        };

        tracing::debug!("Translation request {} -> {} to {}", source, target, self.endpoint);
        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = match response.json::<ServiceError>().await {
                Ok(err) => err.error,
                Err(_) => format!("HTTP {}", status),
            };
            return Err(FormError::TranslationError {
                message: format!("{} ({} -> {})", message, source, target),
            });
        }

        let parsed: TranslateResponse<T> =
            response
                .json()
                .await
                .map_err(|e| FormError::TranslationError {
                    message: format!("Malformed response: {}", e),
                })?;
        Ok(parsed.translated_text)
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        if source == target || text.trim().is_empty() {
            return Ok(text.to_string());
        }
        self.post(text, source, target).await
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
    ) -> Result<Vec<String>> {
        if source == target {
            return Ok(texts.to_vec());
        }
        let pending: Vec<&str> = texts
            .iter()
            .map(String::as_str)
            .filter(|t| !t.trim().is_empty())
            .collect();
        if pending.is_empty() {
            return Ok(texts.to_vec());
        }

        let translated: Vec<String> = self.post(&pending, source, target).await?;
        if translated.len() != pending.len() {
            return Err(FormError::TranslationError {
                message: format!(
                    "Expected {} translations, got {}",
                    pending.len(),
                    translated.len()
                ),
            });
        }

        // Blank entries keep their slot and come back untouched.
        let mut translated = translated.into_iter();
        Ok(texts
            .iter()
            .map(|text| {
                if text.trim().is_empty() {
                    text.clone()
                } else {
                    translated.next().unwrap_or_default()
                }
            })
            .collect())
    }
}

type CacheKey = (String, String, String);

/// Memoises translations by `(source, target, text)`.
/// Only text going out of the source language is cached.
pub struct CachedTranslator<T: Translator> {
    inner: T,
    cache: RwLock<HashMap<CacheKey, String>>,
}

impl<T: Translator> CachedTranslator<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }
}

#[async_trait]
impl<T: Translator> Translator for CachedTranslator<T> {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        if source == target || text.trim().is_empty() {
            return Ok(text.to_string());
        }
        if source != SOURCE_LANGUAGE {
            return self.inner.translate(text, source, target).await;
        }

        let key = (source.to_string(), target.to_string(), text.to_string());
        if let Some(hit) = self.cache.read().await.get(&key) {
            return Ok(hit.clone());
        }

        let translated = self.inner.translate(text, source, target).await?;
        self.cache.write().await.insert(key, translated.clone());
        Ok(translated)
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
    ) -> Result<Vec<String>> {
        if source == target {
            return Ok(texts.to_vec());
        }
        if source != SOURCE_LANGUAGE {
            return self.inner.translate_batch(texts, source, target).await;
        }

        let mut out: Vec<Option<String>> = vec![None; texts.len()];
        let mut misses = Vec::new();
        {
            let cache = self.cache.read().await;
            for (i, text) in texts.iter().enumerate() {
                if text.trim().is_empty() {
                    out[i] = Some(text.clone());
                    continue;
                }
                let key = (source.to_string(), target.to_string(), text.clone());
                match cache.get(&key) {
                    Some(hit) => out[i] = Some(hit.clone()),
                    None => misses.push(i),
                }
            }
        }

        if !misses.is_empty() {
            let pending: Vec<String> = misses.iter().map(|&i| texts[i].clone()).collect();
            let translated = self.inner.translate_batch(&pending, source, target).await?;
            let mut cache = self.cache.write().await;
            for (&i, value) in misses.iter().zip(translated) {
                cache.insert(
                    (source.to_string(), target.to_string(), texts[i].clone()),
                    value.clone(),
                );
                out[i] = Some(value);
            }
        }

        Ok(out.into_iter().map(Option::unwrap_or_default).collect())
    }
}
