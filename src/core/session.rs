use crate::core::values::{is_filled, parse_field_value};
use crate::domain::model::{FieldValue, FormSchema, FormSession};
use crate::domain::ports::Storage;
use crate::utils::error::{FormError, Result};
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

pub fn parse_session_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).map_err(|_| FormError::not_found("Session", id))
}

/// Sessions kept in memory before the least recently updated one is evicted.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

fn session_path(id: &Uuid) -> String {
    format!("sessions/{}.json", id)
}

/// Where the rendered English PDF of a session is written.
pub fn export_path(id: &Uuid) -> String {
    format!("exports/{}.pdf", id)
}

/// Fields that are required but have no usable value, in form order.
pub fn missing_required(session: &FormSession, schema: &FormSchema) -> Vec<String> {
    schema
        .fields()
        .filter(|f| f.required && !is_filled(session.values.get(&f.id)))
        .map(|f| f.id.clone())
        .collect()
}

/// In-memory session cache backed by JSON files in storage. Evicted
/// sessions are reloaded from storage on the next access.
pub struct SessionStore<S: Storage> {
    storage: S,
    sessions: RwLock<HashMap<Uuid, FormSession>>,
    capacity: usize,
}

impl<S: Storage> SessionStore<S> {
    pub fn new(storage: S) -> Self {
        Self::with_capacity(storage, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(storage: S, capacity: usize) -> Self {
        Self {
            storage,
            sessions: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub async fn cached_len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Caches `session`, evicting the least recently updated other entries
    /// while the cache is over capacity.
    fn remember(&self, sessions: &mut HashMap<Uuid, FormSession>, session: FormSession) {
        let id = session.id;
        sessions.insert(id, session);
        while sessions.len() > self.capacity {
            let Some(oldest) = sessions
                .values()
                .filter(|s| s.id != id)
                .min_by_key(|s| s.updated_at)
                .map(|s| s.id)
            else {
                break;
            };
            sessions.remove(&oldest);
            tracing::debug!("Evicted session {} from cache", oldest);
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    async fn persist(&self, session: &FormSession) -> Result<()> {
        let data = serde_json::to_vec_pretty(session)?;
        self.storage.write_file(&session_path(&session.id), &data).await
    }

    async fn load(&self, id: &Uuid) -> Result<FormSession> {
        match self.storage.read_file(&session_path(id)).await {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(FormError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(FormError::not_found("Session", id.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn create(&self, schema: &FormSchema, language: &str) -> Result<FormSession> {
        let session = FormSession::new(&schema.id, language);
        let mut sessions = self.sessions.write().await;
        self.persist(&session).await?;
        self.remember(&mut sessions, session.clone());
        tracing::info!(
            "Created session {} for form '{}' in {}",
            session.id,
            schema.id,
            language
        );
        Ok(session)
    }

    pub async fn get(&self, id: &Uuid) -> Result<FormSession> {
        if let Some(session) = self.sessions.read().await.get(id) {
            return Ok(session.clone());
        }

        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get(id) {
            return Ok(session.clone());
        }
        let session = self.load(id).await?;
        tracing::debug!("Loaded session {} from storage", id);
        self.remember(&mut sessions, session.clone());
        Ok(session)
    }

    /// Applies `change` to the session under the write lock and persists the
    /// result before releasing it.
    async fn update<F>(&self, id: &Uuid, change: F) -> Result<FormSession>
    where
        F: FnOnce(&mut FormSession) -> Result<()> + Send,
    {
        let mut sessions = self.sessions.write().await;
        if !sessions.contains_key(id) {
            let loaded = self.load(id).await?;
            self.remember(&mut sessions, loaded);
        }
        let current = sessions
            .get(id)
            .ok_or_else(|| FormError::not_found("Session", id.to_string()))?;

        let mut updated = current.clone();
        change(&mut updated)?;
        updated.updated_at = Utc::now();
        self.persist(&updated).await?;
        self.remember(&mut sessions, updated.clone());
        Ok(updated)
    }

    /// Validates `raw` against the field and stores it. A clearing value
    /// (null or empty) removes the field.
    pub async fn set_value(
        &self,
        id: &Uuid,
        schema: &FormSchema,
        field_id: &str,
        raw: &serde_json::Value,
    ) -> Result<FormSession> {
        let field = schema
            .field(field_id)
            .ok_or_else(|| FormError::not_found("Field", field_id))?;
        let parsed = parse_field_value(field, raw)?;

        self.update(id, |session| {
            if session.form_id != schema.id {
                return Err(FormError::invalid_field(
                    field_id,
                    format!("session belongs to form '{}'", session.form_id),
                ));
            }
            match parsed {
                Some(value) => {
                    session.values.insert(field_id.to_string(), value);
                    session
                        .value_languages
                        .insert(field_id.to_string(), session.language.clone());
                }
                None => {
                    session.values.remove(field_id);
                    session.value_languages.remove(field_id);
                }
            }
            Ok(())
        })
        .await
    }

    pub async fn clear_value(&self, id: &Uuid, field_id: &str) -> Result<FormSession> {
        self.update(id, |session| {
            session.values.remove(field_id);
            session.value_languages.remove(field_id);
            Ok(())
        })
        .await
    }

    pub async fn set_language(&self, id: &Uuid, language: &str) -> Result<FormSession> {
        self.update(id, |session| {
            session.language = language.to_string();
            Ok(())
        })
        .await
    }

    pub async fn value(&self, id: &Uuid, field_id: &str) -> Result<Option<FieldValue>> {
        Ok(self.get(id).await?.values.get(field_id).cloned())
    }

    pub async fn delete(&self, id: &Uuid) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let cached = sessions.remove(id).is_some();
        let stored = self.storage.read_file(&session_path(id)).await.is_ok();
        if !cached && !stored {
            return Err(FormError::not_found("Session", id.to_string()));
        }
        self.storage.delete_file(&session_path(id)).await?;
        self.storage.delete_file(&export_path(id)).await?;
        tracing::info!("Deleted session {} and its export", id);
        Ok(())
    }
}
