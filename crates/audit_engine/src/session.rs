use std::sync::Arc;

use async_trait::async_trait;
use audit_core::{push_recent, RecentTest};
use audit_logging::{audit_debug, audit_warn};
use serde_json::Value;

use crate::persist::{KeyValueStore, PersistError};
use crate::ApiError;

/// Session endpoints as seen by a client.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn recent_tests(&self, session_id: &str) -> Result<Vec<RecentTest>, ApiError>;
    async fn add_recent_test(&self, session_id: &str, entry: RecentTest) -> Result<(), ApiError>;
    async fn ai_preference(&self, session_id: &str, test_id: &str) -> Result<Option<bool>, ApiError>;
    async fn set_ai_preference(
        &self,
        session_id: &str,
        test_id: &str,
        use_ai: bool,
    ) -> Result<(), ApiError>;
}

fn store_error(err: PersistError) -> ApiError {
    ApiError::upstream(500, format!("session store: {err}"))
}

fn require<'a>(value: &'a str, what: &str) -> Result<&'a str, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::invalid(format!("Missing {what}")));
    }
    Ok(value)
}

fn decode_recent(value: Option<Value>) -> Vec<RecentTest> {
    value
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

fn encode_recent(list: &[RecentTest]) -> Value {
    serde_json::to_value(list).unwrap_or(Value::Array(Vec::new()))
}

/// Server-side session records, scoped by an opaque session id.
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn recent_key(session_id: &str) -> String {
        format!("session:{session_id}:recent-tests")
    }

    fn preference_key(session_id: &str, test_id: &str) -> String {
        format!("session:{session_id}:ai-preference:{test_id}")
    }
}

#[async_trait]
impl SessionBackend for SessionStore {
    async fn recent_tests(&self, session_id: &str) -> Result<Vec<RecentTest>, ApiError> {
        let session_id = require(session_id, "session")?;
        let value = self
            .store
            .get(&Self::recent_key(session_id))
            .await
            .map_err(store_error)?;
        Ok(decode_recent(value))
    }

    async fn add_recent_test(&self, session_id: &str, entry: RecentTest) -> Result<(), ApiError> {
        let session_id = require(session_id, "session")?;
        require(&entry.test_id, "testId")?;
        let key = Self::recent_key(session_id);
        let current = decode_recent(self.store.get(&key).await.map_err(store_error)?);
        let next = push_recent(current, entry);
        self.store
            .set(&key, encode_recent(&next))
            .await
            .map_err(store_error)
    }

    async fn ai_preference(&self, session_id: &str, test_id: &str) -> Result<Option<bool>, ApiError> {
        let session_id = require(session_id, "session")?;
        let test_id = require(test_id, "testId")?;
        let value = self
            .store
            .get(&Self::preference_key(session_id, test_id))
            .await
            .map_err(store_error)?;
        Ok(value.and_then(|v| v.as_bool()))
    }

    async fn set_ai_preference(
        &self,
        session_id: &str,
        test_id: &str,
        use_ai: bool,
    ) -> Result<(), ApiError> {
        let session_id = require(session_id, "session")?;
        let test_id = require(test_id, "testId")?;
        self.store
            .set(&Self::preference_key(session_id, test_id), Value::Bool(use_ai))
            .await
            .map_err(store_error)
    }
}

/// Client-side view of one session: remote records first, a local store as
/// fallback and as the home of cached insights. Never fails outward.
pub struct SessionRecords {
    session_id: String,
    remote: Arc<dyn SessionBackend>,
    local: Arc<dyn KeyValueStore>,
}

impl SessionRecords {
    pub fn new(
        session_id: impl Into<String>,
        remote: Arc<dyn SessionBackend>,
        local: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            remote,
            local,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn local_preference_key(test_id: &str) -> String {
        format!("ai-preference:{test_id}")
    }

    fn local_insights_key(test_id: &str) -> String {
        format!("ai-insights:{test_id}")
    }

    const LOCAL_RECENT_KEY: &'static str = "recent-tests";

    async fn local_get(&self, key: &str) -> Option<Value> {
        match self.local.get(key).await {
            Ok(value) => value,
            Err(err) => {
                audit_warn!("Local store read failed key={} error={}", key, err);
                None
            }
        }
    }

    async fn local_set(&self, key: &str, value: Value) {
        if let Err(err) = self.local.set(key, value).await {
            audit_warn!("Local store write failed key={} error={}", key, err);
        }
    }

    /// Whether the user opted into AI for `test_id`; defaults to `false`.
    pub async fn ai_preference(&self, test_id: &str) -> bool {
        match self.remote.ai_preference(&self.session_id, test_id).await {
            Ok(Some(use_ai)) => return use_ai,
            Ok(None) => {}
            Err(err) => audit_warn!("AI preference lookup failed, using local: {}", err),
        }
        self.local_get(&Self::local_preference_key(test_id))
            .await
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub async fn set_ai_preference(&self, test_id: &str, use_ai: bool) {
        if let Err(err) = self
            .remote
            .set_ai_preference(&self.session_id, test_id, use_ai)
            .await
        {
            audit_warn!("AI preference write failed, keeping it locally: {}", err);
        }
        self.local_set(&Self::local_preference_key(test_id), Value::Bool(use_ai))
            .await;
    }

    pub async fn recent_tests(&self) -> Vec<RecentTest> {
        match self.remote.recent_tests(&self.session_id).await {
            Ok(list) => list,
            Err(err) => {
                audit_warn!("Recent tests lookup failed, using local: {}", err);
                decode_recent(self.local_get(Self::LOCAL_RECENT_KEY).await)
            }
        }
    }

    pub async fn record_recent(&self, entry: RecentTest) {
        let local = decode_recent(self.local_get(Self::LOCAL_RECENT_KEY).await);
        let next = push_recent(local, entry.clone());
        self.local_set(Self::LOCAL_RECENT_KEY, encode_recent(&next)).await;

        if let Err(err) = self.remote.add_recent_test(&self.session_id, entry).await {
            audit_warn!("Recent test not recorded remotely: {}", err);
        }
    }

    pub async fn cached_insights(&self, test_id: &str) -> Option<Vec<String>> {
        let value = self.local_get(&Self::local_insights_key(test_id)).await?;
        let suggestions: Vec<String> = serde_json::from_value(value).ok()?;
        audit_debug!("Local insights hit test={}", test_id);
        Some(suggestions).filter(|s| !s.is_empty())
    }

    pub async fn store_insights(&self, test_id: &str, suggestions: &[String]) {
        let value = serde_json::to_value(suggestions).unwrap_or(Value::Null);
        self.local_set(&Self::local_insights_key(test_id), value).await;
    }
}
