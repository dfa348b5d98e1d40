//! Audit engine: upstream clients, server-side handlers and the client hook
//! that drives the core state machine on tokio.
pub mod a11y;
mod cache;
mod clock;
mod config;
mod error;
mod hook;
pub mod insights;
mod persist;
mod rate_limit;
mod service;
mod session;
mod sources;
mod title;
pub mod wpt;

pub use a11y::{A11yScanner, A11yService, HttpA11yScanner};
pub use cache::ResultCache;
pub use clock::{system_clock, utc_timestamp, Clock, Timestamp};
pub use config::{
    AuditConfig, ConfigError, HttpSettings, LocationPreset, RateLimitConfig, DEFAULT_ANTHROPIC_URL,
    DEFAULT_CACHE_TTL_SECONDS, DEFAULT_CLAUDE_MODEL, DEFAULT_WPT_BASE_URL,
};
pub use error::{ApiError, TransportKind};
pub use hook::{AuditHook, HookDeps};
pub use insights::{AnthropicProvider, InsightsProvider, InsightsService};
pub use persist::{ensure_state_dir, AtomicFileWriter, FileStore, KeyValueStore, MemoryStore, PersistError};
pub use rate_limit::SubmissionGate;
pub use service::{client_key, A11yScanRequest, AuditService, RunTestRequest};
pub use session::{SessionBackend, SessionRecords, SessionStore};
pub use sources::{A11ySource, InsightsSource, StatusSource};
pub use title::{decode_html, extract_title, TitleResolver};
pub use wpt::{Submission, WptClient};
