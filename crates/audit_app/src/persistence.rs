use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use audit_engine::AtomicFileWriter;
use audit_logging::{audit_error, audit_info, audit_warn};
use serde::{Deserialize, Serialize};

const CLIENT_STATE_FILENAME: &str = ".audit_client.ron";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct ClientState {
    session_id: Option<String>,
}

fn load(state_dir: &Path) -> ClientState {
    let path = state_dir.join(CLIENT_STATE_FILENAME);
    let content = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return ClientState::default(),
        Err(err) => {
            audit_warn!("Failed to read client state from {:?}: {}", path, err);
            return ClientState::default();
        }
    };
    ron::from_str(&content).unwrap_or_else(|err| {
        audit_warn!("Failed to parse client state from {:?}: {}", path, err);
        ClientState::default()
    })
}

fn save(state_dir: &Path, state: &ClientState) {
    let content = match ron::ser::to_string_pretty(state, ron::ser::PrettyConfig::new()) {
        Ok(text) => text,
        Err(err) => {
            audit_error!("Failed to serialize client state: {}", err);
            return;
        }
    };
    let writer = AtomicFileWriter::new(PathBuf::from(state_dir));
    if let Err(err) = writer.write(CLIENT_STATE_FILENAME, &content) {
        audit_error!("Failed to write client state to {:?}: {}", state_dir, err);
    }
}

fn new_session_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("{nanos:x}-{:x}", std::process::id())
}

/// Session id persisted in the state directory, created on first use.
pub(crate) fn load_or_create_session(state_dir: &Path) -> String {
    let mut state = load(state_dir);
    if let Some(id) = state.session_id.as_ref().filter(|id| !id.trim().is_empty()) {
        return id.clone();
    }
    let id = new_session_id();
    audit_info!("Created session {}", id);
    state.session_id = Some(id.clone());
    save(state_dir, &state);
    id
}
