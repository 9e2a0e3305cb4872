//! On-disk intent store.
//!
//! Layout under the state directory (`.amen/` by default):
//!
//! ```text
//! .amen/
//!   intents/<id>/intent.json
//!   audit/audit.jsonl
//! ```

use amen_core::Intent;
use anyhow::Context as _;
use std::fs;
use std::path::{Path, PathBuf};

pub const STATE_DIR: &str = ".amen";

#[derive(Debug, Clone)]
pub struct IntentStore {
    root: PathBuf,
}

impl IntentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn intents_dir(&self) -> PathBuf {
        self.root.join("intents")
    }

    pub fn intent_dir(&self, intent_id: &str) -> anyhow::Result<PathBuf> {
        validate_intent_id(intent_id)?;
        Ok(self.intents_dir().join(intent_id))
    }

    pub fn intent_path(&self, intent_id: &str) -> anyhow::Result<PathBuf> {
        Ok(self.intent_dir(intent_id)?.join("intent.json"))
    }

    pub fn load(&self, intent_id: &str) -> anyhow::Result<Intent> {
        let path = self.intent_path(intent_id)?;
        if !path.exists() {
            return Err(anyhow::anyhow!("Intent not found: {}", intent_id));
        }
        let raw = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        let intent = serde_json::from_slice(&raw)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(intent)
    }

    pub fn save(&self, intent: &Intent) -> anyhow::Result<PathBuf> {
        let dir = self.intent_dir(intent.id())?;
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        let path = dir.join("intent.json");
        // Write then rename so a crash never leaves a truncated intent.
        let tmp = dir.join("intent.json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(intent)?)?;
        fs::rename(&tmp, &path)?;
        Ok(path)
    }

    /// All stored intents, oldest first. Unreadable entries are skipped.
    pub fn list(&self) -> anyhow::Result<Vec<Intent>> {
        let dir = self.intents_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut intents = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let Some(id) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            match self.load(&id) {
                Ok(intent) => intents.push(intent),
                Err(e) => tracing::warn!(intent_id = %id, error = %e, "Skipping unreadable intent"),
            }
        }
        intents.sort_by_key(|i| i.created_at());
        Ok(intents)
    }
}

/// Prevent path traversal / weird IDs.
/// Allow only [A-Za-z0-9_-] and require non-empty.
pub fn validate_intent_id(intent_id: &str) -> anyhow::Result<()> {
    if intent_id.is_empty() {
        return Err(anyhow::anyhow!("intent_id must be non-empty"));
    }
    if !intent_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(anyhow::anyhow!(
            "Invalid intent_id '{}'. Use only letters, digits, '_' or '-'.",
            intent_id
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use amen_core::{IntentDraft, parse_action};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = IntentStore::new(dir.path());
        let intent = Intent::draft(
            IntentDraft::new("svc", "test")
                .with_actions(vec![parse_action("api.expose GET /users").unwrap()]),
        );

        let path = store.save(&intent).unwrap();
        assert!(path.ends_with(format!("intents/{}/intent.json", intent.id())));
        assert_eq!(store.load(intent.id()).unwrap(), intent);
        assert_eq!(store.list().unwrap(), vec![intent]);
    }

    #[test]
    fn rejects_traversal_ids() {
        let store = IntentStore::new("/tmp/state");
        assert!(store.load("../etc").is_err());
        assert!(store.intent_dir("a/b").is_err());
        assert!(validate_intent_id("").is_err());
        assert!(validate_intent_id("ab12-cd_34").is_ok());
    }

    #[test]
    fn missing_intent_is_an_error() {
        let dir = tempdir().unwrap();
        let store = IntentStore::new(dir.path());
        let err = store.load("deadbeef").unwrap_err();
        assert!(err.to_string().contains("Intent not found"));
        assert!(store.list().unwrap().is_empty());
    }
}
