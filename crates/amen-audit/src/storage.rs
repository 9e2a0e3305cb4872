//! Storage backends for audit events.

use crate::error::AuditError;
use crate::event::AuditEvent;
use crate::logger::AuditFilter;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

/// Trait for audit storage backends.
#[async_trait]
pub trait AuditStorage: Send + Sync {
    /// Store an audit event.
    async fn store(&self, event: &AuditEvent) -> Result<(), AuditError>;

    /// Query audit events, oldest first.
    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>, AuditError>;
}

/// Discards every event.
pub struct NullStorage;

#[async_trait]
impl AuditStorage for NullStorage {
    async fn store(&self, _event: &AuditEvent) -> Result<(), AuditError> {
        Ok(())
    }

    async fn query(&self, _filter: &AuditFilter) -> Result<Vec<AuditEvent>, AuditError> {
        Ok(Vec::new())
    }
}

/// Console storage (prints log lines to stdout). Not queryable.
pub struct ConsoleStorage;

#[async_trait]
impl AuditStorage for ConsoleStorage {
    async fn store(&self, event: &AuditEvent) -> Result<(), AuditError> {
        println!("{}", event.to_log_line());
        Ok(())
    }

    async fn query(&self, _filter: &AuditFilter) -> Result<Vec<AuditEvent>, AuditError> {
        Ok(Vec::new())
    }
}

/// In-memory storage, used by tests and short-lived sessions.
#[derive(Default)]
pub struct MemoryStorage {
    events: RwLock<Vec<AuditEvent>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all stored events.
    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl AuditStorage for MemoryStorage {
    async fn store(&self, event: &AuditEvent) -> Result<(), AuditError> {
        self.events.write().await.push(event.clone());
        Ok(())
    }

    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>, AuditError> {
        let events = self.events.read().await;
        Ok(filter.apply(events.iter().cloned()))
    }
}

/// File storage (JSON Lines). One event per line, appended in order.
pub struct FileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    /// Create the storage, making the parent directory if needed.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AuditError::InitializationFailed(format!(
                        "cannot create audit directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditStorage for FileStorage {
    async fn store(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>, AuditError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let events = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<AuditEvent>(line) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "Skipping malformed audit line");
                    None
                }
            });
        Ok(filter.apply(events))
    }
}

/// Writes to a primary store and echoes to a secondary one. Queries hit the
/// primary only.
pub struct DualStorage {
    primary: Box<dyn AuditStorage>,
    secondary: Box<dyn AuditStorage>,
}

impl DualStorage {
    pub fn new(primary: Box<dyn AuditStorage>, secondary: Box<dyn AuditStorage>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl AuditStorage for DualStorage {
    async fn store(&self, event: &AuditEvent) -> Result<(), AuditError> {
        self.primary.store(event).await?;
        self.secondary.store(event).await
    }

    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>, AuditError> {
        self.primary.query(filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::AuditEventType;
    use pretty_assertions::assert_eq;

    fn event(kind: AuditEventType, intent: &str) -> AuditEvent {
        AuditEvent::new(kind, intent, "svc")
    }

    #[tokio::test]
    async fn file_storage_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested/audit.jsonl")).unwrap();

        storage.store(&event(AuditEventType::IntentRegistered, "a")).await.unwrap();
        storage.store(&event(AuditEventType::PlanProduced, "a")).await.unwrap();
        storage.store(&event(AuditEventType::PlanProduced, "b")).await.unwrap();

        let raw = std::fs::read_to_string(storage.path()).unwrap();
        assert_eq!(raw.lines().count(), 3);

        let filter = AuditFilter {
            intent_id: Some("a".to_string()),
            ..Default::default()
        };
        let found = storage.query(&filter).await.unwrap();
        let kinds: Vec<_> = found.iter().map(|e| e.event_type).collect();
        assert_eq!(
            kinds,
            vec![AuditEventType::IntentRegistered, AuditEventType::PlanProduced]
        );
    }

    #[test]
    fn unusable_directory_fails_initialization() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("taken");
        std::fs::write(&blocker, "file, not a directory").unwrap();

        let err = FileStorage::new(blocker.join("audit.jsonl")).err().unwrap();
        assert!(matches!(err, AuditError::InitializationFailed(_)));
    }

    #[tokio::test]
    async fn missing_file_queries_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("audit.jsonl")).unwrap();
        assert!(storage.query(&AuditFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let storage = FileStorage::new(&path).unwrap();
        storage.store(&event(AuditEventType::ApprovalGranted, "a")).await.unwrap();
        let mut raw = std::fs::read_to_string(&path).unwrap();
        raw.push_str("not json\n");
        std::fs::write(&path, raw).unwrap();

        assert_eq!(storage.query(&AuditFilter::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dual_storage_queries_primary() {
        let storage = DualStorage::new(Box::new(MemoryStorage::new()), Box::new(NullStorage));
        storage.store(&event(AuditEventType::ActionFailed, "a")).await.unwrap();
        assert_eq!(storage.query(&AuditFilter::default()).await.unwrap().len(), 1);
    }
}
