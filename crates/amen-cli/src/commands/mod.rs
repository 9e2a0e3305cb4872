//! CLI command implementations.

pub mod approve;
pub mod author;
pub mod execute;
pub mod inspect;
pub mod store;

use amen_audit::AuditLogger;
use amen_core::{EngineConfig, Intent};
use amen_runtime::{AmenGate, Backends, Confirmer, Engine, Executor, IntentHandle, StaticConfirmer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use store::{IntentStore, STATE_DIR};

/// Everything a command needs: configuration, the intent store and the
/// audit logger.
pub struct Context {
    pub project_dir: PathBuf,
    pub config: EngineConfig,
    pub store: IntentStore,
    pub audit: Arc<AuditLogger>,
}

impl Context {
    /// Build the context for `project_dir`. Audit events go to
    /// `.amen/audit/` unless the config names a directory.
    pub fn new(project_dir: &Path, mut config: EngineConfig) -> anyhow::Result<Self> {
        let store = IntentStore::new(project_dir.join(STATE_DIR));
        if config.audit.directory.is_none() {
            config.audit.directory = Some(store.root().join("audit"));
        }
        let audit = Arc::new(AuditLogger::new(&config.audit)?);
        Ok(Self {
            project_dir: project_dir.to_path_buf(),
            config,
            store,
            audit,
        })
    }

    /// Engine without a confirmation step, for commands that never approve.
    pub fn engine(&self) -> Engine {
        self.engine_with(
            Arc::new(StaticConfirmer(false)),
            false,
            self.project_dir.join(&self.config.executor.workspace_dir),
        )
    }

    pub fn engine_with(
        &self,
        confirmer: Arc<dyn Confirmer>,
        auto_approve: bool,
        workspace: PathBuf,
    ) -> Engine {
        let gate = AmenGate::from_config(&self.config.approval, confirmer)
            .with_auto_approve(self.config.approval.auto_approve || auto_approve);
        Engine::new(
            gate,
            Executor::new(Backends::local(workspace)),
            self.audit.clone(),
        )
    }

    pub fn open(&self, intent_id: &str) -> anyhow::Result<IntentHandle> {
        Ok(IntentHandle::new(self.store.load(intent_id)?))
    }

    /// Persist the handle's current state.
    pub async fn save(&self, handle: &IntentHandle) -> anyhow::Result<Intent> {
        let intent = handle.snapshot().await;
        self.store.save(&intent)?;
        Ok(intent)
    }
}
