//! In-memory backends for executor and engine tests.

#![allow(dead_code)]

use amen_core::{HttpMethod, Intent, IntentDraft, parse_action};
use amen_planner::Planner;
use amen_runtime::{
    Backends, HttpClient, HttpResponse, ProcessOutput, ProcessRequest, ProcessSpawner, Workspace,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records requests and answers from a script; exit 0 once it runs dry.
#[derive(Default)]
pub struct FakeProcess {
    pub calls: Mutex<Vec<ProcessRequest>>,
    script: Mutex<VecDeque<ProcessOutput>>,
    delay: Option<Duration>,
}

impl FakeProcess {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn push_exit(&self, exit_code: i32, stderr: &str) {
        self.script.lock().unwrap().push_back(ProcessOutput {
            exit_code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        });
    }

    pub fn push_stdout(&self, stdout: &str) {
        self.script.lock().unwrap().push_back(ProcessOutput {
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        });
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Arguments of every call, in order.
    pub fn argv(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.args.clone())
            .collect()
    }
}

#[async_trait]
impl ProcessSpawner for FakeProcess {
    async fn run(&self, request: &ProcessRequest) -> anyhow::Result<ProcessOutput> {
        self.calls.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.script.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or(ProcessOutput {
            exit_code: 0,
            stdout: "ok\n".to_string(),
            stderr: String::new(),
        }))
    }
}

/// Scripted HTTP answers; `Err` entries are transport failures. Answers 200
/// once the script runs dry.
#[derive(Default)]
pub struct FakeHttp {
    pub calls: Mutex<Vec<(HttpMethod, String)>>,
    script: Mutex<VecDeque<Result<u16, String>>>,
    delay: Option<Duration>,
}

impl FakeHttp {
    pub fn scripted(answers: Vec<Result<u16, String>>) -> Self {
        Self {
            script: Mutex::new(answers.into()),
            ..Default::default()
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpClient for FakeHttp {
    async fn send(&self, method: HttpMethod, url: &str) -> anyhow::Result<HttpResponse> {
        self.calls.lock().unwrap().push((method, url.to_string()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let answer = self.script.lock().unwrap().pop_front().unwrap_or(Ok(200));
        match answer {
            Ok(status) => Ok(HttpResponse {
                status,
                body: format!("status {}", status),
            }),
            Err(message) => anyhow::bail!(message),
        }
    }
}

/// Workspace that only records what would have been written.
#[derive(Default)]
pub struct MemoryWorkspace {
    pub routes: Mutex<Vec<String>>,
    pub migrations: Mutex<Vec<String>>,
    pub files: Mutex<Vec<String>>,
    pub artifacts: Mutex<Vec<(String, String)>>,
    pub prepared: Mutex<usize>,
    refuse_prepare: bool,
    root: PathBuf,
}

impl MemoryWorkspace {
    /// A workspace whose root can never be created.
    pub fn unavailable() -> Self {
        Self {
            refuse_prepare: true,
            ..Default::default()
        }
    }

    pub fn prepare_count(&self) -> usize {
        *self.prepared.lock().unwrap()
    }

    pub fn is_untouched(&self) -> bool {
        self.routes.lock().unwrap().is_empty()
            && self.migrations.lock().unwrap().is_empty()
            && self.files.lock().unwrap().is_empty()
            && self.artifacts.lock().unwrap().is_empty()
    }

    pub fn files(&self) -> Vec<String> {
        self.files.lock().unwrap().clone()
    }

    pub fn artifact_names(&self) -> Vec<String> {
        self.artifacts
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[async_trait]
impl Workspace for MemoryWorkspace {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn prepare(&self) -> anyhow::Result<()> {
        *self.prepared.lock().unwrap() += 1;
        if self.refuse_prepare {
            anyhow::bail!("cannot create workspace: permission denied");
        }
        Ok(())
    }

    async fn create_file(&self, path: &str) -> anyhow::Result<String> {
        if path.contains("..") {
            anyhow::bail!("path '{}' escapes the workspace", path);
        }
        self.files.lock().unwrap().push(path.to_string());
        Ok(path.to_string())
    }

    async fn register_route(&self, method: HttpMethod, path: &str) -> anyhow::Result<String> {
        self.routes
            .lock()
            .unwrap()
            .push(format!("{} {}", method, path));
        Ok("routes.manifest".to_string())
    }

    async fn apply_migration(&self, statement: &str) -> anyhow::Result<String> {
        self.migrations.lock().unwrap().push(statement.to_string());
        Ok("migrations.sql".to_string())
    }

    async fn write_artifact(&self, file_name: &str, contents: &str) -> anyhow::Result<String> {
        self.artifacts
            .lock()
            .unwrap()
            .push((file_name.to_string(), contents.to_string()));
        Ok(file_name.to_string())
    }
}

/// Fakes plus the [`Backends`] bundle built from them.
pub struct Fakes {
    pub process: Arc<FakeProcess>,
    pub http: Arc<FakeHttp>,
    pub workspace: Arc<MemoryWorkspace>,
}

impl Fakes {
    pub fn new() -> Self {
        Self::with(FakeProcess::default(), FakeHttp::default())
    }

    pub fn with(process: FakeProcess, http: FakeHttp) -> Self {
        Self::with_workspace(process, http, MemoryWorkspace::default())
    }

    pub fn with_workspace(process: FakeProcess, http: FakeHttp, workspace: MemoryWorkspace) -> Self {
        Self {
            process: Arc::new(process),
            http: Arc::new(http),
            workspace: Arc::new(workspace),
        }
    }

    pub fn backends(&self) -> Backends {
        Backends {
            process: self.process.clone(),
            http: self.http.clone(),
            workspace: self.workspace.clone(),
        }
    }

    pub fn untouched(&self) -> bool {
        self.process.call_count() == 0 && self.http.call_count() == 0 && self.workspace.is_untouched()
    }
}

pub fn draft(actions: &[&str]) -> Intent {
    Intent::draft(
        IntentDraft::new("svc", "test service")
            .with_actions(actions.iter().map(|a| parse_action(a).unwrap()).collect()),
    )
}

/// Planned and approved without any confirmation step.
pub fn approved(actions: &[&str]) -> Intent {
    approve(draft(actions))
}

pub fn approve(mut intent: Intent) -> Intent {
    Planner::new().plan_intent(&mut intent).unwrap();
    intent.approve("tester", Utc::now()).unwrap();
    intent
}
