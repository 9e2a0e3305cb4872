//! Execution backends.
//!
//! The executor never touches the outside world directly. Processes, HTTP and
//! the filesystem are reached through the traits below so tests can swap in
//! recording fakes.

use amen_core::HttpMethod;
use anyhow::Context;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// File the workspace appends registered routes to.
pub const ROUTE_MANIFEST: &str = "routes.manifest";
/// File the workspace appends applied DDL statements to.
pub const MIGRATION_MANIFEST: &str = "migrations.sql";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRequest {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl ProcessRequest {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            cwd: None,
        }
    }

    /// Run `command` through `sh -c`.
    pub fn shell(command: &str) -> Self {
        Self::new("sh", vec!["-c".to_string(), command.to_string()])
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[async_trait]
pub trait ProcessSpawner: Send + Sync {
    /// Run a process to completion. `Err` means it could not be run at all;
    /// a non-zero exit is a normal `Ok`.
    async fn run(&self, request: &ProcessRequest) -> anyhow::Result<ProcessOutput>;
}

/// Spawns real processes. Children are killed when the future is dropped,
/// which is how timeouts and cancellation stop them.
#[derive(Debug, Default)]
pub struct TokioProcessSpawner;

#[async_trait]
impl ProcessSpawner for TokioProcessSpawner {
    async fn run(&self, request: &ProcessRequest) -> anyhow::Result<ProcessOutput> {
        let mut command = tokio::process::Command::new(&request.program);
        command.args(&request.args).kill_on_drop(true);
        if let Some(ref cwd) = request.cwd {
            command.current_dir(cwd);
        }

        let output = command
            .output()
            .await
            .with_context(|| format!("failed to spawn '{}'", request.program))?;

        Ok(ProcessOutput {
            // Killed by a signal.
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send one request. `Err` is a transport failure; any status is `Ok`.
    async fn send(&self, method: HttpMethod, url: &str) -> anyhow::Result<HttpResponse>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(&self, method: HttpMethod, url: &str) -> anyhow::Result<HttpResponse> {
        let method = reqwest::Method::from_bytes(method.as_str().as_bytes())?;
        let response = self
            .client
            .request(method, url)
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .with_context(|| format!("reading response from {} failed", url))?;
        Ok(HttpResponse { status, body })
    }
}

/// Filesystem effects of actions and post-execution artifacts.
///
/// Paths are relative to the workspace root; returned strings are the
/// workspace-relative paths actually written.
#[async_trait]
pub trait Workspace: Send + Sync {
    fn root(&self) -> &Path;

    /// Make the root usable before the first action runs in it.
    async fn prepare(&self) -> anyhow::Result<()>;

    async fn create_file(&self, path: &str) -> anyhow::Result<String>;

    async fn register_route(&self, method: HttpMethod, path: &str) -> anyhow::Result<String>;

    async fn apply_migration(&self, statement: &str) -> anyhow::Result<String>;

    async fn write_artifact(&self, file_name: &str, contents: &str) -> anyhow::Result<String>;
}

/// Workspace on the local filesystem, rooted at a directory.
#[derive(Debug, Clone)]
pub struct LocalWorkspace {
    root: PathBuf,
}

impl LocalWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve `path` inside the root. Leading `/` is dropped; `..` is
    /// rejected.
    pub fn resolve(&self, path: &str) -> anyhow::Result<(PathBuf, String)> {
        let mut relative = PathBuf::new();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
                Component::ParentDir => {
                    anyhow::bail!("path '{}' escapes the workspace", path)
                }
            }
        }
        if relative.as_os_str().is_empty() {
            anyhow::bail!("path '{}' does not name a file", path);
        }
        let display = relative.to_string_lossy().into_owned();
        Ok((self.root.join(relative), display))
    }

    async fn ensure_parent(path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("cannot create directory {}", parent.display()))?;
        }
        Ok(())
    }

    async fn append_line(&self, file_name: &str, line: &str) -> anyhow::Result<String> {
        let path = self.root.join(file_name);
        Self::ensure_parent(&path).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("cannot open {}", path.display()))?;
        file.write_all(format!("{}\n", line).as_bytes()).await?;
        file.flush().await?;
        Ok(file_name.to_string())
    }
}

#[async_trait]
impl Workspace for LocalWorkspace {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn prepare(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("cannot create workspace {}", self.root.display()))
    }

    async fn create_file(&self, path: &str) -> anyhow::Result<String> {
        let (full, display) = self.resolve(path)?;
        Self::ensure_parent(&full).await?;
        tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&full)
            .await
            .with_context(|| format!("cannot create {}", full.display()))?;
        Ok(display)
    }

    async fn register_route(&self, method: HttpMethod, path: &str) -> anyhow::Result<String> {
        self.append_line(ROUTE_MANIFEST, &format!("{} {}", method, path))
            .await
    }

    async fn apply_migration(&self, statement: &str) -> anyhow::Result<String> {
        self.append_line(MIGRATION_MANIFEST, statement).await
    }

    async fn write_artifact(&self, file_name: &str, contents: &str) -> anyhow::Result<String> {
        let (full, display) = self.resolve(file_name)?;
        Self::ensure_parent(&full).await?;
        tokio::fs::write(&full, contents)
            .await
            .with_context(|| format!("cannot write {}", full.display()))?;
        Ok(display)
    }
}

/// The backends an executor runs against.
#[derive(Clone)]
pub struct Backends {
    pub process: Arc<dyn ProcessSpawner>,
    pub http: Arc<dyn HttpClient>,
    pub workspace: Arc<dyn Workspace>,
}

impl Backends {
    /// Real processes, reqwest and a local workspace at `root`.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self {
            process: Arc::new(TokioProcessSpawner),
            http: Arc::new(ReqwestHttpClient::new()),
            workspace: Arc::new(LocalWorkspace::new(root)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn resolve_roots_absolute_paths_and_rejects_parent() {
        let ws = LocalWorkspace::new("/tmp/ws");
        let (full, display) = ws.resolve("/etc/app.conf").unwrap();
        assert_eq!(full, PathBuf::from("/tmp/ws/etc/app.conf"));
        assert_eq!(display, "etc/app.conf");

        assert!(ws.resolve("../secret").is_err());
        assert!(ws.resolve("a/../../b").is_err());
        assert!(ws.resolve("/").is_err());
    }

    #[tokio::test]
    async fn local_workspace_writes_manifests() {
        let dir = tempfile::tempdir().unwrap();
        let ws = LocalWorkspace::new(dir.path());

        ws.register_route(HttpMethod::Get, "/users").await.unwrap();
        ws.register_route(HttpMethod::Post, "/users").await.unwrap();
        ws.apply_migration("CREATE TABLE users (id INTEGER PRIMARY KEY);")
            .await
            .unwrap();
        let created = ws.create_file("notes/readme.md").await.unwrap();

        let routes = std::fs::read_to_string(dir.path().join(ROUTE_MANIFEST)).unwrap();
        assert_eq!(routes, "GET /users\nPOST /users\n");
        assert!(
            std::fs::read_to_string(dir.path().join(MIGRATION_MANIFEST))
                .unwrap()
                .starts_with("CREATE TABLE users")
        );
        assert_eq!(created, "notes/readme.md");
        assert!(dir.path().join("notes/readme.md").exists());
    }

    #[tokio::test]
    async fn prepare_creates_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("workspace").join("ab12cd34");
        let ws = LocalWorkspace::new(&root);
        ws.prepare().await.unwrap();
        ws.prepare().await.unwrap();
        assert!(root.is_dir());
    }

    #[tokio::test]
    async fn create_file_keeps_existing_contents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("keep.txt"), "data").unwrap();
        let ws = LocalWorkspace::new(dir.path());
        ws.create_file("keep.txt").await.unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("keep.txt")).unwrap(), "data");
    }

    /// Serve one connection with `response`, then close it.
    fn serve_once(response: &'static str) -> String {
        use std::io::{Read, Write};
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request = [0u8; 1024];
                let _ = stream.read(&mut request);
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{}/health", addr)
    }

    fn direct_client() -> ReqwestHttpClient {
        ReqwestHttpClient {
            client: reqwest::Client::builder().no_proxy().build().unwrap(),
        }
    }

    #[tokio::test]
    async fn reqwest_client_returns_status_and_body() {
        let url = serve_once("HTTP/1.1 503 Service Unavailable\r\nContent-Length: 4\r\nConnection: close\r\n\r\nbusy");
        let response = direct_client()
            .send(HttpMethod::Get, &url)
            .await
            .unwrap();
        assert_eq!(response.status, 503);
        assert_eq!(response.body, "busy");
    }

    #[tokio::test]
    async fn truncated_body_is_a_transport_error() {
        let url = serve_once("HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\npartial");
        let err = direct_client()
            .send(HttpMethod::Get, &url)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("reading response from"));
    }

    #[tokio::test]
    async fn tokio_spawner_reports_exit_code() {
        let output = TokioProcessSpawner
            .run(&ProcessRequest::shell("echo hi; exit 3"))
            .await
            .unwrap();
        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stdout, "hi\n");
        assert!(!output.success());
    }
}
