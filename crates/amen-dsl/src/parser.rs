//! YAML document walker.

use crate::error::{DslError, ParseDiagnostic};
use amen_core::{
    Action, Environment, ExecutionMode, Implementation, Intent, IntentDraft, RuntimeKind,
    parse_action,
};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use tracing::debug;

const SECTIONS: [&str; 4] = ["INTENT", "ENVIRONMENT", "IMPLEMENTATION", "EXECUTION"];

/// A freshly parsed Draft intent plus every non-fatal finding.
#[derive(Debug, Clone)]
pub struct ParsedIntent {
    pub intent: Intent,
    pub diagnostics: Vec<ParseDiagnostic>,
}

impl ParsedIntent {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(ParseDiagnostic::is_error)
    }
}

/// Parse DSL text into a Draft [`Intent`].
pub fn parse_dsl(text: &str) -> Result<ParsedIntent, DslError> {
    DslParser::new().parse(text)
}

/// Stateless DSL parser.
#[derive(Debug, Clone, Default)]
pub struct DslParser;

impl DslParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, text: &str) -> Result<ParsedIntent, DslError> {
        let doc: Value = serde_yaml::from_str(text)?;
        let Value::Mapping(root) = doc else {
            return Err(DslError::Fatal {
                diagnostics: vec![ParseDiagnostic::error(
                    "<document>",
                    "document must be a mapping with an INTENT section",
                )],
            });
        };

        let mut walker = Walker::default();
        walker.unknown_sections(&root);

        let header = walker.intent_header(root.get("INTENT"));
        let environment = walker.environment(root.get("ENVIRONMENT"));
        let implementation = walker.implementation(root.get("IMPLEMENTATION"));
        let execution_mode = walker.execution(root.get("EXECUTION"));

        let Some((name, goal, description)) = header else {
            return Err(DslError::Fatal {
                diagnostics: walker.diagnostics,
            });
        };

        let intent = Intent::draft(IntentDraft {
            name,
            goal,
            description,
            environment,
            implementation,
            execution_mode,
        });
        debug!(
            intent_id = %intent.id(),
            actions = intent.actions().len(),
            diagnostics = walker.diagnostics.len(),
            "Parsed intent"
        );

        Ok(ParsedIntent {
            intent,
            diagnostics: walker.diagnostics,
        })
    }
}

#[derive(Default)]
struct Walker {
    diagnostics: Vec<ParseDiagnostic>,
}

impl Walker {
    fn warn(&mut self, location: impl Into<String>, message: impl Into<String>) {
        self.diagnostics
            .push(ParseDiagnostic::warning(location, message));
    }

    fn error(&mut self, location: impl Into<String>, message: impl Into<String>) {
        self.diagnostics.push(ParseDiagnostic::error(location, message));
    }

    fn unknown_sections(&mut self, root: &Mapping) {
        for key in root.keys() {
            let known = key.as_str().is_some_and(|k| SECTIONS.contains(&k));
            if !known {
                self.warn(
                    describe_key(key),
                    format!("unknown section ignored (expected one of {})", SECTIONS.join(", ")),
                );
            }
        }
    }

    /// Required `name` and `goal`; `None` when the header is unusable.
    fn intent_header(
        &mut self,
        block: Option<&Value>,
    ) -> Option<(String, String, Option<String>)> {
        let block = match block {
            Some(Value::Mapping(m)) => m,
            Some(_) => {
                self.error("INTENT", "INTENT must be a mapping");
                return None;
            }
            None => {
                self.error("INTENT", "missing INTENT section");
                return None;
            }
        };

        let name = self.required_text(block, "INTENT.name", "name");
        let goal = self.required_text(block, "INTENT.goal", "goal");
        let description = self.optional_text(block, "INTENT.description", "description");
        Some((name?, goal?, description))
    }

    fn required_text(&mut self, block: &Mapping, location: &str, key: &str) -> Option<String> {
        match self.optional_text(block, location, key) {
            Some(text) if !text.trim().is_empty() => Some(text),
            Some(_) => {
                self.error(location, format!("'{}' must not be empty", key));
                None
            }
            None => {
                self.error(location, format!("missing required field '{}'", key));
                None
            }
        }
    }

    /// Scalar field as text. Non-scalar values are reported and treated as absent.
    fn optional_text(&mut self, block: &Mapping, location: &str, key: &str) -> Option<String> {
        match block.get(key) {
            None | Some(Value::Null) => None,
            Some(value) => match scalar_text(value) {
                Some(text) => Some(text),
                None => {
                    self.warn(location, format!("'{}' must be a scalar value", key));
                    None
                }
            },
        }
    }

    fn environment(&mut self, block: Option<&Value>) -> Environment {
        let mut env = Environment::default();
        let Some(block) = self.optional_section(block, "ENVIRONMENT") else {
            return env;
        };

        if let Some(runtime) = self.optional_text(block, "ENVIRONMENT.runtime", "runtime") {
            match RuntimeKind::parse(&runtime) {
                Some(kind) => env.runtime = kind,
                None => self.warn(
                    "ENVIRONMENT.runtime",
                    format!("unknown runtime '{}', using '{}'", runtime, env.runtime),
                ),
            }
        }

        if let Some(image) = self.optional_text(block, "ENVIRONMENT.base_image", "base_image") {
            env.base_image = image;
        }

        for (i, value) in self.list(block, "ENVIRONMENT", "ports").iter().enumerate() {
            match port(value) {
                Some(p) => env.ports.push(p),
                None => self.warn(
                    format!("ENVIRONMENT.ports[{}]", i),
                    "port must be an integer between 1 and 65535, ignored",
                ),
            }
        }

        env.services = self.text_list(block, "ENVIRONMENT", "services");
        env.volumes = self.text_list(block, "ENVIRONMENT", "volumes");
        env.env_vars = self.env_vars(block);
        env
    }

    fn env_vars(&mut self, block: &Mapping) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();
        match block.get("env_vars") {
            None | Some(Value::Null) => {}
            Some(Value::Mapping(map)) => {
                for (key, value) in map {
                    match (key.as_str(), scalar_text(value)) {
                        (Some(k), Some(v)) => {
                            vars.insert(k.to_string(), v);
                        }
                        _ => self.warn(
                            format!("ENVIRONMENT.env_vars.{}", describe_key(key)),
                            "environment variables must map names to scalar values, ignored",
                        ),
                    }
                }
            }
            Some(_) => self.warn("ENVIRONMENT.env_vars", "env_vars must be a mapping, ignored"),
        }
        vars
    }

    fn implementation(&mut self, block: Option<&Value>) -> Implementation {
        let mut implementation = Implementation::default();
        let Some(block) = self.optional_section(block, "IMPLEMENTATION") else {
            return implementation;
        };

        if let Some(language) =
            self.optional_text(block, "IMPLEMENTATION.language", "language")
        {
            implementation.language = language.trim().to_ascii_lowercase();
        }
        implementation.framework = self
            .optional_text(block, "IMPLEMENTATION.framework", "framework")
            .map(|f| f.trim().to_ascii_lowercase())
            .filter(|f| !f.is_empty());

        implementation.actions = self.actions(block);
        implementation
    }

    fn actions(&mut self, block: &Mapping) -> Vec<Action> {
        let entries = self.list(block, "IMPLEMENTATION", "actions");
        let mut actions = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            match entry {
                Value::String(raw) => match parse_action(raw) {
                    Ok(action) => actions.push(action),
                    Err(err) => self.diagnostics.push(ParseDiagnostic::action(index, err)),
                },
                _ => {
                    let mut diagnostic = ParseDiagnostic::error(
                        format!("IMPLEMENTATION.actions[{}]", index),
                        "action must be a string like 'db.create users', skipped",
                    );
                    diagnostic.action_index = Some(index);
                    self.diagnostics.push(diagnostic);
                }
            }
        }
        actions
    }

    fn execution(&mut self, block: Option<&Value>) -> ExecutionMode {
        let default = ExecutionMode::default();
        let Some(block) = self.optional_section(block, "EXECUTION") else {
            return default;
        };
        match self.optional_text(block, "EXECUTION.mode", "mode") {
            None => default,
            Some(mode) => ExecutionMode::parse(&mode).unwrap_or_else(|| {
                self.warn(
                    "EXECUTION.mode",
                    format!("unknown execution mode '{}', using '{}'", mode, default),
                );
                default
            }),
        }
    }

    fn optional_section<'a>(
        &mut self,
        block: Option<&'a Value>,
        name: &str,
    ) -> Option<&'a Mapping> {
        match block {
            None | Some(Value::Null) => None,
            Some(Value::Mapping(m)) => Some(m),
            Some(_) => {
                self.warn(name, format!("{} must be a mapping, using defaults", name));
                None
            }
        }
    }

    fn list(&mut self, block: &Mapping, section: &str, key: &str) -> Vec<Value> {
        match block.get(key) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Sequence(items)) => items.clone(),
            Some(_) => {
                self.warn(
                    format!("{}.{}", section, key),
                    format!("'{}' must be a list, ignored", key),
                );
                Vec::new()
            }
        }
    }

    fn text_list(&mut self, block: &Mapping, section: &str, key: &str) -> Vec<String> {
        let mut out = Vec::new();
        for (i, value) in self.list(block, section, key).iter().enumerate() {
            match scalar_text(value) {
                Some(text) => out.push(text),
                None => self.warn(
                    format!("{}.{}[{}]", section, key, i),
                    "entry must be a scalar value, ignored",
                ),
            }
        }
        out
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn port(value: &Value) -> Option<u16> {
    let raw = match value {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    u16::try_from(raw).ok().filter(|p| *p > 0)
}

fn describe_key(key: &Value) -> String {
    scalar_text(key).unwrap_or_else(|| "<complex key>".to_string())
}
