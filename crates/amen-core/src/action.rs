//! Typed action model.
//!
//! Every implementation step of an intent is one [`Action`]. Actions are parsed
//! from their DSL form (`verb ARG ...`) by [`parse_action`], which always returns
//! a structured [`ActionError`] for malformed input so that callers can collect
//! every error in an action list instead of stopping at the first one.
//!
//! Argument newtypes ([`Identifier`], [`EndpointPath`], [`ColumnType`]) can only
//! be built through validation, including when deserialized from disk.

use serde::{Deserialize, Serialize};
use std::fmt;

/// HTTP method accepted by `api.expose` and `rest.call`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 5] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Patch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
        }
    }

    /// Parse a method token. Case-insensitive; the stored form is upper-case.
    pub fn parse(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(token))
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected argument value. Converted into [`ActionError`] by the parser.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct InvalidArgument(pub String);

/// Table or column name: `[A-Za-z_][A-Za-z0-9_]*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    pub fn new(raw: impl Into<String>) -> Result<Self, InvalidArgument> {
        let raw = raw.into();
        if is_identifier(&raw) {
            Ok(Self(raw))
        } else {
            Err(InvalidArgument(format!(
                "'{}' is not a valid identifier (letters, digits and '_', not starting with a digit)",
                raw
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identifier {
    type Error = InvalidArgument;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// HTTP route path. Must start with `/` and contain no whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EndpointPath(String);

impl EndpointPath {
    pub fn new(raw: impl Into<String>) -> Result<Self, InvalidArgument> {
        let raw = raw.into();
        if !raw.starts_with('/') {
            return Err(InvalidArgument(format!("path '{}' must start with '/'", raw)));
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(InvalidArgument(format!(
                "path '{}' must not contain whitespace",
                raw
            )));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Function-name friendly form used by code generation (`/users/{id}` -> `users_id`).
    pub fn handler_name(&self) -> String {
        let name: String = self
            .0
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let name = name.trim_matches('_');
        if name.is_empty() {
            "root".to_string()
        } else {
            name.to_string()
        }
    }
}

impl TryFrom<String> for EndpointPath {
    type Error = InvalidArgument;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EndpointPath> for String {
    fn from(value: EndpointPath) -> Self {
        value.0
    }
}

impl fmt::Display for EndpointPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Column type token: `name`, `name(n)` or `name(n,m)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ColumnType(String);

impl ColumnType {
    pub fn new(raw: impl Into<String>) -> Result<Self, InvalidArgument> {
        let raw = raw.into();
        let (base, params) = split_type(&raw);
        let base_ok = !base.is_empty()
            && base.starts_with(|c: char| c.is_ascii_alphabetic())
            && base.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        let params_ok = match params {
            None => !raw.contains(['(', ')']),
            Some(p) => {
                let parts: Vec<&str> = p.split(',').collect();
                parts.len() <= 2
                    && parts
                        .iter()
                        .all(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
            }
        };
        if base_ok && params_ok {
            Ok(Self(raw))
        } else {
            Err(InvalidArgument(format!("'{}' is not a valid column type", raw)))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// SQL type for a recognized type token, `None` when the base name is unknown.
    pub fn sql_type(&self) -> Option<String> {
        let (base, params) = split_type(&self.0);
        let base = base.to_ascii_lowercase();
        let sql = match base.as_str() {
            "string" | "text" | "str" => "TEXT",
            "varchar" | "char" => "VARCHAR",
            "int" | "integer" => "INTEGER",
            "bigint" | "long" => "BIGINT",
            "float" | "double" | "real" => "DOUBLE PRECISION",
            "decimal" | "numeric" => "NUMERIC",
            "bool" | "boolean" => "BOOLEAN",
            "date" => "DATE",
            "datetime" | "timestamp" => "TIMESTAMP",
            "json" | "jsonb" => "JSONB",
            "uuid" => "UUID",
            _ => return None,
        };
        Some(match params {
            Some(p) => format!("{}({})", sql, p),
            None => sql.to_string(),
        })
    }
}

fn split_type(raw: &str) -> (&str, Option<&str>) {
    match raw.split_once('(') {
        Some((base, rest)) => match rest.strip_suffix(')') {
            Some(params) => (base, Some(params)),
            None => (raw, None),
        },
        None => (raw, None),
    }
}

impl TryFrom<String> for ColumnType {
    type Error = InvalidArgument;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ColumnType> for String {
    fn from(value: ColumnType) -> Self {
        value.0
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The closed set of verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    ApiExpose,
    DbCreate,
    DbAddColumn,
    ShellExec,
    RestCall,
    FileCreate,
}

impl Verb {
    pub const ALL: [Verb; 6] = [
        Verb::ApiExpose,
        Verb::DbCreate,
        Verb::DbAddColumn,
        Verb::ShellExec,
        Verb::RestCall,
        Verb::FileCreate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiExpose => "api.expose",
            Self::DbCreate => "db.create",
            Self::DbAddColumn => "db.add_column",
            Self::ShellExec => "shell.exec",
            Self::RestCall => "rest.call",
            Self::FileCreate => "file.create",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == token)
    }

    /// Fixed argument count. `None` for `shell.exec`, which takes the raw remainder.
    pub fn arity(&self) -> Option<usize> {
        match self {
            Self::ApiExpose => Some(2),
            Self::DbCreate => Some(1),
            Self::DbAddColumn => Some(3),
            Self::ShellExec => None,
            Self::RestCall => Some(2),
            Self::FileCreate => Some(1),
        }
    }

    fn usage(&self) -> &'static str {
        match self {
            Self::ApiExpose => "api.expose METHOD /path",
            Self::DbCreate => "db.create table",
            Self::DbAddColumn => "db.add_column table column type",
            Self::ShellExec => "shell.exec <command...>",
            Self::RestCall => "rest.call METHOD url",
            Self::FileCreate => "file.create path",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One typed, validated operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verb")]
pub enum Action {
    #[serde(rename = "api.expose")]
    ApiExpose {
        method: HttpMethod,
        path: EndpointPath,
    },
    #[serde(rename = "db.create")]
    DbCreate { table: Identifier },
    #[serde(rename = "db.add_column")]
    DbAddColumn {
        table: Identifier,
        column: Identifier,
        column_type: ColumnType,
    },
    #[serde(rename = "shell.exec")]
    ShellExec { command: String },
    #[serde(rename = "rest.call")]
    RestCall { method: HttpMethod, url: String },
    #[serde(rename = "file.create")]
    FileCreate { path: String },
}

impl Action {
    pub fn verb(&self) -> Verb {
        match self {
            Self::ApiExpose { .. } => Verb::ApiExpose,
            Self::DbCreate { .. } => Verb::DbCreate,
            Self::DbAddColumn { .. } => Verb::DbAddColumn,
            Self::ShellExec { .. } => Verb::ShellExec,
            Self::RestCall { .. } => Verb::RestCall,
            Self::FileCreate { .. } => Verb::FileCreate,
        }
    }

    /// Whether a failed attempt may be retried. Only remote calls qualify;
    /// process and file effects are not assumed idempotent.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RestCall { .. } => true,
            Self::ApiExpose { .. }
            | Self::DbCreate { .. }
            | Self::DbAddColumn { .. }
            | Self::ShellExec { .. }
            | Self::FileCreate { .. } => false,
        }
    }

    /// DDL statement for schema actions.
    pub fn ddl(&self) -> Option<String> {
        match self {
            Self::DbCreate { table } => Some(format!(
                "CREATE TABLE {} (id INTEGER PRIMARY KEY);",
                table
            )),
            Self::DbAddColumn {
                table,
                column,
                column_type,
            } => Some(format!(
                "ALTER TABLE {} ADD COLUMN {} {};",
                table,
                column,
                column_type.sql_type().unwrap_or_else(|| "TEXT".to_string())
            )),
            Self::ApiExpose { .. }
            | Self::ShellExec { .. }
            | Self::RestCall { .. }
            | Self::FileCreate { .. } => None,
        }
    }
}

/// Canonical DSL form. `parse_action(&a.to_string()) == Ok(a)`.
impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiExpose { method, path } => write!(f, "api.expose {} {}", method, path),
            Self::DbCreate { table } => write!(f, "db.create {}", table),
            Self::DbAddColumn {
                table,
                column,
                column_type,
            } => write!(f, "db.add_column {} {} {}", table, column, column_type),
            Self::ShellExec { command } if command.is_empty() => f.write_str("shell.exec"),
            Self::ShellExec { command } => write!(f, "shell.exec {}", command),
            Self::RestCall { method, url } => write!(f, "rest.call {} {}", method, url),
            Self::FileCreate { path } => write!(f, "file.create {}", path),
        }
    }
}

/// Category of an action parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionErrorKind {
    UnknownVerb,
    ArityMismatch,
    InvalidArgument,
}

impl fmt::Display for ActionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownVerb => write!(f, "unknown verb"),
            Self::ArityMismatch => write!(f, "arity mismatch"),
            Self::InvalidArgument => write!(f, "invalid argument"),
        }
    }
}

/// Structured action parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind} in '{raw}': {reason}")]
pub struct ActionError {
    pub kind: ActionErrorKind,
    /// The raw action string as given.
    pub raw: String,
    /// Human-readable reason.
    pub reason: String,
}

impl ActionError {
    fn new(kind: ActionErrorKind, raw: &str, reason: impl Into<String>) -> Self {
        Self {
            kind,
            raw: raw.to_string(),
            reason: reason.into(),
        }
    }

    fn invalid(raw: &str, err: InvalidArgument) -> Self {
        Self::new(ActionErrorKind::InvalidArgument, raw, err.0)
    }
}

/// Parse one action string.
pub fn parse_action(raw: &str) -> Result<Action, ActionError> {
    let trimmed = raw.trim();
    let (verb_token, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (trimmed, ""),
    };

    if verb_token.is_empty() {
        return Err(ActionError::new(
            ActionErrorKind::UnknownVerb,
            raw,
            "empty action",
        ));
    }

    let verb = Verb::from_token(verb_token).ok_or_else(|| {
        let known: Vec<&str> = Verb::ALL.iter().map(Verb::as_str).collect();
        ActionError::new(
            ActionErrorKind::UnknownVerb,
            raw,
            format!("'{}' is not one of: {}", verb_token, known.join(", ")),
        )
    })?;

    let Some(arity) = verb.arity() else {
        return Ok(Action::ShellExec {
            command: rest.to_string(),
        });
    };

    let args: Vec<&str> = rest.split_whitespace().collect();
    if args.len() != arity {
        return Err(ActionError::new(
            ActionErrorKind::ArityMismatch,
            raw,
            format!(
                "{} expects {} argument(s), got {} (usage: {})",
                verb,
                arity,
                args.len(),
                verb.usage()
            ),
        ));
    }

    let method = |token: &str| {
        HttpMethod::parse(token).ok_or_else(|| {
            ActionError::new(
                ActionErrorKind::InvalidArgument,
                raw,
                format!(
                    "'{}' is not an HTTP method (expected GET, POST, PUT, DELETE or PATCH)",
                    token
                ),
            )
        })
    };
    let ident = |token: &str| Identifier::new(token).map_err(|e| ActionError::invalid(raw, e));

    match (verb, args.as_slice()) {
        (Verb::ApiExpose, [m, p]) => Ok(Action::ApiExpose {
            method: method(m)?,
            path: EndpointPath::new(*p).map_err(|e| ActionError::invalid(raw, e))?,
        }),
        (Verb::DbCreate, [t]) => Ok(Action::DbCreate { table: ident(t)? }),
        (Verb::DbAddColumn, [t, c, ty]) => Ok(Action::DbAddColumn {
            table: ident(t)?,
            column: ident(c)?,
            column_type: ColumnType::new(*ty).map_err(|e| ActionError::invalid(raw, e))?,
        }),
        (Verb::RestCall, [m, u]) => Ok(Action::RestCall {
            method: method(m)?,
            url: u.to_string(),
        }),
        (Verb::FileCreate, [p]) => Ok(Action::FileCreate {
            path: p.to_string(),
        }),
        _ => Err(ActionError::new(
            ActionErrorKind::ArityMismatch,
            raw,
            format!("usage: {}", verb.usage()),
        )),
    }
}

/// Parse a list of action strings, keeping every result in input order.
pub fn parse_actions<'a>(
    raws: impl IntoIterator<Item = &'a str>,
) -> Vec<Result<Action, ActionError>> {
    raws.into_iter().map(parse_action).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_every_verb() {
        assert_eq!(
            parse_action("api.expose GET /users").unwrap(),
            Action::ApiExpose {
                method: HttpMethod::Get,
                path: EndpointPath::new("/users").unwrap(),
            }
        );
        assert_eq!(
            parse_action("db.create users").unwrap(),
            Action::DbCreate {
                table: Identifier::new("users").unwrap()
            }
        );
        assert_eq!(
            parse_action("db.add_column users email string").unwrap(),
            Action::DbAddColumn {
                table: Identifier::new("users").unwrap(),
                column: Identifier::new("email").unwrap(),
                column_type: ColumnType::new("string").unwrap(),
            }
        );
        assert_eq!(
            parse_action("shell.exec echo hello   world").unwrap(),
            Action::ShellExec {
                command: "echo hello   world".to_string()
            }
        );
        assert_eq!(
            parse_action("rest.call POST https://example.com/hook").unwrap(),
            Action::RestCall {
                method: HttpMethod::Post,
                url: "https://example.com/hook".to_string()
            }
        );
        assert_eq!(
            parse_action("file.create config/app.toml").unwrap(),
            Action::FileCreate {
                path: "config/app.toml".to_string()
            }
        );
    }

    #[test]
    fn shell_exec_accepts_empty_command() {
        assert_eq!(
            parse_action("shell.exec").unwrap(),
            Action::ShellExec {
                command: String::new()
            }
        );
        assert_eq!(
            parse_action("  shell.exec   ").unwrap(),
            Action::ShellExec {
                command: String::new()
            }
        );
    }

    #[test]
    fn method_is_case_insensitive_and_normalized() {
        let action = parse_action("api.expose delete /users").unwrap();
        assert_eq!(action.to_string(), "api.expose DELETE /users");
    }

    #[test]
    fn unknown_verb_is_reported() {
        let err = parse_action("db.drop users").unwrap_err();
        assert_eq!(err.kind, ActionErrorKind::UnknownVerb);
        assert_eq!(err.raw, "db.drop users");

        let err = parse_action("   ").unwrap_err();
        assert_eq!(err.kind, ActionErrorKind::UnknownVerb);
    }

    #[test]
    fn arity_is_enforced_per_verb() {
        for raw in [
            "api.expose GET",
            "api.expose GET /a /b",
            "db.create",
            "db.create a b",
            "db.add_column users email",
            "rest.call https://example.com",
            "file.create",
        ] {
            let err = parse_action(raw).unwrap_err();
            assert_eq!(err.kind, ActionErrorKind::ArityMismatch, "{}", raw);
        }
    }

    #[test]
    fn invalid_arguments_are_reported() {
        for raw in [
            "api.expose FETCH /users",
            "api.expose GET users",
            "db.create 1users",
            "db.create user-table",
            "db.add_column users e-mail string",
            "db.add_column users email varchar(",
            "rest.call SEND https://example.com",
        ] {
            let err = parse_action(raw).unwrap_err();
            assert_eq!(err.kind, ActionErrorKind::InvalidArgument, "{}", raw);
            assert!(!err.reason.is_empty());
        }
    }

    #[test]
    fn errors_aggregate_across_a_list() {
        let results = parse_actions(["db.create users", "nope", "api.expose GET x"]);
        assert!(results[0].is_ok());
        assert_eq!(
            results[1].as_ref().unwrap_err().kind,
            ActionErrorKind::UnknownVerb
        );
        assert_eq!(
            results[2].as_ref().unwrap_err().kind,
            ActionErrorKind::InvalidArgument
        );
    }

    #[test]
    fn display_round_trips_through_the_parser() {
        for raw in [
            "api.expose PATCH /users/{id}",
            "db.add_column orders total decimal(10,2)",
            "shell.exec ls -la /tmp",
            "shell.exec",
            "rest.call GET http://localhost:8000/health",
        ] {
            let action = parse_action(raw).unwrap();
            assert_eq!(action.to_string(), raw);
            assert_eq!(parse_action(&action.to_string()).unwrap(), action);
        }
    }

    #[test]
    fn column_types_map_to_sql() {
        assert_eq!(
            ColumnType::new("string").unwrap().sql_type().as_deref(),
            Some("TEXT")
        );
        assert_eq!(
            ColumnType::new("varchar(64)").unwrap().sql_type().as_deref(),
            Some("VARCHAR(64)")
        );
        assert_eq!(ColumnType::new("geometry").unwrap().sql_type(), None);
    }

    #[test]
    fn ddl_for_schema_actions() {
        let create = parse_action("db.create users").unwrap();
        assert_eq!(
            create.ddl().as_deref(),
            Some("CREATE TABLE users (id INTEGER PRIMARY KEY);")
        );
        let add = parse_action("db.add_column users email string").unwrap();
        assert_eq!(
            add.ddl().as_deref(),
            Some("ALTER TABLE users ADD COLUMN email TEXT;")
        );
        assert_eq!(parse_action("file.create a.txt").unwrap().ddl(), None);
    }

    #[test]
    fn validated_newtypes_reject_bad_input_on_deserialize() {
        let bad = serde_json::json!({"verb": "db.create", "table": "drop table;"});
        assert!(serde_json::from_value::<Action>(bad).is_err());

        let good = serde_json::json!({"verb": "api.expose", "method": "GET", "path": "/ping"});
        let action: Action = serde_json::from_value(good).unwrap();
        assert_eq!(action.to_string(), "api.expose GET /ping");
    }

    #[test]
    fn handler_names_are_identifier_safe() {
        assert_eq!(EndpointPath::new("/").unwrap().handler_name(), "root");
        assert_eq!(
            EndpointPath::new("/users/{id}").unwrap().handler_name(),
            "users__id"
        );
    }
}
