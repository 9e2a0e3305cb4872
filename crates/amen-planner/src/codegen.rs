//! Application source generation.
//!
//! Generators exist for `python` (fastapi, flask, plain script) and `node`
//! (express, plain script). Every endpoint declared with `api.expose` becomes a
//! stub handler; schema actions are embedded as a `SCHEMA` constant holding
//! their DDL.

use amen_core::{Action, GeneratedCode, GeneratedFile, HttpMethod, Intent};
use std::collections::HashSet;

pub const DEFAULT_APP_PORT: u16 = 8000;

/// Languages with a code generator.
pub const SUPPORTED_LANGUAGES: [&str; 2] = ["python", "node"];

/// Frameworks with a dedicated generator, and the language each requires.
pub const FRAMEWORKS: [(&str, &str); 3] =
    [("fastapi", "python"), ("flask", "python"), ("express", "node")];

/// Language a known framework requires.
pub fn framework_language(framework: &str) -> Option<&'static str> {
    FRAMEWORKS
        .iter()
        .find(|(fw, _)| *fw == framework)
        .map(|(_, lang)| *lang)
}

/// Port the generated application listens on.
pub fn app_port(intent: &Intent) -> u16 {
    intent
        .environment()
        .ports
        .first()
        .copied()
        .unwrap_or(DEFAULT_APP_PORT)
}

/// Generate source for the intent, `None` for unsupported languages.
pub fn generate(intent: &Intent) -> Option<GeneratedCode> {
    let imp = intent.implementation();
    let framework = imp.framework.as_deref();
    let ctx = Context::new(intent);

    match imp.language.as_str() {
        "python" => {
            let source = match framework {
                Some("fastapi") => fastapi(&ctx),
                Some("flask") => flask(&ctx),
                _ => plain_python(&ctx),
            };
            Some(GeneratedCode {
                file_name: "app.py".to_string(),
                language: "python".to_string(),
                source,
                manifest: None,
            })
        }
        "node" => {
            let express = framework == Some("express");
            let source = if express {
                express_app(&ctx)
            } else {
                plain_node(&ctx)
            };
            Some(GeneratedCode {
                file_name: "app.js".to_string(),
                language: "node".to_string(),
                source,
                manifest: Some(package_json(&ctx, express)),
            })
        }
        _ => None,
    }
}

struct Endpoint {
    method: HttpMethod,
    path: String,
    handler: String,
}

struct Context {
    name: String,
    goal: String,
    port: u16,
    endpoints: Vec<Endpoint>,
    ddl: Vec<String>,
}

impl Context {
    fn new(intent: &Intent) -> Self {
        let mut seen = HashSet::new();
        let mut endpoints = Vec::new();
        let mut ddl = Vec::new();

        for action in intent.actions() {
            if let Action::ApiExpose { method, path } = action {
                if seen.insert((*method, path.as_str().to_string())) {
                    endpoints.push(Endpoint {
                        method: *method,
                        path: path.as_str().to_string(),
                        handler: format!(
                            "{}_{}",
                            method.as_str().to_ascii_lowercase(),
                            path.handler_name()
                        ),
                    });
                }
            }
            if let Some(statement) = action.ddl() {
                ddl.push(statement);
            }
        }

        Self {
            name: intent.name().to_string(),
            goal: intent.goal().to_string(),
            port: app_port(intent),
            endpoints,
            ddl,
        }
    }
}

/// Double-quoted string literal valid in both Python and JavaScript.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Single-line comment text.
fn comment(s: &str) -> String {
    s.replace(['\n', '\r'], " ")
}

fn python_schema(ctx: &Context, lines: &mut Vec<String>) {
    if ctx.ddl.is_empty() {
        return;
    }
    lines.push("SCHEMA = \"\"\"".to_string());
    lines.extend(ctx.ddl.iter().cloned());
    lines.push("\"\"\"".to_string());
    lines.push(String::new());
}

fn fastapi(ctx: &Context) -> String {
    let mut lines = vec![
        "from fastapi import FastAPI".to_string(),
        "import uvicorn".to_string(),
        String::new(),
        format!(
            "app = FastAPI(title={}, description={})",
            quote(&ctx.name),
            quote(&ctx.goal)
        ),
        String::new(),
    ];
    python_schema(ctx, &mut lines);

    for ep in &ctx.endpoints {
        lines.extend([
            format!(
                "@app.{}({})",
                ep.method.as_str().to_ascii_lowercase(),
                quote(&ep.path)
            ),
            format!("async def {}():", ep.handler),
            format!(
                "    return {{\"status\": \"ok\", \"endpoint\": {}, \"method\": \"{}\"}}",
                quote(&ep.path),
                ep.method
            ),
            String::new(),
        ]);
    }

    lines.extend([
        String::new(),
        "if __name__ == \"__main__\":".to_string(),
        format!("    uvicorn.run(app, host=\"0.0.0.0\", port={})", ctx.port),
    ]);
    lines.join("\n") + "\n"
}

fn flask(ctx: &Context) -> String {
    let mut lines = vec![
        "from flask import Flask, jsonify".to_string(),
        String::new(),
        "app = Flask(__name__)".to_string(),
        String::new(),
    ];
    python_schema(ctx, &mut lines);

    for ep in &ctx.endpoints {
        lines.extend([
            format!(
                "@app.route({}, methods=[\"{}\"])",
                quote(&ep.path),
                ep.method
            ),
            format!("def {}():", ep.handler),
            format!(
                "    return jsonify({{\"status\": \"ok\", \"endpoint\": {}}})",
                quote(&ep.path)
            ),
            String::new(),
        ]);
    }

    lines.extend([
        "if __name__ == \"__main__\":".to_string(),
        format!("    app.run(host=\"0.0.0.0\", port={})", ctx.port),
    ]);
    lines.join("\n") + "\n"
}

fn plain_python(ctx: &Context) -> String {
    let mut lines = vec![
        "#!/usr/bin/env python3".to_string(),
        format!("# Generated for: {}", comment(&ctx.name)),
        format!("# Goal: {}", comment(&ctx.goal)),
        String::new(),
    ];
    python_schema(ctx, &mut lines);

    lines.push("ENDPOINTS = [".to_string());
    for ep in &ctx.endpoints {
        lines.push(format!("    (\"{}\", {}),", ep.method, quote(&ep.path)));
    }
    lines.extend([
        "]".to_string(),
        String::new(),
        String::new(),
        "def main():".to_string(),
        format!("    print({})", quote(&format!("Intent: {}", ctx.name))),
        format!("    print({})", quote(&format!("Goal: {}", ctx.goal))),
        "    for method, path in ENDPOINTS:".to_string(),
        "        print(f\"{method} {path}\")".to_string(),
        String::new(),
        String::new(),
        "if __name__ == \"__main__\":".to_string(),
        "    main()".to_string(),
    ]);
    lines.join("\n") + "\n"
}

fn node_schema(ctx: &Context, lines: &mut Vec<String>) {
    if ctx.ddl.is_empty() {
        return;
    }
    lines.push("const SCHEMA = [".to_string());
    for statement in &ctx.ddl {
        lines.push(format!("    {},", quote(statement)));
    }
    lines.push("].join(\"\\n\");".to_string());
    lines.push(String::new());
}

fn express_app(ctx: &Context) -> String {
    let mut lines = vec![
        "const express = require(\"express\");".to_string(),
        "const app = express();".to_string(),
        String::new(),
        "app.use(express.json());".to_string(),
        String::new(),
    ];
    node_schema(ctx, &mut lines);

    for ep in &ctx.endpoints {
        lines.extend([
            format!(
                "app.{}({}, (req, res) => {{",
                ep.method.as_str().to_ascii_lowercase(),
                quote(&ep.path)
            ),
            format!(
                "    res.json({{ status: \"ok\", endpoint: {}, method: \"{}\" }});",
                quote(&ep.path),
                ep.method
            ),
            "});".to_string(),
            String::new(),
        ]);
    }

    lines.extend([
        format!("const PORT = process.env.PORT || {};", ctx.port),
        "app.listen(PORT, () => {".to_string(),
        format!(
            "    console.log({} + PORT);",
            quote(&format!("{} running on port ", ctx.name))
        ),
        "});".to_string(),
    ]);
    lines.join("\n") + "\n"
}

fn plain_node(ctx: &Context) -> String {
    let mut lines = vec![
        format!("// Generated for: {}", comment(&ctx.name)),
        format!("// Goal: {}", comment(&ctx.goal)),
        String::new(),
    ];
    node_schema(ctx, &mut lines);
    lines.extend([
        format!("console.log({});", quote(&format!("Intent: {}", ctx.name))),
        format!("console.log({});", quote(&format!("Goal: {}", ctx.goal))),
    ]);
    for ep in &ctx.endpoints {
        lines.push(format!(
            "console.log({});",
            quote(&format!("{} {}", ep.method, ep.path))
        ));
    }
    lines.join("\n") + "\n"
}

/// npm package name derived from the intent name.
pub fn slug(name: &str) -> String {
    let mut out = String::new();
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let out = out.trim_matches('-').to_string();
    if out.is_empty() { "app".to_string() } else { out }
}

fn package_json(ctx: &Context, express: bool) -> GeneratedFile {
    let dependencies = if express {
        "{\n    \"express\": \"^4.18.0\"\n  }"
    } else {
        "{}"
    };
    let contents = format!(
        "{{\n  \"name\": \"{}\",\n  \"version\": \"1.0.0\",\n  \"main\": \"app.js\",\n  \"scripts\": {{\n    \"start\": \"node app.js\"\n  }},\n  \"dependencies\": {}\n}}\n",
        slug(&ctx.name),
        dependencies
    );
    GeneratedFile {
        file_name: "package.json".to_string(),
        contents,
    }
}
