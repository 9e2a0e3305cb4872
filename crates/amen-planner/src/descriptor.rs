//! Container build descriptors.

use crate::codegen::{app_port, slug};
use amen_core::{BuildDescriptor, Intent};

pub const DOCKERFILE: &str = "Dockerfile";

/// Dockerfile for container runtimes, `None` for `local`.
pub fn build_descriptor(intent: &Intent) -> Option<BuildDescriptor> {
    if !intent.environment().runtime.uses_container() {
        return None;
    }
    Some(BuildDescriptor {
        file_name: DOCKERFILE.to_string(),
        contents: dockerfile(intent),
    })
}

/// Image tag used when building the container: `<prefix>-<name>:latest`.
pub fn image_tag(prefix: &str, intent: &Intent) -> String {
    format!("{}-{}:latest", prefix, slug(intent.name()))
}

/// Name of the container started from the image: `<prefix>-<name>-<id>`.
pub fn container_name(prefix: &str, intent: &Intent) -> String {
    format!("{}-{}-{}", prefix, slug(intent.name()), intent.id())
}

fn dockerfile(intent: &Intent) -> String {
    let env = intent.environment();
    let imp = intent.implementation();
    let port = app_port(intent);

    let mut lines = vec![
        format!("# Dockerfile for: {}", one_line(intent.name())),
        format!("FROM {}", one_line(&env.base_image)),
        String::new(),
        "WORKDIR /app".to_string(),
        String::new(),
    ];

    for (key, value) in &env.env_vars {
        lines.push(format!("ENV {}={:?}", one_line(key), value));
    }
    if !env.env_vars.is_empty() {
        lines.push(String::new());
    }

    let cmd = match imp.language.as_str() {
        "python" => {
            let mut deps: Vec<&str> = Vec::new();
            if imp.framework.as_deref() == Some("fastapi") {
                deps.push("uvicorn");
            }
            if let Some(framework) = imp.framework.as_deref() {
                deps.push(framework);
            }
            if !deps.is_empty() {
                lines.push(format!("RUN pip install --no-cache-dir {}", deps.join(" ")));
                lines.push(String::new());
            }
            lines.push("COPY app.py .".to_string());
            Some(r#"CMD ["python", "app.py"]"#)
        }
        "node" => {
            lines.extend([
                "COPY package*.json ./".to_string(),
                "RUN npm install".to_string(),
                String::new(),
                "COPY . .".to_string(),
            ]);
            Some(r#"CMD ["node", "app.js"]"#)
        }
        _ => {
            lines.push("COPY . .".to_string());
            None
        }
    };

    for volume in &env.volumes {
        let target = volume.rsplit(':').next().unwrap_or(volume);
        lines.push(format!("VOLUME {}", one_line(target)));
    }

    lines.push(String::new());
    lines.push(format!("EXPOSE {}", port));
    for extra in env.ports.iter().filter(|p| **p != port) {
        lines.push(format!("EXPOSE {}", extra));
    }

    if let Some(cmd) = cmd {
        lines.push(String::new());
        lines.push(cmd.to_string());
    }
    lines.join("\n") + "\n"
}

/// Each value must stay on its own instruction line.
fn one_line(value: &str) -> String {
    value.replace(['\n', '\r'], " ")
}
