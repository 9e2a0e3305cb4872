//! Intent DSL parser.
//!
//! An intent document is YAML with four sections:
//!
//! ```yaml
//! INTENT:
//!   name: user-service
//!   goal: Expose a user API
//! ENVIRONMENT:
//!   runtime: docker          # docker | kubernetes | local
//!   base_image: python:3.12-slim
//!   ports: [8000]
//! IMPLEMENTATION:
//!   language: python
//!   framework: fastapi
//!   actions:
//!     - db.create users
//!     - api.expose GET /users
//! EXECUTION:
//!   mode: dry-run            # dry-run | live
//! ```
//!
//! Only `INTENT.name` and `INTENT.goal` are required. Everything else falls back
//! to a default, with a warning when a value was present but unusable.
//! Malformed actions are reported and left out of the intent.

pub mod error;
pub mod parser;

pub use error::{DslError, ParseDiagnostic};
pub use parser::{DslParser, ParsedIntent, parse_dsl};
