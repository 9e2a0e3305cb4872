//! Approval and execution for amen intents.
//!
//! - [`gate`]: the AMEN gate, the only way an intent becomes Approved.
//! - [`executor`]: runs approved actions sequentially against [`adapter`]
//!   backends.
//! - [`session`]: [`IntentHandle`] for shared intents and the [`Engine`]
//!   facade that also writes the audit trail.

pub mod adapter;
pub mod executor;
pub mod gate;
pub mod session;

pub use adapter::{
    Backends, HttpClient, HttpResponse, LocalWorkspace, ProcessOutput, ProcessRequest,
    ProcessSpawner, ReqwestHttpClient, TokioProcessSpawner, Workspace,
};
pub use executor::{ExecuteOptions, Executor};
pub use gate::{AmenGate, Confirmer, StaticConfirmer};
pub use session::{Engine, IntentHandle};
