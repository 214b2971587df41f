//! Session construction, concurrent startup, discovery-driven growth, and
//! shutdown: the crate that ties every other `ddb-*` crate together into a
//! running fleet of debugger sessions, grounded in
//! `original_source/ddb/python/iddb/gdb_manager.py`'s `GdbManager`.

mod error;
mod orchestrator;
mod repl;
mod session_builder;

pub use error::{OrchestratorError, OrchestratorResult};
pub use orchestrator::Orchestrator;
pub use repl::ReplEvent;
