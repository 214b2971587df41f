#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Core identifiers, error types and small shared enums for `ddb`.
//!
//! This crate has no dependency on any other `ddb-*` crate; everything
//! downstream (transport, MI parser, state manager, tracker, router,
//! processor, session, orchestrator) builds on the types defined here.

mod error;
mod ids;
mod status;

pub use error::{DdbError, DdbResult};
pub use ids::{Counter, Giid, Gtid, LocalTgid, LocalTid, Sid, Token};
pub use status::{OnExit, SessionState, StartMode, ThreadGroupStatus, ThreadStatus};
