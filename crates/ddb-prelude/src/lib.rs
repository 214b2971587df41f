#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Common re-exports for the `ddb` workspace.
//!
//! Every downstream crate pulls its ids and error type from here instead of
//! depending on `ddb-core` directly, mirroring the teacher workspace's
//! `astrid-prelude` pattern.

pub use ddb_core::{
    Counter, DdbError, DdbResult, Giid, Gtid, LocalTgid, LocalTid, OnExit, SessionState, Sid,
    StartMode, ThreadGroupStatus, ThreadStatus, Token,
};
