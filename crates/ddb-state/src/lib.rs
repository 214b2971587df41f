#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Cross-session id translation and thread(-group) lifecycle bookkeeping.
//!
//! Grounded in `original_source/py_testing/state_manager.py`'s
//! `StateManager`/`SessionMeta`: the bijections between a session's local
//! thread/thread-group ids and the aggregator's global ones, plus the
//! lifecycle transitions (`thread-group-added`, `thread-created`, ...) the
//! response processor drives.

mod error;
mod manager;
mod meta;

pub use error::{StateError, StateResult};
pub use manager::{StateManager, ThreadContext};
