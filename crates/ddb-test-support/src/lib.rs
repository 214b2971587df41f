//! Shared test fixtures for the `ddb` workspace: a scripted [`Transport`]
//! plus canned GDB/MI output builders ([`fixtures`]), and [`TestFleet`], an
//! end-to-end harness wiring a real router/tracker/state/processor stack to
//! one or more scripted sessions ([`harness`]).

mod fixtures;
mod harness;

pub use fixtures::{
    mi_line, result_done, result_error, stopped_exited, stopped_on_breakpoint, thread_created,
    thread_group_added, ScriptedTransport, WrittenLog,
};
pub use harness::TestFleet;

#[doc(inline)]
pub use ddb_transport::Transport;
