//! Typed GDB/MI records produced by [`crate::MiParser::feed`].

use indexmap::IndexMap;

use crate::value::MiValue;

/// Which stream a raw line was read from. The session reader tags every
/// line it feeds to the parser, matching `fetch_mi_output_async`'s
/// `"stdout"` tag (stderr is supported for completeness and symmetry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    /// The debugger's standard output.
    Stdout,
    /// The debugger's standard error.
    Stderr,
}

/// The record-class sigil GDB/MI prefixes a line with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MiRecordKind {
    /// `^` — a result record, completing a command.
    Result,
    /// `*` — an exec-async record (e.g. `running`, `stopped`).
    Exec,
    /// `=` — a notify-async record (e.g. `thread-created`).
    Notify,
    /// `~` — a console stream record (human-readable text).
    Console,
    /// `@` — a target stream record (inferior's own stdout).
    Output,
    /// `&` — a log stream record (echoes the command sent to GDB).
    Log,
}

impl MiRecordKind {
    /// Whether this record class participates in the notify-record state
    /// machine of spec §4.E (both `*` and `=` classes dispatch through the
    /// same `handle_notify`-equivalent path in the original).
    #[must_use]
    pub fn is_notify_like(self) -> bool {
        matches!(self, Self::Exec | Self::Notify)
    }

    /// Whether this is one of the three stream record classes.
    #[must_use]
    pub fn is_stream(self) -> bool {
        matches!(self, Self::Console | Self::Output | Self::Log)
    }
}

/// One parsed GDB/MI record.
#[derive(Debug, Clone, PartialEq)]
pub struct MiRecord {
    /// The record's class.
    pub kind: MiRecordKind,
    /// The message identifier following the class sigil (`done`, `running`,
    /// `thread-created`, ...). `None` for stream records and for result
    /// records with no message (rare, but the grammar allows a bare `^`).
    pub message: Option<String>,
    /// The parsed key/value payload. For stream records this always holds
    /// exactly one key, `"text"`, mapping to the decoded string content.
    pub payload: IndexMap<String, MiValue>,
    /// The token GDB echoed back, if the originating command carried one.
    pub token: Option<String>,
    /// Which stream this record was read from.
    pub stream: Stream,
}

impl MiRecord {
    /// Convenience accessor for stream records' single `"text"` payload
    /// entry.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.payload.get("text").and_then(MiValue::as_str)
    }
}
