//! A parsed record enriched with the routing metadata every downstream
//! consumer (tracker, router, response processor) needs, grounded in
//! `original_source/ddb/python/iddb/data_struct.py`'s `SessionResponse`.

use ddb_prelude::{Sid, Token};
use indexmap::IndexMap;

use crate::record::{MiRecord, MiRecordKind, Stream};
use crate::value::MiValue;

/// One [`MiRecord`] tagged with which session produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionResponse {
    /// The originating session.
    pub sid: Sid,
    /// The session's human-readable tag (`"<ip>:-<pid>"`), carried so a
    /// transformer can print it without a state-manager round trip.
    pub tag: String,
    /// The echoed command token, if any.
    pub token: Option<Token>,
    /// The record's class.
    pub kind: MiRecordKind,
    /// The message identifier (`done`, `running`, `thread-created`, ...).
    pub message: Option<String>,
    /// The parsed payload.
    pub payload: IndexMap<String, MiValue>,
    /// Which stream the underlying line was read from.
    pub stream: Stream,
}

impl SessionResponse {
    /// Wraps a parsed record with its session's routing metadata.
    #[must_use]
    pub fn new(sid: Sid, tag: impl Into<String>, record: MiRecord) -> Self {
        Self {
            sid,
            tag: tag.into(),
            token: record.token.map(|t| Token::from(t.as_str())),
            kind: record.kind,
            message: record.message,
            payload: record.payload,
            stream: record.stream,
        }
    }

    /// Convenience accessor for stream records' single `"text"` payload
    /// entry.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.payload.get("text").and_then(MiValue::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_a_record_with_session_metadata() {
        let record = MiRecord {
            kind: MiRecordKind::Result,
            message: Some("done".to_owned()),
            payload: IndexMap::new(),
            token: Some("7".to_owned()),
            stream: Stream::Stdout,
        };
        let resp = SessionResponse::new(Sid(1), "10.0.0.1:-1234", record);
        assert_eq!(resp.sid, Sid(1));
        assert_eq!(resp.token, Some(Token::from("7")));
        assert_eq!(resp.message.as_deref(), Some("done"));
    }
}
