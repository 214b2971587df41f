//! Response transformers, grounded in
//! `original_source/ddb/python/iddb/response_transformer.py`.
//!
//! A transformer turns a command's collected [`SessionResponse`]s into the
//! text ultimately printed at the REPL. Handlers in `ddb-processor` that
//! need a different shape (thread-info tables, a remote-backtrace summary)
//! supply their own; everything else uses [`PlainTransformer`].

use ddb_mi::SessionResponse;

/// Renders a completed command's collected responses as REPL output.
pub trait ResponseTransformer: Send + Sync {
    /// Produces the text to print for this command's responses.
    fn transform(&self, responses: &[SessionResponse]) -> String;
}

/// The default transformer: one line per session, echoing its tag,
/// message and payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTransformer;

impl ResponseTransformer for PlainTransformer {
    fn transform(&self, responses: &[SessionResponse]) -> String {
        responses
            .iter()
            .map(|resp| {
                format!(
                    "{} [msg: {}]\n{:?}",
                    resp.tag,
                    resp.message.as_deref().unwrap_or(""),
                    resp.payload
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddb_mi::{MiRecordKind, Stream};
    use ddb_prelude::Sid;
    use indexmap::IndexMap;

    #[test]
    fn plain_transformer_renders_one_line_per_response() {
        let resp = SessionResponse {
            sid: Sid(1),
            tag: "10.0.0.1:-1234".to_owned(),
            token: None,
            kind: MiRecordKind::Result,
            message: Some("done".to_owned()),
            payload: IndexMap::new(),
            stream: Stream::Stdout,
        };
        let out = PlainTransformer.transform(std::slice::from_ref(&resp));
        assert!(out.contains("10.0.0.1:-1234"));
        assert!(out.contains("done"));
    }
}
