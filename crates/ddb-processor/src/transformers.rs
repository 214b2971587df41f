//! Global-id rendering for the two handlers that merge a broadcast's
//! per-session replies, grounded in the never-upstreamed
//! `ThreadInfoTransformer`/`ProcessReadableTransformer` referenced (but not
//! defined) by `cmd_processor.py`'s import list: both rewrite every
//! session-local `id` field in a merged payload to its global form before
//! rendering, since a broadcast command's raw replies are meaningless to a
//! user who only ever sees global ids.
//!
//! [`ddb_tracker::ResponseTransformer`] is a synchronous trait (it's stored
//! alongside a command's fan-in record, not invoked from async code), so
//! the id resolution these two need — an async state-manager round trip —
//! can't happen inside a trait impl of it. Handlers that need this render
//! their own text directly from the collected responses instead of going
//! through that trait; [`NullTransformer`] is what gets registered with
//! the tracker for those commands, since nothing reads it back out.

use ddb_mi::SessionResponse;
use ddb_prelude::{LocalTgid, LocalTid};
use ddb_state::{StateManager, StateResult};
use ddb_tracker::ResponseTransformer;

/// Discards every response; used where a handler renders its own output
/// from the collected responses rather than through the tracker's stored
/// transformer (`NullTransformer` in the original).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransformer;

impl ResponseTransformer for NullTransformer {
    fn transform(&self, _responses: &[SessionResponse]) -> String {
        String::new()
    }
}

/// Renders a broadcast `-thread-info`'s merged replies with every local
/// thread id rewritten to its `<giid>.<ordinal>` global form, one line per
/// thread across every session that answered.
pub async fn render_thread_info(state: &StateManager, responses: &[SessionResponse]) -> StateResult<String> {
    let mut lines = Vec::new();
    for resp in responses {
        let Some(threads) = resp.payload.get("threads").and_then(ddb_mi::MiValue::as_list) else {
            continue;
        };
        for thread in threads {
            let Some(map) = thread.as_map() else { continue };
            let Some(local_id) = map.get("id").and_then(ddb_mi::MiValue::as_str) else {
                continue;
            };
            let Ok(tid) = local_id.parse::<u64>() else { continue };
            let global = state.get_readable_gtid(resp.sid, LocalTid(tid)).await?;
            let state_str = map.get("state").and_then(ddb_mi::MiValue::as_str).unwrap_or("unknown");
            lines.push(format!("{global} [session {}]: {state_str}", resp.sid));
        }
    }
    Ok(lines.join("\n"))
}

/// Renders a broadcast `-list-thread-groups`'s merged replies with every
/// local inferior id rewritten to its global id.
pub async fn render_thread_groups(state: &StateManager, responses: &[SessionResponse]) -> StateResult<String> {
    let mut lines = Vec::new();
    for resp in responses {
        let Some(groups) = resp.payload.get("groups").and_then(ddb_mi::MiValue::as_list) else {
            continue;
        };
        for group in groups {
            let Some(map) = group.as_map() else { continue };
            let Some(local_id) = map.get("id").and_then(ddb_mi::MiValue::as_str) else {
                continue;
            };
            let digits = local_id.strip_prefix('i').unwrap_or(local_id);
            let Ok(tgid) = digits.parse::<u64>() else { continue };
            let giid = state.get_giid(resp.sid, LocalTgid(tgid)).await?;
            let pid = map.get("pid").and_then(ddb_mi::MiValue::as_str).unwrap_or("?");
            lines.push(format!("i{giid} [session {}]: pid {pid}", resp.sid));
        }
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddb_mi::{MiRecordKind, MiValue, Stream};
    use ddb_prelude::{LocalTgid, Sid};
    use indexmap::IndexMap;

    fn response(sid: Sid, payload: IndexMap<String, MiValue>) -> SessionResponse {
        SessionResponse {
            sid,
            tag: "tag".to_owned(),
            token: None,
            kind: MiRecordKind::Result,
            message: Some("done".to_owned()),
            payload,
            stream: Stream::Stdout,
        }
    }

    #[tokio::test]
    async fn thread_info_render_resolves_local_ids_to_global_form() {
        let state = StateManager::new();
        let sid = Sid(1);
        state.register_session(sid, "tag").await;
        let tgid = LocalTgid(1);
        state.add_thread_group(sid, tgid).await.unwrap();
        state.create_thread(sid, LocalTid(1), tgid).await.unwrap();

        let mut thread = IndexMap::new();
        thread.insert("id".to_owned(), MiValue::String("1".to_owned()));
        thread.insert("state".to_owned(), MiValue::String("running".to_owned()));
        let mut payload = IndexMap::new();
        payload.insert("threads".to_owned(), MiValue::List(vec![MiValue::Map(thread)]));

        let rendered = render_thread_info(&state, &[response(sid, payload)]).await.unwrap();
        assert!(rendered.contains("1.1"));
        assert!(rendered.contains("running"));
    }

    #[tokio::test]
    async fn thread_groups_render_resolves_local_group_ids_to_global_form() {
        let state = StateManager::new();
        let sid = Sid(1);
        state.register_session(sid, "tag").await;
        let tgid = LocalTgid(1);
        state.add_thread_group(sid, tgid).await.unwrap();
        state.start_thread_group(sid, tgid, 4242).await.unwrap();

        let mut group = IndexMap::new();
        group.insert("id".to_owned(), MiValue::String("i1".to_owned()));
        group.insert("pid".to_owned(), MiValue::String("4242".to_owned()));
        let mut payload = IndexMap::new();
        payload.insert("groups".to_owned(), MiValue::List(vec![MiValue::Map(group)]));

        let rendered = render_thread_groups(&state, &[response(sid, payload)]).await.unwrap();
        assert!(rendered.contains("i1"));
        assert!(rendered.contains("4242"));
    }
}
