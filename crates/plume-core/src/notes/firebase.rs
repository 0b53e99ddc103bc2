//! REST + SSE client for the realtime notes tree.
//!
//! The tree is scoped as `users/{uid}/notes/{noteId} -> {id, text}`.
//! Writes go through plain REST calls; the change feed is the store's
//! SSE endpoint (`Accept: text/event-stream`), whose `put`/`patch`
//! events are folded into a local mirror of the collection. Every
//! applied event re-emits the full snapshot, newest-first, matching the
//! full-snapshot listener semantics the rest of the crate expects.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ResolvedRemoteConfig;
use crate::models::{Note, NoteId};
use crate::util::{compact_text, is_http_url};

use super::{ListenerHandle, NotesBackend, StoreError, Subscriber};

/// Wire format of one note under `users/{uid}/notes/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct NoteRecord {
    id: String,
    text: String,
}

/// Realtime-tree REST client.
#[derive(Clone)]
pub struct FirebaseDatabaseClient {
    base_url: String,
    auth_token: Option<String>,
    client: Client,
}

impl FirebaseDatabaseClient {
    pub fn new(url: impl AsRef<str>, auth_token: Option<String>) -> Result<Self, StoreError> {
        let base_url = url.as_ref().trim().trim_end_matches('/').to_string();
        if !is_http_url(&base_url) {
            return Err(StoreError::InvalidConfiguration(
                "database URL must include http:// or https://".to_string(),
            ));
        }

        Ok(Self {
            base_url,
            auth_token: auth_token.filter(|token| !token.trim().is_empty()),
            client: Client::builder()
                .build()
                .map_err(|error| StoreError::Transport(error.to_string()))?,
        })
    }

    /// Build a client from resolved remote configuration, authenticating
    /// with the current provider session token when available.
    pub fn from_config(
        config: &ResolvedRemoteConfig,
        auth_token: Option<String>,
    ) -> Result<Self, StoreError> {
        Self::new(&config.database_url, auth_token)
    }

    fn notes_url(&self, uid: &str) -> String {
        format!("{}/users/{uid}/notes.json", self.base_url)
    }

    fn note_url(&self, uid: &str, id: NoteId) -> String {
        format!("{}/users/{uid}/notes/{id}.json", self.base_url)
    }

    fn with_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.query(&[("auth", token)]),
            None => request,
        }
    }

    async fn send_write(&self, request: RequestBuilder) -> Result<(), StoreError> {
        let response = self
            .with_auth(request)
            .send()
            .await
            .map_err(|error| StoreError::Transport(error.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(parse_store_error(status, &body));
        }

        Ok(())
    }

    async fn stream_notes(&self, uid: &str, subscriber: Subscriber) {
        let request = self
            .with_auth(self.client.get(self.notes_url(uid)))
            .header("Accept", "text/event-stream");

        let response = match request.send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                subscriber.notify_error(format!(
                    "notes stream rejected: HTTP {}",
                    response.status().as_u16()
                ));
                return;
            }
            Err(error) => {
                subscriber.notify_error(format!("notes stream failed: {error}"));
                return;
            }
        };

        let mut tree = BTreeMap::new();
        let mut parser = SseParser::default();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(error) => {
                    // Terminal for this listener; the caller decides
                    // whether to resubscribe.
                    subscriber.notify_error(format!("notes stream interrupted: {error}"));
                    return;
                }
            };

            for event in parser.push_bytes(&chunk) {
                match handle_event(&mut tree, &event) {
                    Ok(true) => subscriber.notify_snapshot(snapshot(&tree)),
                    Ok(false) => {}
                    Err(message) => {
                        subscriber.notify_error(message);
                        return;
                    }
                }
            }
        }

        subscriber.notify_error("notes stream closed by server".to_string());
    }
}

#[async_trait]
impl NotesBackend for FirebaseDatabaseClient {
    fn listen(&self, uid: &str, subscriber: Subscriber) -> ListenerHandle {
        let client = self.clone();
        let uid = uid.to_string();
        let task = tokio::spawn(async move { client.stream_notes(&uid, subscriber).await });
        // Aborting drops the response stream, which releases the remote
        // listener immediately.
        ListenerHandle::new(move || task.abort())
    }

    async fn put_note(&self, uid: &str, note: &Note) -> Result<(), StoreError> {
        let record = NoteRecord {
            id: note.id.as_str(),
            text: note.text.clone(),
        };
        self.send_write(self.client.put(self.note_url(uid, note.id)).json(&record))
            .await
    }

    async fn remove_note(&self, uid: &str, id: NoteId) -> Result<(), StoreError> {
        self.send_write(self.client.delete(self.note_url(uid, id)))
            .await
    }

    async fn remove_all(&self, uid: &str) -> Result<(), StoreError> {
        self.send_write(self.client.delete(self.notes_url(uid)))
            .await
    }
}

/// One parsed server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SseEvent {
    name: String,
    data: String,
}

/// Incremental SSE line parser. Feed raw bytes, get completed events.
#[derive(Debug, Default)]
struct SseParser {
    buffer: String,
    name: Option<String>,
    data: String,
}

impl SseParser {
    fn push_bytes(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            if let Some(event) = self.push_line(line.trim_end_matches(['\r', '\n'])) {
                events.push(event);
            }
        }
        events
    }

    fn push_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            let name = self.name.take()?;
            let data = std::mem::take(&mut self.data);
            return Some(SseEvent { name, data });
        }

        if let Some(name) = line.strip_prefix("event:") {
            self.name = Some(name.trim().to_string());
        } else if let Some(data) = line.strip_prefix("data:") {
            if !self.data.is_empty() {
                self.data.push('\n');
            }
            // At most one leading space separates the field name from
            // its value; further whitespace belongs to the value.
            self.data.push_str(data.strip_prefix(' ').unwrap_or(data));
        }
        // Comment lines and unknown fields are ignored.
        None
    }
}

#[derive(Debug, Deserialize)]
struct ChangePayload {
    path: String,
    data: Value,
}

/// Fold one SSE event into the local tree.
///
/// Returns whether the tree changed, or an error message when the server
/// ended the subscription (`cancel`, `auth_revoked`).
fn handle_event(
    tree: &mut BTreeMap<String, NoteRecord>,
    event: &SseEvent,
) -> Result<bool, String> {
    match event.name.as_str() {
        "put" | "patch" => {
            let payload: ChangePayload = serde_json::from_str(&event.data)
                .map_err(|error| format!("malformed change event: {error}"))?;
            Ok(apply_change(
                tree,
                &payload.path,
                payload.data,
                event.name == "patch",
            ))
        }
        "keep-alive" => Ok(false),
        "cancel" => Err("notes subscription cancelled by server".to_string()),
        "auth_revoked" => Err("notes subscription credential expired".to_string()),
        other => {
            tracing::debug!("ignoring unknown stream event: {other}");
            Ok(false)
        }
    }
}

fn apply_change(
    tree: &mut BTreeMap<String, NoteRecord>,
    path: &str,
    data: Value,
    patch: bool,
) -> bool {
    let mut segments = path.trim_matches('/').split('/').filter(|s| !s.is_empty());

    match segments.next() {
        // Root update: replace (put) or merge (patch) the collection.
        None => {
            if !patch {
                tree.clear();
            }
            merge_children(tree, data);
            true
        }
        Some(key) if segments.next().is_none() => {
            if data.is_null() {
                tree.remove(key);
            } else {
                match serde_json::from_value::<NoteRecord>(data) {
                    Ok(record) => {
                        tree.insert(key.to_string(), record);
                    }
                    Err(error) => {
                        tracing::warn!("skipping malformed note at {path}: {error}");
                        return false;
                    }
                }
            }
            true
        }
        Some(_) => {
            // Field-level updates never happen with whole-note writes.
            tracing::debug!("ignoring deep update at {path}");
            false
        }
    }
}

fn merge_children(tree: &mut BTreeMap<String, NoteRecord>, data: Value) {
    let Value::Object(children) = data else {
        return;
    };
    for (key, value) in children {
        if value.is_null() {
            tree.remove(&key);
            continue;
        }
        match serde_json::from_value::<NoteRecord>(value) {
            Ok(record) => {
                tree.insert(key, record);
            }
            Err(error) => tracing::warn!("skipping malformed note {key}: {error}"),
        }
    }
}

/// Full snapshot, newest-first. Keys are time-ordered ids, so reverse
/// iteration gives reverse-chronological insertion order.
fn snapshot(tree: &BTreeMap<String, NoteRecord>) -> Vec<Note> {
    tree.iter()
        .rev()
        .filter_map(|(key, record)| match key.parse::<NoteId>() {
            Ok(id) => Some(Note::persisted(id, record.text.clone())),
            Err(error) => {
                tracing::warn!("skipping note with malformed key {key}: {error}");
                None
            }
        })
        .collect()
}

fn parse_store_error(status: StatusCode, body: &str) -> StoreError {
    #[derive(Debug, Deserialize)]
    struct ErrorBody {
        error: Option<String>,
    }

    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|payload| payload.error)
        .unwrap_or_else(|| compact_text(body));

    if message.is_empty() {
        StoreError::Api(format!("HTTP {}", status.as_u16()))
    } else {
        StoreError::Api(format!("{} ({})", message.trim(), status.as_u16()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(id: &NoteId, text: &str) -> NoteRecord {
        NoteRecord {
            id: id.as_str(),
            text: text.to_string(),
        }
    }

    #[test]
    fn client_rejects_urls_without_scheme() {
        assert!(FirebaseDatabaseClient::new("plume-demo.example.com", None).is_err());
        assert!(FirebaseDatabaseClient::new("https://plume-demo.example.com/", None).is_ok());
    }

    #[test]
    fn sse_parser_assembles_events_across_chunks() {
        let mut parser = SseParser::default();

        let none = parser.push_bytes(b"event: put\ndata: {\"pa");
        assert_eq!(none, Vec::new());

        let events = parser.push_bytes(b"th\":\"/\",\"data\":null}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "put");
        assert_eq!(events[0].data, r#"{"path":"/","data":null}"#);
    }

    #[test]
    fn sse_parser_ignores_comments_and_blank_keepalives() {
        let mut parser = SseParser::default();
        let events = parser.push_bytes(b": heartbeat\n\nevent: keep-alive\ndata: null\n\n");
        assert_eq!(
            events,
            vec![SseEvent {
                name: "keep-alive".to_string(),
                data: "null".to_string(),
            }]
        );
    }

    #[test]
    fn sse_parser_strips_one_leading_space_from_data() {
        let mut parser = SseParser::default();
        let events = parser.push_bytes(b"event: put\ndata:  padded\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, " padded");

        let events = parser.push_bytes(b"event: put\ndata:unpadded\n\n");
        assert_eq!(events[0].data, "unpadded");
    }

    #[test]
    fn root_put_replaces_the_tree() {
        let mut tree = BTreeMap::new();
        let stale = NoteId::new();
        tree.insert(stale.as_str(), record(&stale, "stale"));

        let id = NoteId::new();
        let data = serde_json::json!({ id.as_str(): { "id": id.as_str(), "text": "fresh" } });
        let changed = apply_change(&mut tree, "/", data, false);

        assert!(changed);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[&id.as_str()].text, "fresh");
    }

    #[test]
    fn root_put_with_null_empties_the_tree() {
        let mut tree = BTreeMap::new();
        let id = NoteId::new();
        tree.insert(id.as_str(), record(&id, "x"));

        assert!(apply_change(&mut tree, "/", Value::Null, false));
        assert!(tree.is_empty());
    }

    #[test]
    fn child_put_inserts_and_null_removes() {
        let mut tree = BTreeMap::new();
        let id = NoteId::new();
        let data = serde_json::json!({ "id": id.as_str(), "text": "x" });

        assert!(apply_change(&mut tree, &format!("/{id}"), data, false));
        assert_eq!(tree[&id.as_str()].text, "x");

        assert!(apply_change(&mut tree, &format!("/{id}"), Value::Null, false));
        assert!(tree.is_empty());
    }

    #[test]
    fn root_patch_merges_children() {
        let mut tree = BTreeMap::new();
        let kept = NoteId::new();
        tree.insert(kept.as_str(), record(&kept, "kept"));

        let added = NoteId::new();
        let data = serde_json::json!({ added.as_str(): { "id": added.as_str(), "text": "added" } });
        assert!(apply_change(&mut tree, "/", data, true));

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[&kept.as_str()].text, "kept");
    }

    #[test]
    fn snapshot_is_newest_first_and_skips_bad_keys() {
        let mut tree = BTreeMap::new();
        let older = NoteId::new();
        let newer = NoteId::new();
        tree.insert(older.as_str(), record(&older, "older"));
        tree.insert(newer.as_str(), record(&newer, "newer"));
        tree.insert("not-a-key".to_string(), record(&older, "bad"));

        let notes = snapshot(&tree);
        assert_eq!(
            notes,
            vec![
                Note::persisted(newer, "newer"),
                Note::persisted(older, "older"),
            ]
        );
    }

    #[test]
    fn cancel_event_is_terminal() {
        let mut tree = BTreeMap::new();
        let event = SseEvent {
            name: "cancel".to_string(),
            data: "null".to_string(),
        };
        assert!(handle_event(&mut tree, &event).is_err());
    }

    #[test]
    fn parse_store_error_prefers_json_message() {
        let error = parse_store_error(StatusCode::UNAUTHORIZED, r#"{"error":"Permission denied"}"#);
        assert_eq!(
            error.to_string(),
            "store API error: Permission denied (401)"
        );
    }
}
