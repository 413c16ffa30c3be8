//! OVSDB JSON-RPC 1.0 session and value decoding.
//!
//! OVSDB frames messages as a bare stream of JSON objects with no length
//! prefix or delimiter. [`Framer`] finds where each top-level value ends
//! with a bracket-depth scan that resumes where the previous read stopped,
//! and only then hands the complete value to `serde_json`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, UnixStream};
use tracing::debug;

use crate::errors::BackendError;

/// Byte stream a session runs over.
pub(super) trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, Serialize)]
struct Request<'a> {
    method: &'a str,
    params: Value,
    id: Value,
}

#[derive(Debug, Serialize)]
struct Reply {
    result: Value,
    error: Value,
    id: Value,
}

/// Any message from the server: a reply to one of our requests, or a
/// request of its own (`echo`, `update`).
#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Value,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Value,
    #[serde(default)]
    id: Value,
}

/// One JSON-RPC connection to an ovsdb-server.
pub(super) struct Session {
    stream: Box<dyn Transport>,
    framer: Framer,
    next_id: u64,
}

impl Session {
    pub(super) fn new(stream: Box<dyn Transport>) -> Self {
        Self {
            stream,
            framer: Framer::default(),
            next_id: 0,
        }
    }

    /// Open a session to `unix:<path>` or `tcp:<host>:<port>`.
    pub(super) async fn dial(remote: &str) -> Result<Self, BackendError> {
        let stream: Box<dyn Transport> = if let Some(path) = remote.strip_prefix("unix:") {
            Box::new(UnixStream::connect(path).await?)
        } else if let Some(addr) = remote.strip_prefix("tcp:") {
            Box::new(TcpStream::connect(addr).await?)
        } else {
            return Err(BackendError::UnsupportedRemote(remote.to_string()));
        };
        Ok(Self::new(stream))
    }

    /// Send a request and wait for its reply, answering `echo` probes from
    /// the server while waiting.
    pub(super) async fn call(&mut self, method: &str, params: Value) -> Result<Value, BackendError> {
        let id = self.next_id;
        self.next_id += 1;

        self.send(&Request {
            method,
            params,
            id: Value::from(id),
        })
        .await?;

        loop {
            let message: Message = serde_json::from_value(self.receive().await?)?;

            if message.method.as_deref() == Some("echo") {
                self.send(&Reply {
                    result: message.params,
                    error: Value::Null,
                    id: message.id,
                })
                .await?;
                continue;
            }

            if message.id.as_u64() != Some(id) {
                debug!(target: "ovn.connection", method = %method, "Ignoring unrelated message");
                continue;
            }

            if !message.error.is_null() {
                return Err(BackendError::Rpc(message.error.to_string()));
            }
            return Ok(message.result);
        }
    }

    async fn send<T: Serialize>(&mut self, message: &T) -> Result<(), BackendError> {
        let bytes = serde_json::to_vec(message)?;
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn receive(&mut self) -> Result<Value, BackendError> {
        loop {
            if let Some(message) = self.framer.next_message()? {
                return Ok(message);
            }

            let mut chunk = [0u8; READ_CHUNK];
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(BackendError::Transport(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "ovsdb-server closed the connection",
                )));
            }
            self.framer.extend(chunk.get(..n).unwrap_or_default());
        }
    }
}

/// Splits the server's byte stream into top-level JSON values.
///
/// Scan state (position, bracket depth, string and escape flags) survives
/// between reads, so every byte is examined once however many reads a
/// value spans.
#[derive(Debug, Default)]
pub(super) struct Framer {
    buffer: Vec<u8>,
    scanned: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl Framer {
    pub(super) fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Pop the next complete value, or `Ok(None)` if the buffer ends
    /// mid-value.
    pub(super) fn next_message(&mut self) -> Result<Option<Value>, BackendError> {
        while let Some(&byte) = self.buffer.get(self.scanned) {
            self.scanned += 1;

            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if byte == b'\\' {
                    self.escaped = true;
                } else if byte == b'"' {
                    self.in_string = false;
                }
                continue;
            }

            match byte {
                b'{' | b'[' => self.depth += 1,
                b'}' | b']' if self.depth > 0 => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        return self.complete().map(Some);
                    }
                }
                b'"' if self.depth > 0 => self.in_string = true,
                _ if self.depth > 0 || byte.is_ascii_whitespace() => {}
                _ => {
                    self.reset();
                    return Err(BackendError::Malformed(format!(
                        "unexpected byte {byte:#04x} between messages"
                    )));
                }
            }
        }
        Ok(None)
    }

    fn complete(&mut self) -> Result<Value, BackendError> {
        let end = self.scanned;
        let parsed = serde_json::from_slice::<Value>(self.buffer.get(..end).unwrap_or_default());
        self.buffer.drain(..end);
        self.scanned = 0;
        parsed.map_err(|e| {
            self.reset();
            e.into()
        })
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Parameters of a `transact` holding one `select` of every row.
pub(super) fn select_params(database: &str, table: &str, columns: &[&str]) -> Value {
    json!([
        database,
        { "op": "select", "table": table, "where": [], "columns": columns }
    ])
}

/// Rows of the single `select` in a `transact` reply.
pub(super) fn select_rows(result: Value) -> Result<Vec<Map<String, Value>>, BackendError> {
    let Value::Array(operations) = result else {
        return Err(BackendError::Malformed("transact result is not an array".into()));
    };
    let Some(Value::Object(mut operation)) = operations.into_iter().next() else {
        return Err(BackendError::Malformed("transact result is empty".into()));
    };

    if let Some(err) = operation.get("error").filter(|e| !e.is_null()) {
        let details = operation
            .get("details")
            .and_then(Value::as_str)
            .unwrap_or_default();
        return Err(BackendError::Rpc(format!("{err} {details}").trim().to_string()));
    }

    match operation.remove("rows") {
        Some(Value::Array(rows)) => Ok(rows
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect()),
        _ => Err(BackendError::Malformed("select result has no rows".into())),
    }
}

/// Members of an OVSDB set. A bare atom is a set of one.
pub(super) fn set_members(value: &Value) -> Vec<&Value> {
    match value.as_array().map(Vec::as_slice) {
        Some([Value::String(tag), Value::Array(items)]) if tag == "set" => items.iter().collect(),
        _ => vec![value],
    }
}

/// An atom rendered as a label string: strings as-is, `["uuid", id]` as
/// the id, numbers and booleans in decimal.
pub(super) fn atom_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => match items.as_slice() {
            [Value::String(tag), Value::String(id)] if tag == "uuid" || tag == "named-uuid" => {
                id.clone()
            }
            _ => String::new(),
        },
        _ => String::new(),
    }
}

/// String members of a set column, e.g. `addresses` or `ports`.
pub(super) fn string_set(value: &Value) -> Vec<String> {
    set_members(value)
        .into_iter()
        .map(atom_string)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Value of an optional (0-or-1) column, empty when unset.
pub(super) fn optional_string(value: &Value) -> String {
    string_set(value).into_iter().next().unwrap_or_default()
}

/// An OVSDB map `["map", [[k, v], ..]]`.
pub(super) fn string_map(value: &Value) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    if let Some([Value::String(tag), Value::Array(pairs)]) = value.as_array().map(Vec::as_slice) {
        if tag == "map" {
            for pair in pairs {
                if let Some([k, v]) = pair.as_array().map(Vec::as_slice) {
                    map.insert(atom_string(k), atom_string(v));
                }
            }
        }
    }
    map
}

/// Integer column, 0 when unset or not a number.
pub(super) fn integer(value: &Value) -> u64 {
    set_members(value)
        .into_iter()
        .next()
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

/// Column accessor over a row.
pub(super) fn column<'a>(row: &'a Map<String, Value>, name: &str) -> &'a Value {
    row.get(name).unwrap_or(&Value::Null)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_POLL_TIMEOUT_SECONDS;
    use tokio::io::{duplex, DuplexStream};

    async fn read_message(stream: &mut DuplexStream, framer: &mut Framer) -> Value {
        loop {
            if let Some(message) = framer.next_message().unwrap() {
                return message;
            }
            let mut chunk = [0u8; 1024];
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client hung up");
            framer.extend(chunk.get(..n).unwrap());
        }
    }

    #[test]
    fn test_framer_handles_partial_and_concatenated() {
        let mut framer = Framer::default();
        framer.extend(br#"{"id":1,"result":[]}{"id":2,"res"#);

        let first = framer.next_message().unwrap().unwrap();
        assert_eq!(first["id"], 1);
        assert!(framer.next_message().unwrap().is_none());

        framer.extend(br#"ult":null}"#);
        let second = framer.next_message().unwrap().unwrap();
        assert_eq!(second["id"], 2);
        assert!(framer.buffer.is_empty());
    }

    #[test]
    fn test_framer_ignores_brackets_inside_strings() {
        let mut framer = Framer::default();
        framer.extend(br#" {"error":"bad } \" ] {","id":3}"#);
        framer.extend(b"\n");

        let message = framer.next_message().unwrap().unwrap();
        assert_eq!(message["id"], 3);
        assert_eq!(message["error"], r#"bad } " ] {"#);
        assert!(framer.next_message().unwrap().is_none());
    }

    #[test]
    fn test_framer_rejects_garbage() {
        let mut framer = Framer::default();
        framer.extend(b"}}");
        assert!(matches!(
            framer.next_message(),
            Err(BackendError::Malformed(_))
        ));

        framer.extend(br#"{"id":[}]"#);
        assert!(matches!(
            framer.next_message(),
            Err(BackendError::Malformed(_))
        ));
        assert!(framer.buffer.is_empty());
    }

    #[test]
    fn test_framer_large_reply_scans_each_byte_once() {
        let rows: Vec<Value> = (0..20_000)
            .map(|i| {
                json!({
                    "_uuid": ["uuid", format!("8f3c0a52-0000-4000-8000-{i:012}")],
                    "logical_port": format!("lsp-{i}"),
                    "chassis": ["uuid", "0d5b4c3e-1111-4222-8333-444455556666"],
                    "datapath": ["uuid", "5e6f7a8b-9999-4aaa-8bbb-cccccccccccc"],
                    "tunnel_key": i,
                })
            })
            .collect();
        let reply = serde_json::to_vec(&json!({
            "id": 7,
            "result": [{ "rows": rows }],
            "error": null,
        }))
        .unwrap();
        assert!(reply.len() > 4 * 1024 * 1024);

        let mut framer = Framer::default();
        let started = std::time::Instant::now();
        let mut message = None;
        for chunk in reply.chunks(READ_CHUNK) {
            framer.extend(chunk);
            message = framer.next_message().unwrap();
            if message.is_none() {
                // Nothing before the new bytes is looked at again
                assert_eq!(framer.scanned, framer.buffer.len());
            }
        }
        let elapsed = started.elapsed();

        let message = message.expect("reply should be complete after the last chunk");
        let rows = select_rows(message["result"].clone()).unwrap();
        assert_eq!(rows.len(), 20_000);
        assert!(
            elapsed < std::time::Duration::from_secs(DEFAULT_POLL_TIMEOUT_SECONDS),
            "framing took {elapsed:?}"
        );
    }

    #[test]
    fn test_atom_and_set_decoding() {
        assert_eq!(atom_string(&json!(["uuid", "abc"])), "abc");
        assert_eq!(atom_string(&json!(42)), "42");
        assert_eq!(
            string_set(&json!(["set", [["uuid", "a"], ["uuid", "b"]]])),
            vec!["a".to_string(), "b".to_string()]
        );
        assert_eq!(string_set(&json!("10.0.0.1")), vec!["10.0.0.1".to_string()]);
        assert_eq!(optional_string(&json!(["set", []])), "");
        assert_eq!(integer(&json!(["set", [7]])), 7);
        assert_eq!(integer(&Value::Null), 0);
    }

    #[test]
    fn test_map_decoding() {
        let map = string_map(&json!(["map", [["logical-switch", "ls-1"], ["name", "net"]]]));
        assert_eq!(map.get("logical-switch").map(String::as_str), Some("ls-1"));
        assert_eq!(map.len(), 2);
        assert!(string_map(&json!(["set", []])).is_empty());
    }

    #[test]
    fn test_select_rows_error_and_success() {
        let rows = select_rows(json!([{ "rows": [{ "name": "sw0" }] }])).unwrap();
        assert_eq!(rows.len(), 1);

        let err = select_rows(json!([{ "error": "unknown table", "details": "No table Foo" }]))
            .unwrap_err();
        assert!(matches!(err, BackendError::Rpc(msg) if msg.contains("No table Foo")));

        assert!(matches!(
            select_rows(json!({})),
            Err(BackendError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_call_answers_echo_and_returns_result() {
        let (client, mut server) = duplex(4096);
        let mut session = Session::new(Box::new(client));

        let server_task = tokio::spawn(async move {
            let mut framer = Framer::default();
            let request = read_message(&mut server, &mut framer).await;
            assert_eq!(request["method"], "list_dbs");
            let id = request["id"].clone();

            // Server probes liveness before replying
            server
                .write_all(br#"{"method":"echo","params":["ping"],"id":"echo"}"#)
                .await
                .unwrap();
            let echo_reply = read_message(&mut server, &mut framer).await;
            assert_eq!(echo_reply["id"], "echo");
            assert_eq!(echo_reply["result"], json!(["ping"]));

            let reply = json!({ "id": id, "result": ["OVN_Northbound"], "error": null });
            server
                .write_all(&serde_json::to_vec(&reply).unwrap())
                .await
                .unwrap();
        });

        let result = session.call("list_dbs", json!([])).await.unwrap();
        assert_eq!(result, json!(["OVN_Northbound"]));
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_call_surfaces_rpc_error() {
        let (client, mut server) = duplex(4096);
        let mut session = Session::new(Box::new(client));

        tokio::spawn(async move {
            let mut framer = Framer::default();
            let request = read_message(&mut server, &mut framer).await;
            let reply = json!({ "id": request["id"], "result": null, "error": "unknown method" });
            server
                .write_all(&serde_json::to_vec(&reply).unwrap())
                .await
                .unwrap();
        });

        let err = session.call("bogus", json!([])).await.unwrap_err();
        assert!(matches!(err, BackendError::Rpc(msg) if msg.contains("unknown method")));
    }

    #[tokio::test]
    async fn test_call_reports_closed_connection() {
        let (client, server) = duplex(4096);
        drop(server);
        let mut session = Session::new(Box::new(client));
        let err = session.call("list_dbs", json!([])).await.unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)));
    }

    #[tokio::test]
    async fn test_dial_rejects_unknown_scheme() {
        let result = Session::dial("ssl:10.0.0.1:6641").await;
        assert!(matches!(result, Err(BackendError::UnsupportedRemote(_))));
    }
}
