//! Stdio transport (newline-delimited JSON)
//!
//! # Protocol
//!
//! Request (one JSON object per line on stdin):
//!   { "id": "<string>", "channel": "<a:b:c>", "sender": "<window id>", "args": <any> }
//!
//! Response (one JSON object per line on stdout):
//!   { "id": "<string>", "ok": true|false, "result": <any>|null, "error": {...}|null }
//!
//! Pushed event (out-of-band, addressed to the calling sender):
//!   { "event": "<name>", "sender": "<window id>", "payload": <any> }
//!
//! stdout is reserved for the protocol; logs must go to stderr.
//! Every request runs on its own task, so calls on the same or different
//! channels overlap freely. A single writer task owns stdout.

use super::{unknown_channel, InboundCall, Listener, ListenerTable, Transport};
use crate::context::{ReplyHandle, SenderId};
use crate::error::{IpcError, IpcResult, TransportError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Sender id used when a request does not name one
pub const DEFAULT_SENDER: &str = "stdio";

// =============================================================================
// Protocol Types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct WireRequest {
    pub id: String,
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireResponse {
    pub id: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<IpcError>,
}

impl WireResponse {
    fn from_result(id: String, result: IpcResult) -> Self {
        match result {
            Ok(value) => Self {
                id,
                ok: true,
                result: Some(value),
                error: None,
            },
            Err(error) => Self::err(id, error),
        }
    }

    fn err(id: String, error: IpcError) -> Self {
        Self {
            id,
            ok: false,
            result: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEvent {
    pub event: String,
    pub sender: String,
    pub payload: Value,
}

// =============================================================================
// Reply Handle
// =============================================================================

struct StdioReply {
    sender: SenderId,
    outbound: mpsc::UnboundedSender<String>,
}

impl ReplyHandle for StdioReply {
    fn emit(&self, event: &str, payload: Value) -> Result<(), TransportError> {
        let line = serde_json::to_string(&WireEvent {
            event: event.to_string(),
            sender: self.sender.to_string(),
            payload,
        })
        .map_err(|e| TransportError::Io(e.into()))?;
        self.outbound.send(line).map_err(|_| TransportError::Closed)
    }
}

// =============================================================================
// Transport
// =============================================================================

#[derive(Clone, Default)]
pub struct StdioTransport {
    listeners: ListenerTable,
}

impl StdioTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve the process's own stdin/stdout until stdin closes
    pub async fn serve_stdio(&self) -> Result<(), TransportError> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve requests read from `reader`, writing responses to `writer`.
    ///
    /// Returns once the reader hits EOF (or fails) and every in-flight call
    /// has been answered. A read failure is reported only after that.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<(), TransportError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound, inbound) = mpsc::unbounded_channel::<String>();
        let writer_task = tokio::spawn(write_lines(writer, inbound));

        let mut in_flight = JoinSet::new();
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        let mut read_error = None;

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(op = "ipc.stdio.read_error", error = %e, "Reading requests failed");
                    read_error = Some(e);
                    break;
                }
            }

            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(op = "ipc.stdio.parse_error", error = %e, "Request line is not UTF-8");
                    send_response(&outbound, parse_error(&format!("Request line is not valid UTF-8: {}", e)));
                    continue;
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let req: WireRequest = match serde_json::from_str(trimmed) {
                Ok(r) => r,
                Err(e) => {
                    // Can't correlate to an ID, answer with an empty one
                    tracing::warn!(op = "ipc.stdio.parse_error", error = %e, "Invalid request line");
                    send_response(&outbound, parse_error(&format!("Invalid JSON request: {}", e)));
                    continue;
                }
            };

            tracing::debug!(op = "ipc.stdio.dispatch", id = %req.id, channel = %req.channel, "Dispatching");

            let Some(listener) = self.listeners.get(&req.channel) else {
                send_response(&outbound, WireResponse::err(req.id, unknown_channel(&req.channel)));
                continue;
            };

            let sender = SenderId::new(req.sender.unwrap_or_else(|| DEFAULT_SENDER.to_string()));
            let reply = Arc::new(StdioReply {
                sender: sender.clone(),
                outbound: outbound.clone(),
            });
            let outbound = outbound.clone();

            in_flight.spawn(async move {
                let call = listener(InboundCall {
                    sender,
                    reply,
                    args: req.args,
                });
                let result = match AssertUnwindSafe(call).catch_unwind().await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::error!(op = "ipc.stdio.handler_panic", id = %req.id, channel = %req.channel, "Handler panicked");
                        Err(IpcError::internal(&format!("Handler for {} panicked", req.channel)))
                    }
                };
                send_response(&outbound, WireResponse::from_result(req.id, result));
            });
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                tracing::error!(op = "ipc.stdio.task_failed", error = %e, "Call task failed");
            }
        }

        // Writer drains and exits once every sender is gone
        drop(outbound);
        let written = match writer_task.await {
            Ok(result) => result.map_err(TransportError::Io),
            Err(e) => Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                e.to_string(),
            ))),
        };

        match read_error {
            Some(e) => Err(TransportError::Io(e)),
            None => written,
        }
    }
}

impl Transport for StdioTransport {
    fn handle(&self, channel: &str, listener: Listener) -> Result<(), TransportError> {
        self.listeners.install(channel, listener)
    }
}

fn parse_error(message: &str) -> WireResponse {
    WireResponse::err(String::new(), IpcError::new("PARSE_ERROR", message))
}

fn send_response(outbound: &mpsc::UnboundedSender<String>, resp: WireResponse) {
    match serde_json::to_string(&resp) {
        Ok(line) => {
            if outbound.send(line).is_err() {
                tracing::warn!(op = "ipc.stdio.closed", id = %resp.id, "Response dropped, writer closed");
            }
        }
        Err(e) => {
            tracing::error!(op = "ipc.stdio.serialize_error", id = %resp.id, error = %e, "Failed to serialize response");
        }
    }
}

async fn write_lines<W>(mut writer: W, mut inbound: mpsc::UnboundedReceiver<String>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = inbound.recv().await {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    writer.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use serde_json::json;
    use std::collections::HashMap;
    use tokio::io::AsyncReadExt;

    fn listener<F>(f: F) -> Listener
    where
        F: Fn(InboundCall) -> IpcResult + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Arc::new(move |call: InboundCall| {
            let f = f.clone();
            async move { f(call) }.boxed()
        })
    }

    async fn run(transport: &StdioTransport, input: &'static str) -> Vec<Value> {
        run_bytes(transport, input.as_bytes()).await
    }

    async fn run_bytes(transport: &StdioTransport, input: &'static [u8]) -> Vec<Value> {
        let (writer, mut output) = tokio::io::duplex(64 * 1024);
        transport.serve(input, writer).await.unwrap();

        let mut text = String::new();
        output.read_to_string(&mut text).await.unwrap();
        text.lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_request_response_correlation() {
        let transport = StdioTransport::new();
        transport
            .handle("app:echo", listener(|call| Ok(json!({ "sender": call.sender.as_str(), "args": call.args }))))
            .unwrap();

        let out = run(
            &transport,
            "{\"id\":\"1\",\"channel\":\"app:echo\",\"sender\":\"win-9\",\"args\":{\"n\":1}}\n\
             \n\
             {\"id\":\"2\",\"channel\":\"app:echo\",\"args\":[true]}\n",
        )
        .await;

        let by_id: HashMap<String, WireResponse> = out
            .into_iter()
            .map(|v| serde_json::from_value::<WireResponse>(v).unwrap())
            .map(|r| (r.id.clone(), r))
            .collect();
        assert_eq!(by_id.len(), 2);
        assert_eq!(by_id["1"].result, Some(json!({ "sender": "win-9", "args": { "n": 1 } })));
        assert_eq!(by_id["2"].result, Some(json!({ "sender": "stdio", "args": [true] })));
        assert!(by_id["1"].ok && by_id["2"].ok);
    }

    #[tokio::test]
    async fn test_unknown_channel_and_parse_error() {
        let transport = StdioTransport::new();
        let out = run(&transport, "not json\n{\"id\":\"7\",\"channel\":\"x:y\"}\n").await;

        let responses: Vec<WireResponse> = out
            .into_iter()
            .map(|v| serde_json::from_value(v).unwrap())
            .collect();
        assert_eq!(responses.len(), 2);

        let parse = responses.iter().find(|r| r.id.is_empty()).unwrap();
        assert_eq!(parse.error.as_ref().unwrap().code, "PARSE_ERROR");

        let unknown = responses.iter().find(|r| r.id == "7").unwrap();
        assert!(!unknown.ok);
        assert_eq!(unknown.error.as_ref().unwrap().code, "UNKNOWN_CHANNEL");
    }

    #[tokio::test]
    async fn test_undecodable_line_does_not_drop_other_calls() {
        let transport = StdioTransport::new();
        let slow: Listener = Arc::new(|_call: InboundCall| {
            async {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                Ok::<_, IpcError>(json!("slow"))
            }
            .boxed()
        });
        transport.handle("a:slow", slow).unwrap();
        transport.handle("a:fast", listener(|_| Ok(json!("fast")))).unwrap();

        let out = run_bytes(
            &transport,
            b"{\"id\":\"s1\",\"channel\":\"a:slow\"}\n\xff\xfe\n{\"id\":\"s2\",\"channel\":\"a:fast\"}\n",
        )
        .await;

        let responses: Vec<WireResponse> = out
            .into_iter()
            .map(|v| serde_json::from_value(v).unwrap())
            .collect();
        assert_eq!(responses.len(), 3);

        let bad = responses.iter().find(|r| r.id.is_empty()).unwrap();
        assert_eq!(bad.error.as_ref().unwrap().code, "PARSE_ERROR");
        let s1 = responses.iter().find(|r| r.id == "s1").unwrap();
        assert_eq!(s1.result, Some(json!("slow")));
        let s2 = responses.iter().find(|r| r.id == "s2").unwrap();
        assert_eq!(s2.result, Some(json!("fast")));
    }

    #[tokio::test]
    async fn test_panicking_handler_still_gets_an_answer() {
        let transport = StdioTransport::new();
        transport
            .handle("a:boom", listener(|_| panic!("boom")))
            .unwrap();
        transport.handle("a:ok", listener(|_| Ok(json!(1)))).unwrap();

        let out = run(
            &transport,
            "{\"id\":\"p1\",\"channel\":\"a:boom\"}\n{\"id\":\"p2\",\"channel\":\"a:ok\"}\n",
        )
        .await;

        let by_id: HashMap<String, WireResponse> = out
            .into_iter()
            .map(|v| serde_json::from_value::<WireResponse>(v).unwrap())
            .map(|r| (r.id.clone(), r))
            .collect();
        assert_eq!(by_id.len(), 2);
        assert!(!by_id["p1"].ok);
        assert_eq!(by_id["p1"].error.as_ref().unwrap().code, "INTERNAL_ERROR");
        assert_eq!(by_id["p2"].result, Some(json!(1)));
    }

    #[tokio::test]
    async fn test_handler_error_is_reported_verbatim() {
        let transport = StdioTransport::new();
        transport
            .handle("auth:me", listener(|_| Err(IpcError::not_authenticated())))
            .unwrap();

        let out = run(&transport, "{\"id\":\"a\",\"channel\":\"auth:me\"}\n").await;
        let resp: WireResponse = serde_json::from_value(out[0].clone()).unwrap();
        assert_eq!(resp.error, Some(IpcError::not_authenticated()));
        assert_eq!(resp.result, None);
    }

    #[tokio::test]
    async fn test_events_are_written_as_event_lines() {
        let transport = StdioTransport::new();
        transport
            .handle(
                "job:run",
                listener(|call| {
                    call.reply.emit("job:progress", json!({ "pct": 100 })).ok();
                    Ok(Value::Null)
                }),
            )
            .unwrap();

        let out = run(&transport, "{\"id\":\"j\",\"channel\":\"job:run\",\"sender\":\"win-3\"}\n").await;
        assert_eq!(out.len(), 2);
        let event: WireEvent = serde_json::from_value(out[0].clone()).unwrap();
        assert_eq!(
            event,
            WireEvent {
                event: "job:progress".to_string(),
                sender: "win-3".to_string(),
                payload: json!({ "pct": 100 }),
            }
        );
        assert_eq!(out[1]["id"], "j");
    }
}
