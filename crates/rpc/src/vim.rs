use crate::{
    Error, ErrorCode, Failure, Id, Params, RpcError, RpcMessage, RpcNotification, RpcRequest,
    RpcResponse, Success,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

/// Message originating on the Vim side, via `pixtex#client#notify` or
/// `pixtex#client#request_async`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum VimMessage {
    Request(RpcRequest),
    Notification(RpcNotification),
}

/// Two-way RPC endpoint speaking to Vim over stdio.
///
/// Incoming requests and notifications are forwarded to the sink given at
/// construction. Responses to calls made from this side are routed back to
/// the matching [`RpcClient::request`] future.
#[derive(Debug)]
pub struct RpcClient {
    /// Allocator for ids of requests made from the Rust side.
    id: AtomicU64,
    /// Outgoing messages, drained by the writer task.
    writer_sender: UnboundedSender<RpcMessage>,
    /// Registers a pending request with the reader so its response can be
    /// delivered once Vim answers.
    response_sender_tx: UnboundedSender<(Id, oneshot::Sender<RpcResponse>)>,
}

impl RpcClient {
    /// Spawns the reader thread and writer task over the given stdio handles.
    ///
    /// The reader runs on a dedicated thread since [`BufRead`] blocks, the
    /// writer drains a channel inside the async runtime.
    pub fn new(
        reader: impl BufRead + Send + 'static,
        writer: impl Write + Send + 'static,
        sink: UnboundedSender<VimMessage>,
    ) -> Self {
        let (response_sender_tx, response_sender_rx): (
            UnboundedSender<(Id, oneshot::Sender<RpcResponse>)>,
            _,
        ) = unbounded_channel();

        let _ = std::thread::Builder::new()
            .name("stdio-reader".to_string())
            .spawn(move || {
                if let Err(error) = loop_read(reader, response_sender_rx, &sink) {
                    tracing::error!(?error, "Thread stdio-reader exited");
                }
            });

        let (writer_sender, writer_receiver) = unbounded_channel();
        tokio::spawn(async move {
            if let Err(error) = loop_write(writer, writer_receiver).await {
                tracing::error!(?error, "Task stdio-writer exited");
            }
        });

        Self {
            id: Default::default(),
            writer_sender,
            response_sender_tx,
        }
    }

    fn next_request_id(&self) -> u64 {
        self.id.fetch_add(1, Ordering::SeqCst)
    }

    /// Issues `call(method, params)` on the Vim side and awaits the result.
    pub async fn request<R: DeserializeOwned>(
        &self,
        method: impl AsRef<str>,
        params: impl Serialize,
    ) -> Result<R, RpcError> {
        let id = self.next_request_id();
        let rpc_request = RpcRequest {
            id: Id::Num(id),
            method: method.as_ref().to_owned(),
            params: into_list_params(params)?,
        };
        let (response_tx, response_rx) = oneshot::channel();
        // Register the pending request first, the response must find a
        // receiver no matter how fast Vim answers.
        self.response_sender_tx.send((Id::Num(id), response_tx))?;
        self.writer_sender.send(RpcMessage::Request(rpc_request))?;
        match response_rx.await? {
            RpcResponse::Success(ok) => Ok(serde_json::from_value(ok.result)?),
            RpcResponse::Failure(err) => Err(RpcError::Request(format!(
                "Vim rejected the request: {err:?}"
            ))),
        }
    }

    /// Sends a notification to Vim without waiting for anything back.
    pub fn notify(&self, method: impl AsRef<str>, params: impl Serialize) -> Result<(), RpcError> {
        let notification = RpcNotification {
            method: method.as_ref().to_owned(),
            params: into_list_params(params)?,
        };

        self.writer_sender
            .send(RpcMessage::Notification(notification))?;

        Ok(())
    }

    /// Answers a request that Vim initiated.
    pub fn send_response(
        &self,
        id: Id,
        output_result: Result<impl Serialize, RpcError>,
    ) -> Result<(), RpcError> {
        let rpc_response = match output_result {
            Ok(ok) => RpcResponse::Success(Success {
                id,
                result: serde_json::to_value(ok)?,
            }),
            Err(err) => RpcResponse::Failure(Failure {
                id,
                error: Error {
                    code: ErrorCode::InternalError,
                    message: format!("{err:?}"),
                    data: None,
                },
            }),
        };

        self.writer_sender
            .send(RpcMessage::Response(rpc_response))?;

        Ok(())
    }
}

/// Reads stdin line by line, dispatching each decoded message.
fn loop_read(
    mut reader: impl BufRead,
    mut response_sender_rx: UnboundedReceiver<(Id, oneshot::Sender<RpcResponse>)>,
    sink: &UnboundedSender<VimMessage>,
) -> Result<(), RpcError> {
    let mut pending_response_senders = HashMap::new();

    loop {
        let mut line = String::new();
        let number = reader.read_line(&mut line)?;

        if number == 0 {
            // Vim closed its end of the pipe, nothing more to serve.
            return Err(RpcError::StreamClosed);
        }

        match serde_json::from_str::<RpcMessage>(line.trim()) {
            Ok(RpcMessage::Request(rpc_request)) => {
                sink.send(VimMessage::Request(rpc_request))?;
            }
            Ok(RpcMessage::Notification(notification)) => {
                sink.send(VimMessage::Notification(notification))?;
            }
            Ok(RpcMessage::Response(response)) => {
                // Pick up whatever requests were registered since the last
                // response came through.
                while let Ok((id, response_sender)) = response_sender_rx.try_recv() {
                    pending_response_senders.insert(id, response_sender);
                }

                if let Some(response_sender) = pending_response_senders.remove(response.id()) {
                    response_sender.send(response).map_err(|response| {
                        tracing::debug!("Failed to send response: {response:?}");
                        RpcError::SendResponse(response)
                    })?;
                }
            }
            Err(err) => {
                tracing::error!(error = ?err, ?line, "Invalid raw Vim message");
            }
        }
    }
}

/// Drains outgoing messages onto stdout.
async fn loop_write(
    mut writer: impl Write,
    mut writer_receiver: UnboundedReceiver<RpcMessage>,
) -> Result<(), RpcError> {
    while let Some(msg) = writer_receiver.recv().await {
        let s = serde_json::to_string(&msg)?;

        if s.len() < 128 {
            tracing::trace!(?msg, "=> Vim");
        } else {
            let method = match &msg {
                RpcMessage::Request(request) => request.method.as_str(),
                RpcMessage::Notification(notification) => notification.method.as_str(),
                RpcMessage::Response(_) => "response",
            };
            tracing::trace!(method, msg_size = s.len(), "=> Vim");
        }

        // The final newline is what triggers the Vim channel callback, and
        // a leading `\r` would reach nvim as part of the payload.
        write!(writer, "Content-length: {}\n\n{}\n", s.len(), s)?;
        writer.flush()?;
    }

    Ok(())
}

/// Converts params of any serializable shape into a JSON list.
///
/// `call(method, args)` on the Vim side expects `args` to be a list, a bare
/// scalar or map is wrapped into a single-element one.
fn into_list_params(value: impl Serialize) -> Result<Params, RpcError> {
    let json_value = serde_json::to_value(value)?;

    let params = match json_value {
        Value::Null => Params::None,
        Value::Array(vec) => Params::Array(vec),
        Value::Bool(_) | Value::Number(_) | Value::String(_) | Value::Object(_) => {
            Params::Array(vec![json_value])
        }
    };

    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_always_sent_as_list() {
        assert_eq!(into_list_params(()).unwrap(), Params::None);
        assert_eq!(
            into_list_params(1usize).unwrap(),
            Params::Array(vec![Value::from(1)])
        );
        assert_eq!(
            into_list_params((1usize, "x")).unwrap(),
            Params::Array(vec![Value::from(1), Value::from("x")])
        );
    }

    #[test]
    fn message_framing() {
        let msg = RpcMessage::Notification(RpcNotification {
            method: "texmath.remove".to_string(),
            params: Params::None,
        });
        let s = serde_json::to_string(&msg).unwrap();
        assert_eq!(s, r#"{"method":"texmath.remove"}"#);

        let framed = format!("Content-length: {}\n\n{}\n", s.len(), s);
        assert_eq!(
            framed,
            "Content-length: 27\n\n{\"method\":\"texmath.remove\"}\n"
        );
    }
}
