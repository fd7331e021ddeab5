mod jsonrpc;
pub mod vim;

use thiserror::Error;
use tokio::sync::mpsc::error::SendError;
use tokio::sync::oneshot;

pub use self::jsonrpc::{
    Error, ErrorCode, Failure, Id, Params, RpcMessage, RpcNotification, RpcRequest, RpcResponse,
    Success,
};
pub use self::vim::{RpcClient, VimMessage};

/// Everything that can go wrong on the RPC layer itself.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("failed to queue outgoing message: {0}")]
    SendRawMessage(#[from] SendError<RpcMessage>),
    #[error("failed to forward incoming call: {0}")]
    SendCall(#[from] SendError<vim::VimMessage>),
    #[error("failed to register pending request: {0}")]
    SendRequest(#[from] SendError<(Id, oneshot::Sender<RpcResponse>)>),
    #[error("failed to deliver response: {0:?}")]
    SendResponse(RpcResponse),
    #[error("request sender dropped: {0}")]
    OneshotRecv(#[from] oneshot::error::RecvError),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error("request failure: {0}")]
    Request(String),
    #[error("stream closed")]
    StreamClosed,
}
