use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use repl_config::Configuration;
use repl_proto::{FrameKind, RequestHeader, DEFAULT_MAX_FRAME_LEN};
use repl_types::WorkerName;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::{MessengerError, Transport};

/// Opens one connection per request to a worker's `svc` endpoint, framed as
/// a 32-bit big-endian length prefix around an already-encoded body.
/// `body` arrives pre-serialized by `repl_request`/`repl_qservmgt`, so this
/// transport never touches `repl_proto::MessageCodec` itself, only the bare
/// length-delimited framing underneath it.
#[derive(Debug)]
pub struct TcpTransport {
    config: Arc<Configuration>,
}

impl TcpTransport {
    pub fn new(config: Arc<Configuration>) -> Self {
        Self { config }
    }

    fn codec() -> LengthDelimitedCodec {
        LengthDelimitedCodec::builder()
            .max_frame_length(DEFAULT_MAX_FRAME_LEN)
            .big_endian()
            .length_field_length(4)
            .new_codec()
    }

    async fn connect(&self, worker: &WorkerName) -> Result<Framed<TcpStream, LengthDelimitedCodec>, MessengerError> {
        let addr = self
            .config
            .worker(worker)
            .ok_or_else(|| MessengerError::Transport { message: format!("no such worker in configuration: {worker}") })?
            .svc;
        let stream = TcpStream::connect((addr.host.as_str(), addr.port))
            .await
            .map_err(|err| MessengerError::Transport { message: format!("connecting to {addr}: {err}") })?;
        Ok(Framed::new(stream, Self::codec()))
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&self, worker: &WorkerName, body: Bytes) -> Result<Bytes, MessengerError> {
        let mut conn = self.connect(worker).await?;
        conn.send(body)
            .await
            .map_err(|err| MessengerError::Transport { message: format!("writing to {worker}: {err}") })?;
        let reply = conn
            .next()
            .await
            .ok_or_else(|| MessengerError::Transport { message: format!("{worker} closed the connection before replying") })?
            .map_err(|err| MessengerError::Transport { message: format!("reading from {worker}: {err}") })?;
        Ok(reply.freeze())
    }

    async fn send_stop(&self, worker: &WorkerName, target_request_id: &str) -> Result<(), MessengerError> {
        let frame = (
            RequestHeader {
                id: 0,
                kind: FrameKind::Stop,
                management_type: Some(target_request_id.to_string()),
                instance_id: 0,
            },
            repl_proto::RequestBody::Stop { target_request_id: target_request_id.to_string() },
        );
        let encoded = bincode::serialize(&frame).map_err(|err| MessengerError::Transport { message: format!("encoding stop frame: {err}") })?;

        let mut conn = self.connect(worker).await?;
        conn.send(Bytes::from(encoded))
            .await
            .map_err(|err| MessengerError::Transport { message: format!("writing stop to {worker}: {err}") })?;
        // Best-effort: the worker's ack, if any, is not awaited.
        Ok(())
    }
}
