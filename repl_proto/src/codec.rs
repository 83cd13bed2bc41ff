use std::marker::PhantomData;

use bytes::{BufMut, BytesMut};
use serde::{de::DeserializeOwned, Serialize};
use snafu::Snafu;
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

/// Default hard cap on a single frame's body, before any bytes are
/// allocated for it. Chosen generously above the largest expected
/// `DirectorIndex` response; callers needing a tighter bound construct
/// [`MessageCodec::with_max_frame_len`] directly.
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

#[derive(Debug, Snafu)]
pub enum CodecError {
    #[snafu(display("frame exceeds the maximum allowed length"))]
    FrameTooLarge,

    #[snafu(display("I/O error while framing: {source}"))]
    Io { source: std::io::Error },

    #[snafu(display("failed to serialize message body: {source}"))]
    Encode { source: bincode::Error },

    #[snafu(display("failed to deserialize message body: {source}"))]
    Decode { source: bincode::Error },
}

impl From<std::io::Error> for CodecError {
    fn from(source: std::io::Error) -> Self {
        Self::Io { source }
    }
}

/// A `tokio_util` [`Decoder`]/[`Encoder`] pair over a 32-bit big-endian
/// length-prefixed frame, with a `bincode`-encoded body of type `T`.
///
/// The length delimiter and the allocation cap are handled by
/// [`LengthDelimitedCodec`]; this type only adds the body
/// serialization/deserialization step on top.
#[derive(Debug)]
pub struct MessageCodec<T> {
    inner: LengthDelimitedCodec,
    _marker: PhantomData<T>,
}

impl<T> MessageCodec<T> {
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        let mut inner = LengthDelimitedCodec::builder();
        inner.max_frame_length(max_frame_len).big_endian().length_field_length(4);
        Self {
            inner: inner.new_codec(),
            _marker: PhantomData,
        }
    }
}

impl<T> Default for MessageCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serialize> Encoder<T> for MessageCodec<T> {
    type Error = CodecError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body = bincode::serialize(&item).map_err(|source| CodecError::Encode { source })?;
        let mut framed = BytesMut::with_capacity(body.len());
        framed.put_slice(&body);
        self.inner.encode(framed.freeze(), dst)?;
        Ok(())
    }
}

impl<T: DeserializeOwned> Decoder for MessageCodec<T> {
    type Item = T;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(frame) = self.inner.decode(src)? else {
            return Ok(None);
        };
        let item = bincode::deserialize(&frame).map_err(|source| CodecError::Decode { source })?;
        Ok(Some(item))
    }
}
