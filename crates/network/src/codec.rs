//! Frame codec for `tokio_util::codec`
//!
//! Wraps [`decode_frame`]/[`encode_frame`] so a socket half can be turned
//! into a `Stream` of [`Frame`]s and a `Sink` accepting them.

use bytes::BytesMut;
use mudsync_core::SyncError;
use mudsync_protocol::{decode_frame, encode_frame, Frame, DEFAULT_MAX_FRAME_LEN};
use tokio_util::codec::{Decoder, Encoder};

#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_len: usize,
}

impl FrameCodec {
    pub fn new(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }

    #[inline]
    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = SyncError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, SyncError> {
        decode_frame(src, self.max_frame_len)
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = SyncError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), SyncError> {
        encode_frame(&frame, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    #[tokio::test]
    async fn test_frames_survive_a_pipe() {
        let (client, server) = tokio::io::duplex(1024);
        let mut sink = FramedWrite::new(server, FrameCodec::default());
        let mut stream = FramedRead::new(client, FrameCodec::default());

        let short = Frame::new(131, &b"Welcome"[..]);
        let long = Frame::new(48, vec![7u8; 400]);
        sink.send(short.clone()).await.unwrap();
        sink.send(long.clone()).await.unwrap();
        drop(sink);

        assert_eq!(stream.next().await.unwrap().unwrap(), short);
        assert_eq!(stream.next().await.unwrap().unwrap(), long);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_oversized_frame_is_an_error() {
        let (client, server) = tokio::io::duplex(1024);
        let mut sink = FramedWrite::new(server, FrameCodec::new(5000));
        let mut stream = FramedRead::new(client, FrameCodec::new(100));

        sink.send(Frame::new(48, vec![0u8; 200])).await.unwrap();
        assert!(stream.next().await.unwrap().is_err());
    }

    #[test]
    fn test_partial_frame_waits() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::from(&[4u8][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 1);
    }
}
