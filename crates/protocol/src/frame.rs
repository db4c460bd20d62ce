//! Transport framing
//!
//! A frame body is the opcode byte followed by the payload. Bodies shorter
//! than 160 bytes are sent as `{len}{last body byte}{body without last byte}`;
//! longer ones as `{160 + len / 256}{len % 256}{body}`.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use mudsync_core::{Result, SyncError};

/// Default cap on a frame body
pub const DEFAULT_MAX_FRAME_LEN: usize = 5000;

/// Largest body the two-byte header can describe
pub const MAX_ENCODABLE_LEN: usize = ((255 - 160) << 8) | 0xFF;

const SHORT_FRAME_LIMIT: usize = 160;

/// One message: opcode plus payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub opcode: u8,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(opcode: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            opcode,
            payload: payload.into(),
        }
    }

    /// Split a body written by a packet builder into opcode and payload
    pub fn from_body(body: Bytes) -> Result<Self> {
        if body.is_empty() {
            return Err(SyncError::InvalidData("Empty frame body".into()));
        }
        Ok(Self {
            opcode: body[0],
            payload: body.slice(1..),
        })
    }

    /// Opcode plus payload length
    #[inline]
    pub fn body_len(&self) -> usize {
        self.payload.len() + 1
    }
}

/// Take one frame off the front of `src`
///
/// # Returns
/// - `Ok(Some(frame))` - a full frame was consumed
/// - `Ok(None)` - more bytes are needed; `src` is untouched
/// - `Err(e)` - the header announces an empty or oversized frame
pub fn decode_frame(src: &mut BytesMut, max_len: usize) -> Result<Option<Frame>> {
    if src.len() < 2 {
        return Ok(None);
    }

    let first = src[0] as usize;
    let (len, header) = if first >= SHORT_FRAME_LIMIT {
        (((first - SHORT_FRAME_LIMIT) << 8) | src[1] as usize, 2)
    } else {
        (first, 1)
    };

    if len == 0 {
        return Err(SyncError::InvalidData("Frame announces an empty body".into()));
    }
    if len > max_len {
        return Err(SyncError::InvalidData(format!(
            "Frame of {} bytes exceeds limit of {}",
            len, max_len
        )));
    }
    if src.len() < header + len {
        src.reserve(header + len - src.len());
        return Ok(None);
    }

    let body = if header == 2 {
        src.advance(2);
        src.split_to(len).freeze()
    } else {
        // The final body byte travels right after the length
        let last = src[1];
        src.advance(2);
        let mut body = BytesMut::with_capacity(len);
        body.extend_from_slice(&src.split_to(len - 1));
        body.put_u8(last);
        body.freeze()
    };

    Frame::from_body(body).map(Some)
}

/// Append `frame` to `dst` with its transport header
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    let len = frame.body_len();
    if len > MAX_ENCODABLE_LEN {
        return Err(SyncError::InvalidData(format!(
            "Frame of {} bytes cannot be encoded",
            len
        )));
    }

    dst.reserve(len + 2);
    if len >= SHORT_FRAME_LIMIT {
        dst.put_u8((SHORT_FRAME_LIMIT + (len >> 8)) as u8);
        dst.put_u8(len as u8);
        dst.put_u8(frame.opcode);
        dst.put_slice(&frame.payload);
    } else {
        dst.put_u8(len as u8);
        match frame.payload.split_last() {
            Some((&last, rest)) => {
                dst.put_u8(last);
                dst.put_u8(frame.opcode);
                dst.put_slice(rest);
            }
            None => dst.put_u8(frame.opcode),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_frame_layout() {
        let frame = Frame::new(191, vec![1u8, 2, 3]);
        let mut buf = BytesMut::new();
        encode_frame(&frame, &mut buf).unwrap();
        assert_eq!(&buf[..], &[4, 3, 191, 1, 2]);

        let decoded = decode_frame(&mut buf, DEFAULT_MAX_FRAME_LEN).unwrap();
        assert_eq!(decoded, Some(frame));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_opcode_only_frame() {
        let mut buf = BytesMut::from(&[1u8, 67][..]);
        let frame = decode_frame(&mut buf, DEFAULT_MAX_FRAME_LEN).unwrap().unwrap();
        assert_eq!(frame.opcode, 67);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_long_frame_layout() {
        let payload: Vec<u8> = (0..300u32).map(|i| i as u8).collect();
        let frame = Frame::new(99, payload);
        let mut buf = BytesMut::new();
        encode_frame(&frame, &mut buf).unwrap();
        assert_eq!(buf[0], 161);
        assert_eq!(buf[1], 45);
        assert_eq!(buf[2], 99);

        let decoded = decode_frame(&mut buf, DEFAULT_MAX_FRAME_LEN).unwrap();
        assert_eq!(decoded, Some(frame));
    }

    #[test]
    fn test_partial_frame_waits() {
        let mut buf = BytesMut::from(&[4u8, 3, 191][..]);
        assert_eq!(decode_frame(&mut buf, DEFAULT_MAX_FRAME_LEN).unwrap(), None);
        assert_eq!(buf.len(), 3);
        buf.extend_from_slice(&[1, 2]);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_FRAME_LEN).unwrap().is_some());
    }

    #[test]
    fn test_oversized_and_empty_frames() {
        let mut buf = BytesMut::from(&[0xB4u8, 0x00][..]);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_FRAME_LEN).is_err());
        let mut buf = BytesMut::from(&[0u8, 0][..]);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_FRAME_LEN).is_err());
    }
}
