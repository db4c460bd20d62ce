//! # Packet Builder
//!
//! Builders for client-to-server packets.
//!
//! Each builder writes one frame body (opcode byte followed by the payload)
//! into `buf`. The transport length header is added by [`crate::frame`].
//!
//! ## Usage
//!
//! ```rust
//! use mudsync_protocol::packet_builder::*;
//! use bytes::BytesMut;
//!
//! let mut buf = BytesMut::new();
//! build_ping(&mut buf);
//! assert_eq!(&buf[..], &[67]);
//! ```

use crate::bit_reader::BitWriter;
use crate::chat_codec::ChatCodec;
use crate::opcodes::ClientOpcode;
use bytes::{BufMut, BytesMut};
use mudsync_core::SyncError;

/// Build a keep-alive packet
///
/// # Packet Format
/// ```text
/// {67}
/// ```
pub fn build_ping(buf: &mut BytesMut) {
    buf.put_u8(ClientOpcode::Ping.as_u8());
}

/// Build an orderly disconnect packet
///
/// # Packet Format
/// ```text
/// {31}
/// ```
pub fn build_close_connection(buf: &mut BytesMut) {
    buf.put_u8(ClientOpcode::CloseConnection.as_u8());
}

/// Build a public chat packet
///
/// # Packet Format
/// ```text
/// {216}{smart symbol count}{packed chat}
/// ```
///
/// # Arguments
/// * `buf` - Buffer to write the packet to
/// * `codec` - Shared chat codec
/// * `text` - Chat line; lower-cased and cut to 80 characters
pub fn build_chat(buf: &mut BytesMut, codec: &ChatCodec, text: &str) {
    buf.put_u8(ClientOpcode::Chat.as_u8());
    let mut writer = BitWriter::new();
    codec.write_message(&mut writer, text);
    buf.put_slice(writer.as_bytes());
}

/// Diagnostic sent back to the server when a message could not be applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionReport {
    pub description: String,
    pub opcode: u8,
    pub size: usize,
    pub region_x: i32,
    pub region_y: i32,
    /// Leading payload bytes, at most [`ExceptionReport::MAX_PAYLOAD_BYTES`]
    pub payload_head: Vec<u8>,
}

impl ExceptionReport {
    pub const MAX_PAYLOAD_BYTES: usize = 80;

    pub fn new(error: &SyncError, opcode: u8, payload: &[u8], region: (i32, i32)) -> Self {
        let head = payload.len().min(Self::MAX_PAYLOAD_BYTES);
        Self {
            description: error.to_string(),
            opcode,
            size: payload.len(),
            region_x: region.0,
            region_y: region.1,
            payload_head: payload[..head].to_vec(),
        }
    }

    /// Single-line form carried on the wire
    pub fn text(&self) -> String {
        let mut text = format!(
            "{} - {} - {} rx:{} ry:{} data:",
            self.description, self.opcode, self.size, self.region_x, self.region_y
        );
        for byte in &self.payload_head {
            text.push(' ');
            text.push_str(&byte.to_string());
        }
        text
    }
}

/// Build a diagnostic report packet
///
/// # Packet Format
/// ```text
/// {3}{zero-terminated Latin-1 report text}
/// ```
pub fn build_exception_report(buf: &mut BytesMut, report: &ExceptionReport) {
    buf.put_u8(ClientOpcode::PacketException.as_u8());
    for c in report.text().chars() {
        let code = c as u32;
        buf.put_u8(if code < 256 { code as u8 } else { b'?' });
    }
    buf.put_u8(0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bit_reader::BitReader;
    use crate::chat_codec::init_codec;

    #[test]
    fn test_simple_packets() {
        let mut buf = BytesMut::new();
        build_ping(&mut buf);
        build_close_connection(&mut buf);
        assert_eq!(&buf[..], &[67, 31]);
    }

    #[test]
    fn test_chat_packet_decodes() {
        let codec = init_codec();
        let mut buf = BytesMut::new();
        build_chat(&mut buf, &codec, "Hello World");
        assert_eq!(buf[0], ClientOpcode::Chat.as_u8());
        let mut reader = BitReader::at_byte(&buf, 1);
        assert_eq!(codec.read_message(&mut reader).unwrap(), "hello world");
    }

    #[test]
    fn test_exception_report_caps_payload() {
        let payload: Vec<u8> = (0..200u8).collect();
        let error = SyncError::Handler("boom".into());
        let report = ExceptionReport::new(&error, 191, &payload, (20, 31));
        assert_eq!(report.size, 200);
        assert_eq!(report.payload_head.len(), ExceptionReport::MAX_PAYLOAD_BYTES);
        assert!(report.text().starts_with("Handler error: boom - 191 - 200 rx:20 ry:31 data: 0 1 2"));

        let mut buf = BytesMut::new();
        build_exception_report(&mut buf, &report);
        assert_eq!(buf[0], ClientOpcode::PacketException.as_u8());
        assert_eq!(buf[buf.len() - 1], 0);
    }
}
