//! tokio-util codecs for the two phases of a connection
//!
//! `StartupCodec` reads untagged startup packets until the client has been
//! authenticated, then `ready()` hands over to `PgCodec` for tagged messages.

use super::constants::{DEFAULT_MAX_MESSAGE_SIZE, MAX_STARTUP_PACKET_SIZE};
use super::messages::{BackendMessage, FrontendMessage, ProtocolError, StartupMessage};
use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

/// Codec for the query phase: decodes FrontendMessage, encodes BackendMessage
#[derive(Debug, Clone, Copy)]
pub struct PgCodec {
    max_message_size: usize,
}

impl PgCodec {
    pub fn new(max_message_size: usize) -> Self {
        Self { max_message_size }
    }
}

impl Default for PgCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_SIZE)
    }
}

impl Decoder for PgCodec {
    type Item = FrontendMessage;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 5 {
            return Ok(None);
        }
        let declared = i32::from_be_bytes([src[1], src[2], src[3], src[4]]);
        if declared < 4 {
            return Err(ProtocolError::InvalidLength(declared as i64));
        }
        let total = declared as usize + 1;
        if total > self.max_message_size {
            return Err(ProtocolError::TooLarge {
                size: total,
                limit: self.max_message_size,
            });
        }
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }
        let frame = src.split_to(total);
        FrontendMessage::decode(&frame).map(Some)
    }
}

impl Encoder<BackendMessage> for PgCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: BackendMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode(dst)
    }
}

/// Codec for the startup phase
#[derive(Debug, Clone, Copy)]
pub struct StartupCodec {
    max_message_size: usize,
}

impl StartupCodec {
    pub fn new(max_message_size: usize) -> Self {
        Self { max_message_size }
    }

    /// Switch to the query phase codec after a successful startup
    pub fn ready(self) -> PgCodec {
        PgCodec::new(self.max_message_size)
    }
}

impl Default for StartupCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_SIZE)
    }
}

impl Decoder for StartupCodec {
    type Item = StartupMessage;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 4 {
            return Ok(None);
        }
        let declared = i32::from_be_bytes([src[0], src[1], src[2], src[3]]);
        if declared < 8 {
            return Err(ProtocolError::InvalidLength(declared as i64));
        }
        let total = declared as usize;
        if total > MAX_STARTUP_PACKET_SIZE {
            return Err(ProtocolError::TooLarge {
                size: total,
                limit: MAX_STARTUP_PACKET_SIZE,
            });
        }
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }
        let frame = src.split_to(total);
        StartupMessage::decode(&frame).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pg_wire::protocol::constants::PROTOCOL_VERSION_3;

    #[test]
    fn test_partial_frame_waits_for_more() {
        let mut full = BytesMut::new();
        FrontendMessage::Query("SELECT 1".into()).encode(&mut full).unwrap();

        let mut codec = PgCodec::default();
        let mut buf = BytesMut::from(&full[..6]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(&full[6..]);
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(FrontendMessage::Query("SELECT 1".into()))
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut buf = BytesMut::new();
        FrontendMessage::Sync.encode(&mut buf).unwrap();
        FrontendMessage::Terminate.encode(&mut buf).unwrap();

        let mut codec = PgCodec::default();
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(FrontendMessage::Sync));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(FrontendMessage::Terminate));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_oversized_message_rejected() {
        let mut codec = PgCodec::new(64);
        let mut buf = BytesMut::from(&[b'Q', 0, 0, 1, 0][..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_length_below_four_rejected() {
        let mut codec = PgCodec::default();
        let mut buf = BytesMut::from(&[b'S', 0, 0, 0, 3][..]);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn test_encoder_writes_backend_message() {
        let mut codec = PgCodec::default();
        let mut buf = BytesMut::new();
        codec.encode(BackendMessage::BindComplete, &mut buf).unwrap();
        assert_eq!(&buf[..], &[b'2', 0, 0, 0, 4]);
    }

    #[test]
    fn test_startup_codec() {
        let mut buf = BytesMut::new();
        StartupMessage::Startup {
            version: PROTOCOL_VERSION_3,
            params: vec![("user".into(), "alice".into())],
        }
        .encode(&mut buf)
        .unwrap();
        StartupMessage::SslRequest.encode(&mut buf).unwrap();

        let mut codec = StartupCodec::default();
        let first = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.param("user"), Some("alice"));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(StartupMessage::SslRequest));
    }

    #[test]
    fn test_startup_packet_size_limit() {
        let mut codec = StartupCodec::default();
        let mut buf = BytesMut::from(&(20_000i32).to_be_bytes()[..]);
        assert!(codec.decode(&mut buf).is_err());
    }
}
