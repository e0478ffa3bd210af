use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{ChunkFrame, WireMessage, MAX_CHUNK_LEN, MAX_CONTROL_FRAME_LEN};

/// A single transport frame, ready to hand to (or taken from) the WebSocket
/// layer. The transport's own framing delimits messages; the codec only
/// decides text-vs-binary and enforces size limits.
#[derive(Clone, Debug, PartialEq)]
pub enum WireFrame {
    /// An internally-tagged JSON control message.
    Text(String),
    /// A bincode-encoded [`ChunkFrame`].
    Binary(Vec<u8>),
}

/// Codec for encoding/decoding OVL messages.
///
/// Control messages become JSON text frames; `chunk` becomes a bincode
/// binary frame so payload bytes cross the wire untouched.
pub struct WireCodec;

impl WireCodec {
    pub fn encode(msg: &WireMessage) -> ProtocolResult<WireFrame> {
        match msg {
            WireMessage::Chunk(frame) => {
                if frame.data.len() > MAX_CHUNK_LEN {
                    return Err(ProtocolError::ChunkTooLarge {
                        size: frame.data.len(),
                        max: MAX_CHUNK_LEN,
                    });
                }
                let bytes = bincode::serialize(frame)
                    .map_err(|e| ProtocolError::Serialization(e.to_string()))?;
                Ok(WireFrame::Binary(bytes))
            }
            control => {
                let text = serde_json::to_string(control)
                    .map_err(|e| ProtocolError::Serialization(e.to_string()))?;
                if text.len() > MAX_CONTROL_FRAME_LEN {
                    return Err(ProtocolError::MessageTooLarge {
                        size: text.len(),
                        max: MAX_CONTROL_FRAME_LEN,
                    });
                }
                Ok(WireFrame::Text(text))
            }
        }
    }

    pub fn decode(frame: &WireFrame) -> ProtocolResult<WireMessage> {
        match frame {
            WireFrame::Text(text) => Self::decode_text(text),
            WireFrame::Binary(data) => Self::decode_binary(data),
        }
    }

    pub fn decode_text(text: &str) -> ProtocolResult<WireMessage> {
        if text.len() > MAX_CONTROL_FRAME_LEN {
            return Err(ProtocolError::MessageTooLarge {
                size: text.len(),
                max: MAX_CONTROL_FRAME_LEN,
            });
        }
        let msg: WireMessage = serde_json::from_str(text)
            .map_err(|e| ProtocolError::Deserialization(e.to_string()))?;
        if matches!(msg, WireMessage::Chunk(_)) {
            // Chunk payloads must not be smuggled through the JSON path.
            return Err(ProtocolError::FramingError(
                "chunk message in a text frame".into(),
            ));
        }
        Ok(msg)
    }

    pub fn decode_binary(data: &[u8]) -> ProtocolResult<WireMessage> {
        // Header slack beyond the payload: name, offset, and bincode lengths.
        if data.len() > MAX_CHUNK_LEN + 1024 {
            return Err(ProtocolError::ChunkTooLarge {
                size: data.len(),
                max: MAX_CHUNK_LEN,
            });
        }
        let frame: ChunkFrame = bincode::deserialize(data)
            .map_err(|e| ProtocolError::Deserialization(e.to_string()))?;
        if frame.data.len() > MAX_CHUNK_LEN {
            return Err(ProtocolError::ChunkTooLarge {
                size: frame.data.len(),
                max: MAX_CHUNK_LEN,
            });
        }
        Ok(WireMessage::Chunk(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovl_types::{StateSnapshot, UploadName};
    use serde_json::json;

    fn chunk(offset: u64, data: Vec<u8>) -> WireMessage {
        WireMessage::Chunk(ChunkFrame {
            name: UploadName::parse("clip.mp4").unwrap(),
            offset,
            data,
        })
    }

    #[test]
    fn control_messages_encode_as_text() {
        let msg = WireMessage::Mutate { key: "score".into(), value: json!([25, 23]) };
        let frame = WireCodec::encode(&msg).unwrap();
        let WireFrame::Text(text) = &frame else {
            panic!("expected text frame");
        };
        assert!(text.contains("\"type\":\"mutate\""));
        assert_eq!(WireCodec::decode(&frame).unwrap(), msg);
    }

    #[test]
    fn chunks_encode_as_binary() {
        let msg = chunk(1024, vec![7u8; 512]);
        let frame = WireCodec::encode(&msg).unwrap();
        assert!(matches!(frame, WireFrame::Binary(_)));
        assert_eq!(WireCodec::decode(&frame).unwrap(), msg);
    }

    #[test]
    fn chunk_payload_bytes_are_not_inflated() {
        // The binary encoding must stay close to the raw payload size,
        // which is the whole point of not routing chunks through JSON.
        let msg = chunk(0, vec![0xAB; 100_000]);
        let WireFrame::Binary(bytes) = WireCodec::encode(&msg).unwrap() else {
            panic!("expected binary frame");
        };
        assert!(bytes.len() < 100_000 + 1024);
    }

    #[test]
    fn oversize_chunk_is_refused_at_encode() {
        let msg = chunk(0, vec![0u8; MAX_CHUNK_LEN + 1]);
        let err = WireCodec::encode(&msg).unwrap_err();
        assert!(matches!(err, ProtocolError::ChunkTooLarge { .. }));
    }

    #[test]
    fn oversize_control_frame_is_refused_at_encode() {
        let msg = WireMessage::Mutate {
            key: "big".into(),
            value: json!("x".repeat(MAX_CONTROL_FRAME_LEN)),
        };
        let err = WireCodec::encode(&msg).unwrap_err();
        assert!(matches!(err, ProtocolError::MessageTooLarge { .. }));
    }

    #[test]
    fn chunk_in_text_frame_is_a_framing_error() {
        let text = r#"{"type":"chunk","name":"clip.mp4","offset":0,"data":[]}"#;
        let err = WireCodec::decode_text(text).unwrap_err();
        assert!(matches!(err, ProtocolError::FramingError(_)));
    }

    #[test]
    fn garbage_frames_are_deserialization_errors() {
        assert!(matches!(
            WireCodec::decode_text("not json"),
            Err(ProtocolError::Deserialization(_))
        ));
        assert!(matches!(
            WireCodec::decode_binary(&[0xFF; 3]),
            Err(ProtocolError::Deserialization(_))
        ));
    }

    #[test]
    fn init_roundtrips_with_snapshot() {
        let mut state = StateSnapshot::new();
        state.insert("teams".into(), json!([{"name": "Home"}]));
        let msg = WireMessage::Init { state };
        let frame = WireCodec::encode(&msg).unwrap();
        assert_eq!(WireCodec::decode(&frame).unwrap(), msg);
    }

    proptest::proptest! {
        #[test]
        fn chunk_roundtrip_any_payload(
            offset in 0u64..u64::MAX / 2,
            data in proptest::collection::vec(proptest::num::u8::ANY, 0..4096),
        ) {
            let msg = chunk(offset, data);
            let frame = WireCodec::encode(&msg).unwrap();
            proptest::prop_assert_eq!(WireCodec::decode(&frame).unwrap(), msg);
        }
    }
}
