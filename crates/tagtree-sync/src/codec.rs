use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{SyncError, SyncResult};
use crate::message::{SyncMessage, MAX_MESSAGE_SIZE};

/// Codec for replication messages.
pub struct SyncCodec;

impl SyncCodec {
    /// Encode a message with framing: [4 bytes len][1 byte tag][payload]
    pub fn encode(msg: &SyncMessage) -> SyncResult<Bytes> {
        let payload =
            bincode::serialize(msg).map_err(|e| SyncError::Serialization(e.to_string()))?;
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(SyncError::MessageTooLarge {
                size: payload.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        let len = (payload.len() + 1) as u32;
        let mut buf = BytesMut::with_capacity(4 + 1 + payload.len());
        buf.put_u32(len);
        buf.put_u8(msg.type_tag());
        buf.extend_from_slice(&payload);
        Ok(buf.freeze())
    }

    /// Decode a framed message. Returns (message, bytes_consumed).
    pub fn decode(data: &[u8]) -> SyncResult<(SyncMessage, usize)> {
        if data.len() < 5 {
            return Err(SyncError::Framing("too short".into()));
        }
        let len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
        check_frame_len(len)?;
        let total = 4 + len;
        if data.len() < total {
            return Err(SyncError::Framing(format!(
                "incomplete: have {}, need {}",
                data.len(),
                total
            )));
        }
        let msg = Self::decode_body(data[4], &data[5..total])?;
        Ok((msg, total))
    }

    /// Write one framed message and flush.
    pub async fn write<W>(writer: &mut W, msg: &SyncMessage) -> SyncResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        let frame = Self::encode(msg)?;
        writer.write_all(&frame).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Read one framed message.
    pub async fn read<R>(reader: &mut R) -> SyncResult<SyncMessage>
    where
        R: AsyncRead + Unpin,
    {
        let len = reader.read_u32().await? as usize;
        check_frame_len(len)?;
        let mut body = vec![0u8; len];
        reader.read_exact(&mut body).await?;
        Self::decode_body(body[0], &body[1..])
    }

    fn decode_body(tag: u8, payload: &[u8]) -> SyncResult<SyncMessage> {
        let msg: SyncMessage = bincode::deserialize(payload)
            .map_err(|e| SyncError::Serialization(e.to_string()))?;
        if msg.type_tag() != tag {
            return Err(SyncError::Framing(format!(
                "type tag {tag} does not match {} payload",
                msg.type_name()
            )));
        }
        Ok(msg)
    }
}

fn check_frame_len(len: usize) -> SyncResult<()> {
    if len < 1 {
        return Err(SyncError::Framing("zero-length frame".into()));
    }
    if len - 1 > MAX_MESSAGE_SIZE {
        return Err(SyncError::MessageTooLarge {
            size: len - 1,
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::PROTOCOL_VERSION;
    use crate::types::LogStatus;
    use tagtree_crypto::SigningKey;
    use tagtree_log::SignedEntry;

    #[test]
    fn entries_frame_roundtrip() {
        let key = SigningKey::generate();
        let msg = SyncMessage::Entries {
            log: key.log_id(),
            entries: vec![SignedEntry::sign(&key, 0, None, b"header".to_vec())],
        };
        let encoded = SyncCodec::encode(&msg).unwrap();
        let (decoded, consumed) = SyncCodec::decode(&encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded, msg);
    }

    #[test]
    fn type_tags_unique() {
        let msgs = vec![
            SyncMessage::Hello { version: 1, capabilities: vec![] },
            SyncMessage::HelloAck { version: 1, capabilities: vec![] },
            SyncMessage::Status { logs: vec![] },
            SyncMessage::Entries { log: SigningKey::generate().log_id(), entries: vec![] },
            SyncMessage::Done,
            SyncMessage::Continue { more: false },
            SyncMessage::Error { code: 0, message: String::new() },
        ];
        let mut tags: Vec<u8> = msgs.iter().map(|m| m.type_tag()).collect();
        let len = tags.len();
        tags.sort();
        tags.dedup();
        assert_eq!(tags.len(), len, "type tags should be unique");
    }

    #[test]
    fn decode_truncated() {
        let err = SyncCodec::decode(&[0, 0, 0]).unwrap_err();
        assert!(matches!(err, SyncError::Framing(_)));
    }

    #[test]
    fn decode_zero_length() {
        let err = SyncCodec::decode(&[0u8, 0, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, SyncError::Framing(_)));
    }

    #[test]
    fn decode_oversized_frame() {
        let len = (MAX_MESSAGE_SIZE as u32 + 2).to_be_bytes();
        let data = [len[0], len[1], len[2], len[3], 3];
        let err = SyncCodec::decode(&data).unwrap_err();
        assert!(matches!(err, SyncError::MessageTooLarge { .. }));
    }

    #[test]
    fn mismatched_tag_is_rejected() {
        let mut frame = SyncCodec::encode(&SyncMessage::Done).unwrap().to_vec();
        frame[4] = 6;
        let err = SyncCodec::decode(&frame).unwrap_err();
        assert!(matches!(err, SyncError::Framing(_)));
    }

    #[tokio::test]
    async fn stream_roundtrip_over_duplex() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        let hello = SyncMessage::Hello {
            version: PROTOCOL_VERSION,
            capabilities: vec!["signed-entries".into()],
        };
        let status = SyncMessage::Status {
            logs: vec![LogStatus { log: SigningKey::generate().log_id(), len: 3 }],
        };

        SyncCodec::write(&mut a, &hello).await.unwrap();
        SyncCodec::write(&mut a, &status).await.unwrap();
        assert_eq!(SyncCodec::read(&mut b).await.unwrap(), hello);
        assert_eq!(SyncCodec::read(&mut b).await.unwrap(), status);
    }
}
