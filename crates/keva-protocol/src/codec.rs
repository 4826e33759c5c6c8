//! Codec for the payloads that cross the broker.
//!
//! Requests, responses, and change events are all encoded the same way:
//! MessagePack with a length prefix, so consumers can frame payloads out of
//! a byte stream without knowing their shape.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Maximum payload size (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Length prefix size in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Payload exceeds maximum size.
    #[error("Payload size {0} exceeds maximum {MAX_FRAME_SIZE}")]
    FrameTooLarge(usize),

    /// Not enough data to decode a payload.
    #[error("Incomplete payload: need {0} more bytes")]
    Incomplete(usize),

    /// MessagePack encoding error.
    #[error("Encoding error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// MessagePack decoding error.
    #[error("Decoding error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// Encode a value to bytes.
///
/// The encoded format is:
/// - 4 bytes: Big-endian length prefix
/// - N bytes: MessagePack-encoded value
///
/// # Errors
///
/// Returns an error if the payload is too large or encoding fails.
pub fn encode<T: Serialize>(value: &T) -> Result<Bytes, CodecError> {
    let payload = rmp_serde::to_vec_named(value)?;

    if payload.len() > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge(payload.len()));
    }

    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.extend_from_slice(&payload);

    Ok(buf.freeze())
}

/// Encode a value into an existing buffer.
///
/// # Errors
///
/// Returns an error if the payload is too large or encoding fails.
pub fn encode_into<T: Serialize>(value: &T, buf: &mut BytesMut) -> Result<(), CodecError> {
    let payload = rmp_serde::to_vec_named(value)?;

    if payload.len() > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge(payload.len()));
    }

    buf.reserve(LENGTH_PREFIX_SIZE + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.extend_from_slice(&payload);

    Ok(())
}

/// Decode a value from bytes.
///
/// # Errors
///
/// Returns an error if the data is incomplete, too large, or invalid.
pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, CodecError> {
    if data.len() < LENGTH_PREFIX_SIZE {
        return Err(CodecError::Incomplete(LENGTH_PREFIX_SIZE - data.len()));
    }

    let length = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;

    if length > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge(length));
    }

    let total_size = LENGTH_PREFIX_SIZE + length;
    if data.len() < total_size {
        return Err(CodecError::Incomplete(total_size - data.len()));
    }

    let value = rmp_serde::from_slice(&data[LENGTH_PREFIX_SIZE..total_size])?;
    Ok(value)
}

/// Try to decode a value from a buffer, advancing it if successful.
///
/// Returns `Ok(Some(value))` if a complete payload was decoded,
/// `Ok(None)` if more data is needed, or `Err` on codec error.
///
/// # Errors
///
/// Returns an error if the payload is too large or invalid.
pub fn decode_from<T: DeserializeOwned>(buf: &mut BytesMut) -> Result<Option<T>, CodecError> {
    if buf.len() < LENGTH_PREFIX_SIZE {
        return Ok(None);
    }

    let length = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;

    if length > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge(length));
    }

    let total_size = LENGTH_PREFIX_SIZE + length;
    if buf.len() < total_size {
        return Ok(None);
    }

    buf.advance(LENGTH_PREFIX_SIZE);
    let payload = buf.split_to(length);
    let value = rmp_serde::from_slice(&payload)?;

    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{ChangeEvent, Entry};
    use crate::envelope::{Request, Response};

    #[test]
    fn test_encode_decode_requests() {
        let requests = vec![
            Request::get(1, "*"),
            Request::put(2, "Key1", "Value1"),
            Request::delete(3, "Key1"),
            Request::get(4, "*").with_subscription_queue("events-q"),
        ];

        for request in requests {
            let encoded = encode(&request).unwrap();
            let decoded: Request = decode(&encoded).unwrap();
            assert_eq!(request, decoded);
        }
    }

    #[test]
    fn test_encode_decode_responses() {
        let responses = vec![
            Response::ok(1, vec![Entry::new("Key1", "Value1")]),
            Response::created(2, Entry::new("Key2", "Value2")),
            Response::deleted(3, vec![]),
            Response::bad_request(4, "cannot delete nonexisting entry: Key9"),
        ];

        for response in responses {
            let encoded = encode(&response).unwrap();
            let decoded: Response = decode(&encoded).unwrap();
            assert_eq!(response, decoded);
        }
    }

    #[test]
    fn test_encode_decode_events() {
        let event = ChangeEvent::modified(Entry::new("Key1", "Value2"));
        let encoded = encode(&event).unwrap();
        let decoded: ChangeEvent = decode(&encoded).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn test_decode_incomplete() {
        let request = Request::get(1, "Key1");
        let encoded = encode(&request).unwrap();

        // Test with partial data
        let partial = &encoded[..5];
        match decode::<Request>(partial) {
            Err(CodecError::Incomplete(_)) => {}
            other => panic!("Expected Incomplete error, got {:?}", other),
        }
    }

    #[test]
    fn test_frame_too_large() {
        let request = Request::put(1, "big", "x".repeat(MAX_FRAME_SIZE + 1));

        match encode(&request) {
            Err(CodecError::FrameTooLarge(_)) => {}
            other => panic!("Expected FrameTooLarge error, got {:?}", other),
        }
    }

    #[test]
    fn test_streaming_decode() {
        let first = Request::get(1, "Key1");
        let second = Request::get(2, "Key2");

        let mut buf = BytesMut::new();
        encode_into(&first, &mut buf).unwrap();
        encode_into(&second, &mut buf).unwrap();

        let decoded1: Request = decode_from(&mut buf).unwrap().unwrap();
        let decoded2: Request = decode_from(&mut buf).unwrap().unwrap();

        assert_eq!(first, decoded1);
        assert_eq!(second, decoded2);
        assert!(buf.is_empty());
    }
}
