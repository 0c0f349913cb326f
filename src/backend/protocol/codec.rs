use super::response::{ErrorEnvelope, PackedResult};
use crate::error::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};

pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Decoded outcome of a single engine call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Success(Vec<u8>),
    Failure(ErrorEnvelope),
}

pub fn encode_message<T: Serialize>(msg: &T) -> BridgeResult<Vec<u8>> {
    let payload = rmp_serde::to_vec_named(msg)
        .map_err(|e| BridgeError::Codec(format!("Serialization failed: {}", e)))?;

    if payload.len() > MAX_MESSAGE_SIZE {
        return Err(BridgeError::Codec(format!(
            "Message too large: {} bytes",
            payload.len()
        )));
    }

    Ok(payload)
}

pub fn decode_message<T: for<'de> Deserialize<'de>>(data: &[u8]) -> BridgeResult<T> {
    rmp_serde::from_slice(data)
        .map_err(|e| BridgeError::Codec(format!("Deserialization failed: {}", e)))
}

/// Split a raw engine result into success bytes or a decoded error envelope.
///
/// A missing result, or one that carries both or neither side, is a protocol
/// violation and never reaches the error taxonomy.
pub fn decode_reply(result: Option<PackedResult>) -> BridgeResult<Reply> {
    let result = result.ok_or_else(|| {
        BridgeError::MalformedResponse("null return from backend method".to_string())
    })?;

    match (result.ok, result.err) {
        (Some(ok), None) => Ok(Reply::Success(ok)),
        (None, Some(err)) => {
            let envelope = rmp_serde::from_slice::<ErrorEnvelope>(&err).map_err(|e| {
                BridgeError::MalformedResponse(format!("undecodable error envelope: {}", e))
            })?;
            Ok(Reply::Failure(envelope))
        }
        (Some(_), Some(_)) => Err(BridgeError::MalformedResponse(
            "both ok and err cases present".to_string(),
        )),
        (None, None) => Err(BridgeError::MalformedResponse(
            "both ok and err cases null".to_string(),
        )),
    }
}
