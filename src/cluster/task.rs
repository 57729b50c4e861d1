//! Serialized task envelopes for remote execution.

use crate::cluster::{NodeId, RemoteDispatch};
use crate::core::constants::MAX_DATAGRAM_PAYLOAD;
use crate::core::error::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// How a payload travels to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transfer {
    /// Fits in one datagram
    Datagram,
    /// Too large for a datagram; sent as a stream
    Stream,
}

impl Transfer {
    /// Transfer mode for a payload of `len` bytes.
    pub fn for_len(len: usize) -> Self {
        if len <= MAX_DATAGRAM_PAYLOAD {
            Transfer::Datagram
        } else {
            Transfer::Stream
        }
    }
}

/// A bincode-encoded task or task reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEnvelope {
    transfer: Transfer,
    payload: Vec<u8>,
}

impl TaskEnvelope {
    /// Encodes a value and picks the transfer mode from its size.
    pub fn encode<T: Serialize>(value: &T) -> Result<Self> {
        let payload = bincode::serialize(value)?;
        Ok(TaskEnvelope {
            transfer: Transfer::for_len(payload.len()),
            payload,
        })
    }

    /// Decodes the payload.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(bincode::deserialize(&self.payload)?)
    }

    /// Transfer mode of this envelope
    pub fn transfer(&self) -> Transfer {
        self.transfer
    }

    /// Encoded payload
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// True for an empty payload
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Runs `task` on `target` and decodes its reply.
pub fn dispatch<T, R>(dispatcher: &dyn RemoteDispatch, target: NodeId, task: &T) -> Result<R>
where
    T: Serialize,
    R: DeserializeOwned,
{
    let request = TaskEnvelope::encode(task)?;
    log::debug!(
        "dispatching {} byte task to {} via {:?}",
        request.len(),
        target,
        request.transfer()
    );
    let reply = dispatcher.call(target, request)?;
    reply.decode()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_payload_is_datagram() {
        let env = TaskEnvelope::encode(&vec![1u32, 2, 3]).unwrap();
        assert_eq!(env.transfer(), Transfer::Datagram);
        let back: Vec<u32> = env.decode().unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }

    #[test]
    fn test_large_payload_is_stream() {
        let big = vec![7u8; MAX_DATAGRAM_PAYLOAD + 1];
        let env = TaskEnvelope::encode(&big).unwrap();
        assert_eq!(env.transfer(), Transfer::Stream);
        let back: Vec<u8> = env.decode().unwrap();
        assert_eq!(back.len(), big.len());
    }

    #[test]
    fn test_transfer_boundary() {
        assert_eq!(Transfer::for_len(MAX_DATAGRAM_PAYLOAD), Transfer::Datagram);
        assert_eq!(Transfer::for_len(MAX_DATAGRAM_PAYLOAD + 1), Transfer::Stream);
    }
}
