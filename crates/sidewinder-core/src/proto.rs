//! Snake protocol payload codecs.
//!
//! Four payloads ride inside frames: bootstrap, bootstrap ACK, setup, and
//! teardown. All carry fixed-width keys and path ids plus a varu64 root
//! sequence; the bootstrap payload orders its fields differently from the
//! ACK and setup payloads, and the codec keeps that asymmetry.

use crate::error::WireError;
use crate::types::{PathId, PublicKey, RootSequence};
use crate::wire::{read_varu64, write_varu64};

/// Self-addressed probe searching for a node's ascending neighbour.
///
/// Layout: `root_public_key (32B) | root_sequence (varu64) | path_id (8B)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct Bootstrap {
    pub root_public_key: PublicKey,
    pub root_sequence: RootSequence,
    pub path_id: PathId,
}

/// Reply to a bootstrap, carrying the responder's root view.
///
/// Layout: `path_id (8B) | root_public_key (32B) | root_sequence (varu64)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct BootstrapAck {
    pub path_id: PathId,
    pub root_public_key: PublicKey,
    pub root_sequence: RootSequence,
}

/// Installs a path on intermediate nodes and at the terminus.
///
/// Layout: `path_id (8B) | root_public_key (32B) | root_sequence (varu64)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct Setup {
    pub path_id: PathId,
    pub root_public_key: PublicKey,
    pub root_sequence: RootSequence,
}

/// Removes a path's entries; the path key travels in the frame header.
///
/// Layout: `path_id (8B)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct Teardown {
    pub path_id: PathId,
}

fn write_key(out: &mut [u8], at: usize, key: &PublicKey) -> usize {
    out[at..at + PublicKey::SIZE].copy_from_slice(key.as_ref());
    at + PublicKey::SIZE
}

fn write_path_id(out: &mut [u8], at: usize, id: &PathId) -> usize {
    out[at..at + PathId::SIZE].copy_from_slice(id.as_ref());
    at + PathId::SIZE
}

fn write_sequence(out: &mut [u8], at: usize, seq: RootSequence) -> usize {
    let mut buf = Vec::with_capacity(10);
    write_varu64(&mut buf, seq.0);
    out[at..at + buf.len()].copy_from_slice(&buf);
    at + buf.len()
}

fn read_key(raw: &[u8], at: &mut usize) -> Result<PublicKey, WireError> {
    let end = *at + PublicKey::SIZE;
    if raw.len() < end {
        return Err(WireError::TooShort {
            min: end,
            actual: raw.len(),
        });
    }
    let key = PublicKey::try_from(&raw[*at..end]).expect("slice is exactly 32 bytes");
    *at = end;
    Ok(key)
}

fn read_path_id(raw: &[u8], at: &mut usize) -> Result<PathId, WireError> {
    let end = *at + PathId::SIZE;
    if raw.len() < end {
        return Err(WireError::TooShort {
            min: end,
            actual: raw.len(),
        });
    }
    let id = PathId::try_from(&raw[*at..end]).expect("slice is exactly 8 bytes");
    *at = end;
    Ok(id)
}

fn read_sequence(raw: &[u8], at: &mut usize) -> Result<RootSequence, WireError> {
    let (value, used) = read_varu64(&raw[*at..])?;
    *at += used;
    Ok(RootSequence(value))
}

fn ensure_room(out: &[u8], need: usize) -> Result<(), WireError> {
    if out.len() < need {
        return Err(WireError::BufferTooSmall {
            need,
            have: out.len(),
        });
    }
    Ok(())
}

fn ensure_consumed(raw: &[u8], at: usize) -> Result<(), WireError> {
    if raw.len() > at {
        return Err(WireError::TrailingBytes(raw.len() - at));
    }
    Ok(())
}

impl Bootstrap {
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        PublicKey::SIZE + self.root_sequence.wire_len() + PathId::SIZE
    }

    /// Marshal into `out`, returning the number of bytes written.
    pub fn encode_into(&self, out: &mut [u8]) -> Result<usize, WireError> {
        ensure_room(out, self.encoded_len())?;
        let at = write_key(out, 0, &self.root_public_key);
        let at = write_sequence(out, at, self.root_sequence);
        let at = write_path_id(out, at, &self.path_id);
        Ok(at)
    }

    pub fn decode(raw: &[u8]) -> Result<Self, WireError> {
        let mut at = 0;
        let root_public_key = read_key(raw, &mut at)?;
        let root_sequence = read_sequence(raw, &mut at)?;
        let path_id = read_path_id(raw, &mut at)?;
        ensure_consumed(raw, at)?;
        Ok(Self {
            root_public_key,
            root_sequence,
            path_id,
        })
    }
}

impl BootstrapAck {
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        PathId::SIZE + PublicKey::SIZE + self.root_sequence.wire_len()
    }

    /// Marshal into `out`, returning the number of bytes written.
    pub fn encode_into(&self, out: &mut [u8]) -> Result<usize, WireError> {
        ensure_room(out, self.encoded_len())?;
        let at = write_path_id(out, 0, &self.path_id);
        let at = write_key(out, at, &self.root_public_key);
        let at = write_sequence(out, at, self.root_sequence);
        Ok(at)
    }

    pub fn decode(raw: &[u8]) -> Result<Self, WireError> {
        let mut at = 0;
        let path_id = read_path_id(raw, &mut at)?;
        let root_public_key = read_key(raw, &mut at)?;
        let root_sequence = read_sequence(raw, &mut at)?;
        ensure_consumed(raw, at)?;
        Ok(Self {
            path_id,
            root_public_key,
            root_sequence,
        })
    }
}

impl Setup {
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        PathId::SIZE + PublicKey::SIZE + self.root_sequence.wire_len()
    }

    /// Marshal into `out`, returning the number of bytes written.
    pub fn encode_into(&self, out: &mut [u8]) -> Result<usize, WireError> {
        ensure_room(out, self.encoded_len())?;
        let at = write_path_id(out, 0, &self.path_id);
        let at = write_key(out, at, &self.root_public_key);
        let at = write_sequence(out, at, self.root_sequence);
        Ok(at)
    }

    pub fn decode(raw: &[u8]) -> Result<Self, WireError> {
        let mut at = 0;
        let path_id = read_path_id(raw, &mut at)?;
        let root_public_key = read_key(raw, &mut at)?;
        let root_sequence = read_sequence(raw, &mut at)?;
        ensure_consumed(raw, at)?;
        Ok(Self {
            path_id,
            root_public_key,
            root_sequence,
        })
    }
}

impl Teardown {
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        PathId::SIZE
    }

    /// Marshal into `out`, returning the number of bytes written.
    pub fn encode_into(&self, out: &mut [u8]) -> Result<usize, WireError> {
        ensure_room(out, self.encoded_len())?;
        Ok(write_path_id(out, 0, &self.path_id))
    }

    pub fn decode(raw: &[u8]) -> Result<Self, WireError> {
        let mut at = 0;
        let path_id = read_path_id(raw, &mut at)?;
        Ok(Self { path_id })
    }
}
