//! Frame header codec and varu64 encoding.
//!
//! Frame layout:
//!   [u8: frame type]
//!   [coordinates: destination]
//!   [32B: destination key]
//!   [coordinates: source]
//!   [32B: source key]
//!   [payload: remainder]
//!
//! Coordinates are a varu64 port count followed by one varu64 per port.
//! varu64 is Go's `binary.Uvarint` encoding: 7 bits per byte, MSB set on
//! every byte except the last.

use crate::error::WireError;
use crate::types::{Coordinates, PathId, PublicKey};

/// Maximum encoded size of a frame, header and payload included.
pub const MAX_FRAME_SIZE: usize = 65535;

/// Frame types carried on the wire.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    /// Greedily key-routed traffic.
    Traffic = 0,
    /// Self-addressed probe searching for the ascending neighbour.
    Bootstrap = 1,
    /// Reply to a bootstrap, routed back through tree space.
    BootstrapAck = 2,
    /// Installs a path's intermediate and terminal entries.
    Setup = 3,
    /// Removes a path's entries.
    Teardown = 4,
}

impl TryFrom<u8> for FrameType {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Traffic),
            1 => Ok(Self::Bootstrap),
            2 => Ok(Self::BootstrapAck),
            3 => Ok(Self::Setup),
            4 => Ok(Self::Teardown),
            other => Err(WireError::UnknownFrameType(other)),
        }
    }
}

// -- varu64 encoding (Go binary.Uvarint compatible) ----------------------

/// Number of bytes `x` occupies when varu64-encoded.
#[must_use]
pub fn varu64_len(x: u64) -> usize {
    let mut len = 1;
    let mut x = x;
    while x >= 0x80 {
        x >>= 7;
        len += 1;
    }
    len
}

/// Append a varu64 to `out`.
pub fn write_varu64(out: &mut Vec<u8>, mut x: u64) {
    while x >= 0x80 {
        out.push((x as u8) | 0x80);
        x >>= 7;
    }
    out.push(x as u8);
}

/// Decode a varu64 from the front of `bytes`. Returns (value, bytes consumed).
pub fn read_varu64(bytes: &[u8]) -> Result<(u64, usize), WireError> {
    let mut x: u64 = 0;
    let mut shift: u32 = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if i >= 10 {
            return Err(WireError::InvalidVaru64);
        }
        if b < 0x80 {
            if i == 9 && b > 1 {
                return Err(WireError::InvalidVaru64);
            }
            return Ok((x | (u64::from(b)) << shift, i + 1));
        }
        x |= u64::from(b & 0x7F) << shift;
        shift += 7;
    }
    Err(WireError::InvalidVaru64)
}

// -- Coordinates ---------------------------------------------------------

impl Coordinates {
    /// Encoded size in bytes: varu64 count plus one varu64 per port.
    #[must_use]
    pub fn wire_len(&self) -> usize {
        varu64_len(self.0.len() as u64) + self.0.iter().map(|&p| varu64_len(p)).sum::<usize>()
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        write_varu64(out, self.0.len() as u64);
        for &port in &self.0 {
            write_varu64(out, port);
        }
    }

    fn read_from(bytes: &[u8]) -> Result<(Self, usize), WireError> {
        let (count, mut offset) = read_varu64(bytes)?;
        // A coordinate list longer than the frame could even carry is bogus.
        if count as usize > MAX_FRAME_SIZE {
            return Err(WireError::InvalidVaru64);
        }
        let mut ports = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (port, used) = read_varu64(&bytes[offset..])?;
            offset += used;
            ports.push(port);
        }
        Ok((Self(ports), offset))
    }
}

// -- Frame ---------------------------------------------------------------

/// A protocol frame: typed header plus opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct Frame {
    pub frame_type: FrameType,
    pub destination: Coordinates,
    pub destination_key: PublicKey,
    pub source: Coordinates,
    pub source_key: PublicKey,
    pub payload: Vec<u8>,
}

impl Frame {
    /// A blank frame of the given type, all other fields zeroed.
    pub fn new(frame_type: FrameType) -> Self {
        Self {
            frame_type,
            destination: Coordinates::default(),
            destination_key: PublicKey::default(),
            source: Coordinates::default(),
            source_key: PublicKey::default(),
            payload: Vec::new(),
        }
    }

    /// A teardown frame for the given path.
    pub fn teardown(path_key: PublicKey, path_id: PathId) -> Self {
        let mut frame = Frame::new(FrameType::Teardown);
        frame.destination_key = path_key;
        frame.payload = path_id.as_bytes().to_vec();
        frame
    }

    /// Encoded size in bytes.
    #[must_use]
    pub fn wire_len(&self) -> usize {
        1 + self.destination.wire_len()
            + PublicKey::SIZE
            + self.source.wire_len()
            + PublicKey::SIZE
            + self.payload.len()
    }

    /// Serialize to wire format.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let len = self.wire_len();
        if len > MAX_FRAME_SIZE {
            return Err(WireError::FrameTooLarge(len));
        }
        let mut out = Vec::with_capacity(len);
        out.push(self.frame_type as u8);
        self.destination.write_to(&mut out);
        out.extend_from_slice(self.destination_key.as_ref());
        self.source.write_to(&mut out);
        out.extend_from_slice(self.source_key.as_ref());
        out.extend_from_slice(&self.payload);
        Ok(out)
    }

    /// Parse a frame from wire bytes, consuming the whole slice.
    pub fn decode(raw: &[u8]) -> Result<Self, WireError> {
        if raw.len() > MAX_FRAME_SIZE {
            return Err(WireError::FrameTooLarge(raw.len()));
        }
        // Minimum: type byte, two empty coordinate sets, two keys.
        let min = 1 + 1 + PublicKey::SIZE + 1 + PublicKey::SIZE;
        if raw.len() < min {
            return Err(WireError::TooShort {
                min,
                actual: raw.len(),
            });
        }

        let frame_type = FrameType::try_from(raw[0])?;
        let mut offset = 1;

        let (destination, used) = Coordinates::read_from(&raw[offset..])?;
        offset += used;
        let destination_key = take_key(raw, &mut offset)?;

        let (source, used) = Coordinates::read_from(&raw[offset..])?;
        offset += used;
        let source_key = take_key(raw, &mut offset)?;

        Ok(Self {
            frame_type,
            destination,
            destination_key,
            source,
            source_key,
            payload: raw[offset..].to_vec(),
        })
    }
}

fn take_key(raw: &[u8], offset: &mut usize) -> Result<PublicKey, WireError> {
    let end = *offset + PublicKey::SIZE;
    if raw.len() < end {
        return Err(WireError::TooShort {
            min: end,
            actual: raw.len(),
        });
    }
    let key = PublicKey::try_from(&raw[*offset..end]).expect("slice is exactly 32 bytes");
    *offset = end;
    Ok(key)
}
