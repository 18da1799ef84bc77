//! Newtype wrappers for the overlay's protocol fields.
//!
//! These types prevent accidental mixing of the byte arrays the protocol
//! passes around: a node key is not a path identifier, even though both
//! are fixed-size byte strings.

use core::fmt;

use crate::error::InvalidLength;
use crate::wire;

/// Helper to write lowercase hex.
fn fmt_hex(bytes: &[u8], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for byte in bytes {
        write!(f, "{:02x}", byte)?;
    }
    Ok(())
}

/// A 32-byte Ed25519 public key.
///
/// Keys are totally ordered by unsigned lexicographic byte comparison,
/// which is the order the snake ring is threaded in.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[must_use]
pub struct PublicKey(pub(crate) [u8; 32]);

impl PublicKey {
    pub const SIZE: usize = 32;

    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = InvalidLength;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| InvalidLength {
            expected: 32,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_hex(&self.0, f)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey(")?;
        fmt_hex(&self.0[..4], f)?;
        write!(f, "..)")
    }
}

/// An 8-byte opaque path identifier, random per bootstrap attempt.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[must_use]
pub struct PathId(pub(crate) [u8; 8]);

impl PathId {
    pub const SIZE: usize = 8;

    pub const fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh random path identifier.
    pub fn random() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl AsRef<[u8]> for PathId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for PathId {
    type Error = InvalidLength;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 8] = bytes.try_into().map_err(|_| InvalidLength {
            expected: 8,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_hex(&self.0, f)
    }
}

impl fmt::Debug for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathId(")?;
        fmt_hex(&self.0, f)?;
        write!(f, ")")
    }
}

/// The monotonic sequence number of a root announcement.
///
/// Encoded on the wire as a varu64; [`RootSequence::wire_len`] reports the
/// encoded size so payload builders can size their buffers.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[must_use]
pub struct RootSequence(pub u64);

impl RootSequence {
    /// Number of bytes this sequence occupies when varu64-encoded.
    #[must_use]
    pub fn wire_len(&self) -> usize {
        wire::varu64_len(self.0)
    }
}

impl fmt::Display for RootSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for RootSequence {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// A node's coordinates in the spanning tree: the switch ports walked
/// from the root down to the node.
///
/// The tree itself is maintained elsewhere; the snake core only carries
/// coordinates opaquely in frame headers and compares them for equality.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
#[must_use]
pub struct Coordinates(pub(crate) Vec<u64>);

impl Coordinates {
    pub const fn new(ports: Vec<u64>) -> Self {
        Self(ports)
    }

    #[must_use]
    pub fn ports(&self) -> &[u64] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<u64>> for Coordinates {
    fn from(ports: Vec<u64>) -> Self {
        Self(ports)
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, port) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{port}")?;
        }
        write!(f, "]")
    }
}

impl fmt::Debug for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coordinates{self}")
    }
}
