//! The collaborator seam between the snake core and the rest of the router.
//!
//! The core never owns peers, the spanning tree, or outbound links. It
//! sees them through [`SnekDriver`]: a registry of copyable peer handles,
//! the current root announcement, tree ancestry per peer, a tree-space
//! next-hop routine, and a way to enqueue frames. Entries in the routing
//! table store bare [`PeerId`]s; the driver resolves them on every use and
//! treats a vanished handle as "peer gone, drop frame".

use core::fmt;

use sidewinder_core::{Coordinates, Frame, PublicKey, RootSequence};

/// Handle to a peer link, resolved by the driver on each use.
///
/// The driver reserves one id for the local pseudo-peer, returned by
/// [`SnekDriver::local`]; frames "forwarded" to it are delivered locally.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[must_use]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.0)
    }
}

/// One hop of a root announcement's signature chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AncestrySignature {
    /// Key of the ancestor that signed the announcement at this hop.
    pub public_key: PublicKey,
    /// Port the announcement left that ancestor on.
    pub destination_port: u64,
}

/// Snapshot of a spanning-tree root announcement.
///
/// The tree protocol that produces these lives outside the snake core;
/// handlers only compare the root key and sequence and walk the
/// signature chain for next-hop candidates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RootAnnouncement {
    pub root_public_key: PublicKey,
    pub root_sequence: RootSequence,
    pub signatures: Vec<AncestrySignature>,
}

/// Everything the snake core consumes from the router around it.
///
/// Read methods take `&self`; `tree_next_hop` and `push` may mutate
/// driver-side state (queues, counters) and take `&mut self`.
pub trait SnekDriver {
    /// The local pseudo-peer handle.
    fn local(&self) -> PeerId;

    /// The current spanning-tree parent, if any.
    fn parent(&self) -> Option<PeerId>;

    /// The root announcement this node currently operates under.
    fn root_announcement(&self) -> RootAnnouncement;

    /// This node's current tree coordinates.
    fn coordinates(&self) -> Coordinates;

    /// Peers a root announcement has been received from.
    fn peers(&self) -> Vec<PeerId>;

    /// Whether the peer's link is up and past its handshake.
    ///
    /// The local pseudo-peer is always started.
    fn is_started(&self, peer: PeerId) -> bool;

    /// The peer's public key, or `None` if the handle no longer resolves.
    fn peer_key(&self, peer: PeerId) -> Option<PublicKey>;

    /// The signature chain of the peer's announcement, root first.
    /// Empty if the handle no longer resolves.
    fn ancestry(&self, peer: PeerId) -> Vec<AncestrySignature>;

    /// Tree-space next hop for `frame`, by destination coordinates.
    /// Returns the local pseudo-peer when the frame is already home.
    fn tree_next_hop(&mut self, from: PeerId, frame: &Frame) -> Option<PeerId>;

    /// Enqueue a frame on the peer's protocol queue.
    ///
    /// False when the queue is full or the handle no longer resolves; the
    /// frame is dropped either way.
    fn push(&mut self, peer: PeerId, frame: Frame) -> bool;
}
