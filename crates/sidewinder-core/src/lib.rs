//! Core types and wire formats for the sidewinder overlay network.
//!
//! Every node holds an Ed25519 public key. The overlay threads all nodes
//! into a single virtual ring ("snake") ordered by key, and routes frames
//! greedily toward a destination key. This crate provides the pieces every
//! other layer shares:
//!
//! - [`types`] - key, path-id, and coordinate newtypes
//! - [`order`] - the ring ordering predicates
//! - [`wire`] - varu64 encoding and the frame header codec
//! - [`proto`] - bootstrap / setup / teardown payload codecs
//! - [`identity`] - Ed25519 identity wrapper
//! - [`pool`] - reusable frame scratch buffers

pub mod error;
pub mod identity;
pub mod order;
pub mod pool;
pub mod proto;
pub mod types;
pub mod wire;

pub use error::{InvalidLength, WireError};
pub use order::{dht_ordered, less_than};
pub use types::{Coordinates, PathId, PublicKey, RootSequence};
pub use wire::{Frame, FrameType, MAX_FRAME_SIZE};
