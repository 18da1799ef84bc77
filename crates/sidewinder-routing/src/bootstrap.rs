//! Bootstrap issue and handling.
//!
//! A node discovers its ascending neighbour by sending a self-addressed
//! bootstrap probe into key space. Whichever node the probe dead-ends at
//! answers with an ACK through tree space; the prober responds to an
//! acceptable ACK with a setup frame that installs the path hop by hop.

use sidewinder_core::pool::frame_pool;
use sidewinder_core::proto::{Bootstrap, BootstrapAck, Setup};
use sidewinder_core::{dht_ordered, less_than, Frame, FrameType, PathId};

use crate::env::{PeerId, SnekDriver};
use crate::error::SnekError;
use crate::router::SnekRouter;
use crate::table::{SnakeEntry, SnakeIndex};

impl SnekRouter {
    /// Send a bootstrap probe if the snake needs one.
    ///
    /// Skips quietly when there is no parent, or when the current
    /// ascending path was installed under the root announcement still in
    /// force. Marshalling or routing failures abandon the attempt; the
    /// next maintenance tick retries.
    pub fn bootstrap_now<D: SnekDriver>(&mut self, driver: &mut D, now: u64) {
        if driver.parent().is_none() {
            return;
        }
        let root = driver.root_announcement();
        if let Some(asc) = self.ascending_entry() {
            if driver.is_started(asc.source)
                && asc.root_public_key == root.root_public_key
                && asc.root_sequence == root.root_sequence
            {
                return;
            }
        }

        let bootstrap = Bootstrap {
            root_public_key: root.root_public_key,
            root_sequence: root.root_sequence,
            path_id: PathId::random(),
        };
        let mut scratch = frame_pool().get();
        let Ok(len) = bootstrap.encode_into(&mut scratch[..]) else {
            return;
        };

        let mut send = Frame::new(FrameType::Bootstrap);
        send.destination_key = self.public_key;
        send.source = driver.coordinates();
        send.payload = scratch[..len].to_vec();

        let local = driver.local();
        if let Some(next) = self.next_hop_snek(driver, local, &send, true, now) {
            tracing::debug!(path = %bootstrap.path_id, to = %next, "sending bootstrap");
            driver.push(next, send);
        }
    }

    /// Answer a bootstrap probe that dead-ended here.
    ///
    /// The ACK carries our root view and the probe's path id, addressed
    /// back to the originator's tree coordinates.
    pub fn handle_bootstrap<D: SnekDriver>(
        &mut self,
        driver: &mut D,
        _from: PeerId,
        rx: &Frame,
    ) -> Result<(), SnekError> {
        let bootstrap = Bootstrap::decode(&rx.payload)?;
        let root = driver.root_announcement();
        let ack = BootstrapAck {
            path_id: bootstrap.path_id,
            root_public_key: root.root_public_key,
            root_sequence: root.root_sequence,
        };
        let mut scratch = frame_pool().get();
        let len = ack.encode_into(&mut scratch[..])?;

        let mut send = Frame::new(FrameType::BootstrapAck);
        send.destination = rx.source.clone();
        send.destination_key = rx.destination_key;
        send.source = driver.coordinates();
        send.source_key = self.public_key;
        send.payload = scratch[..len].to_vec();

        let local = driver.local();
        if let Some(next) = driver.tree_next_hop(local, &send) {
            driver.push(next, send);
        }
        Ok(())
    }

    /// Process a bootstrap ACK addressed to us.
    ///
    /// Decides whether the responder is a better ascending neighbour than
    /// the one we have, and if so sends the setup and installs the new
    /// ascending entry. The replaced remote path is the remote side's
    /// responsibility; our own stale locally-originated paths are torn
    /// down here.
    pub fn handle_bootstrap_ack<D: SnekDriver>(
        &mut self,
        driver: &mut D,
        _from: PeerId,
        rx: &Frame,
        now: u64,
    ) -> Result<(), SnekError> {
        let ack = BootstrapAck::decode(&rx.payload)?;
        let root = driver.root_announcement();

        let update = if rx.source_key == self.public_key {
            // An ACK from ourselves means a forwarding mistake or a
            // routing loop somewhere; never act on it.
            false
        } else if ack.root_public_key != root.root_public_key {
            // Different root, tree-space forwarding would not line up.
            false
        } else if ack.root_sequence != root.root_sequence {
            false
        } else if let Some(asc) = self.ascending_entry().filter(|entry| entry.valid(now)) {
            if asc.origin == rx.source_key && ack.path_id != asc.index.path_id {
                // Same ascending node on a fresh path id: refresh.
                true
            } else {
                // Accept only a node strictly closer than the current one.
                dht_ordered(&self.public_key, &rx.source_key, &asc.origin)
            }
        } else {
            // No ascending, or it expired: any higher key will do.
            less_than(&self.public_key, &rx.source_key)
        };
        if !update {
            tracing::trace!(from_key = %rx.source_key, "ignoring bootstrap ack");
            return Ok(());
        }

        let setup = Setup {
            path_id: ack.path_id,
            root_public_key: root.root_public_key,
            root_sequence: root.root_sequence,
        };
        let mut scratch = frame_pool().get();
        let len = setup.encode_into(&mut scratch[..])?;

        let mut send = Frame::new(FrameType::Setup);
        send.destination = rx.source.clone();
        send.destination_key = rx.source_key;
        send.source_key = self.public_key;
        send.payload = scratch[..len].to_vec();

        let local = driver.local();
        let Some(next) = driver.tree_next_hop(local, &send) else {
            return Ok(());
        };
        if next == local || !driver.push(next, send) {
            // Nothing was forwarded, so nothing may be installed.
            return Ok(());
        }

        let index = SnakeIndex {
            public_key: self.public_key,
            path_id: ack.path_id,
        };
        let entry = SnakeEntry {
            index,
            origin: rx.source_key,
            source: local,
            destination: next,
            last_seen: now,
            root_public_key: ack.root_public_key,
            root_sequence: ack.root_sequence,
        };

        // The remote side cleans up the path this one replaces, but any
        // locally-originated paths to nodes other than the new ascending
        // must not be left lying around.
        let stale: Vec<SnakeIndex> = self
            .table
            .iter()
            .filter(|(idx, e)| e.source == local && idx.public_key != rx.source_key)
            .map(|(idx, _)| *idx)
            .collect();
        for stale_index in stale {
            self.send_teardown_for_existing_path(
                driver,
                local,
                stale_index.public_key,
                stale_index.path_id,
                now,
            );
        }

        tracing::debug!(ascending = %entry.origin, path = %index.path_id, "installing ascending path");
        self.table.insert(entry);
        self.ascending = Some(index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockDriver;
    use sidewinder_core::{PublicKey, RootSequence};

    fn key(seed: u8) -> PublicKey {
        let mut bytes = [0u8; 32];
        bytes[0] = seed;
        PublicKey::new(bytes)
    }

    fn pid(seed: u8) -> PathId {
        PathId::new([seed; 8])
    }

    /// An ACK frame as node `from_key` would send it back to us.
    fn ack_frame(from_key: PublicKey, self_key: PublicKey, root: PublicKey, seq: u64, path_id: PathId) -> Frame {
        let ack = BootstrapAck {
            path_id,
            root_public_key: root,
            root_sequence: RootSequence(seq),
        };
        let mut buf = [0u8; 64];
        let len = ack.encode_into(&mut buf).unwrap();
        let mut frame = Frame::new(FrameType::BootstrapAck);
        frame.destination_key = self_key;
        frame.source_key = from_key;
        frame.payload = buf[..len].to_vec();
        frame
    }

    #[test]
    fn bootstrap_requires_parent() {
        let mut router = SnekRouter::new(key(0x30));
        let mut driver = MockDriver::new();
        driver.set_root(key(0xFF), 1);
        router.bootstrap_now(&mut driver, 1000);
        assert!(driver.outbox.is_empty());
    }

    #[test]
    fn bootstrap_skipped_when_converged() {
        let self_key = key(0x30);
        let mut router = SnekRouter::new(self_key);
        let mut driver = MockDriver::new();
        let up = driver.add_peer(key(0x50));
        driver.set_parent(up);
        driver.set_root(key(0xFF), 7);
        let local = driver.local_id();

        let index = SnakeIndex {
            public_key: self_key,
            path_id: pid(0xAA),
        };
        router.table.insert(SnakeEntry {
            index,
            origin: key(0x50),
            source: local,
            destination: up,
            last_seen: 1000,
            root_public_key: key(0xFF),
            root_sequence: RootSequence(7),
        });
        router.ascending = Some(index);

        router.bootstrap_now(&mut driver, 1000);
        assert!(driver.outbox.is_empty());
    }

    #[test]
    fn bootstrap_sent_when_root_moved_on() {
        let self_key = key(0x30);
        let mut router = SnekRouter::new(self_key);
        let mut driver = MockDriver::new();
        let up = driver.add_peer(key(0x50));
        driver.set_parent(up);
        driver.set_root(key(0xFF), 8);
        driver.set_ancestry(up, &[key(0xFF)]);
        let local = driver.local_id();

        let index = SnakeIndex {
            public_key: self_key,
            path_id: pid(0xAA),
        };
        router.table.insert(SnakeEntry {
            index,
            origin: key(0x50),
            source: local,
            destination: up,
            last_seen: 1000,
            root_public_key: key(0xFF),
            root_sequence: RootSequence(7), // installed under the old sequence
        });
        router.ascending = Some(index);

        router.bootstrap_now(&mut driver, 1000);
        assert_eq!(driver.outbox.len(), 1);
        let (_, frame) = &driver.outbox[0];
        assert_eq!(frame.frame_type, FrameType::Bootstrap);
        assert_eq!(frame.destination_key, self_key);
        let bootstrap = Bootstrap::decode(&frame.payload).unwrap();
        assert_eq!(bootstrap.root_public_key, key(0xFF));
        assert_eq!(bootstrap.root_sequence, RootSequence(8));
    }

    #[test]
    fn handle_bootstrap_acks_back_through_tree() {
        let self_key = key(0x50);
        let mut router = SnekRouter::new(self_key);
        let mut driver = MockDriver::new();
        let p1 = driver.add_peer(key(0x30));
        driver.set_root(key(0xFF), 3);
        driver.set_tree_hop(Some(p1));

        let bootstrap = Bootstrap {
            root_public_key: key(0xFF),
            root_sequence: RootSequence(3),
            path_id: pid(0x11),
        };
        let mut buf = [0u8; 64];
        let len = bootstrap.encode_into(&mut buf).unwrap();
        let mut rx = Frame::new(FrameType::Bootstrap);
        rx.destination_key = key(0x30); // the prober's own key
        rx.source = vec![1, 2].into();
        rx.payload = buf[..len].to_vec();

        router.handle_bootstrap(&mut driver, p1, &rx).unwrap();

        assert_eq!(driver.outbox.len(), 1);
        let (peer, frame) = &driver.outbox[0];
        assert_eq!(*peer, p1);
        assert_eq!(frame.frame_type, FrameType::BootstrapAck);
        assert_eq!(frame.destination_key, key(0x30));
        assert_eq!(frame.destination, vec![1, 2].into());
        assert_eq!(frame.source_key, self_key);
        let ack = BootstrapAck::decode(&frame.payload).unwrap();
        assert_eq!(ack.path_id, pid(0x11));
        assert_eq!(ack.root_public_key, key(0xFF));
    }

    #[test]
    fn handle_bootstrap_malformed_payload_is_error() {
        let mut router = SnekRouter::new(key(0x50));
        let mut driver = MockDriver::new();
        let p1 = driver.add_peer(key(0x30));

        let mut rx = Frame::new(FrameType::Bootstrap);
        rx.payload = vec![0u8; 10];
        assert!(router.handle_bootstrap(&mut driver, p1, &rx).is_err());
        assert!(driver.outbox.is_empty());
    }

    #[test]
    fn ack_from_self_is_ignored() {
        let self_key = key(0x30);
        let mut router = SnekRouter::new(self_key);
        let mut driver = MockDriver::new();
        let p1 = driver.add_peer(key(0x50));
        driver.set_root(key(0xFF), 1);
        driver.set_tree_hop(Some(p1));

        let rx = ack_frame(self_key, self_key, key(0xFF), 1, pid(0x11));
        router.handle_bootstrap_ack(&mut driver, p1, &rx, 1000).unwrap();
        assert!(driver.outbox.is_empty());
        assert!(router.ascending.is_none());
    }

    #[test]
    fn ack_with_wrong_root_is_ignored() {
        let self_key = key(0x30);
        let mut router = SnekRouter::new(self_key);
        let mut driver = MockDriver::new();
        let p1 = driver.add_peer(key(0x50));
        driver.set_root(key(0xFF), 1);
        driver.set_tree_hop(Some(p1));

        let rx = ack_frame(key(0x50), self_key, key(0xEE), 1, pid(0x11));
        router.handle_bootstrap_ack(&mut driver, p1, &rx, 1000).unwrap();
        assert!(driver.outbox.is_empty());

        let rx = ack_frame(key(0x50), self_key, key(0xFF), 2, pid(0x11));
        router.handle_bootstrap_ack(&mut driver, p1, &rx, 1000).unwrap();
        assert!(driver.outbox.is_empty());
    }

    #[test]
    fn ack_from_lower_key_is_ignored_without_ascending() {
        let self_key = key(0x30);
        let mut router = SnekRouter::new(self_key);
        let mut driver = MockDriver::new();
        let p1 = driver.add_peer(key(0x10));
        driver.set_root(key(0xFF), 1);
        driver.set_tree_hop(Some(p1));

        let rx = ack_frame(key(0x10), self_key, key(0xFF), 1, pid(0x11));
        router.handle_bootstrap_ack(&mut driver, p1, &rx, 1000).unwrap();
        assert!(driver.outbox.is_empty());
        assert!(router.ascending.is_none());
    }

    #[test]
    fn ack_from_higher_key_installs_ascending() {
        let self_key = key(0x30);
        let mut router = SnekRouter::new(self_key);
        let mut driver = MockDriver::new();
        let p1 = driver.add_peer(key(0x50));
        driver.set_root(key(0xFF), 1);
        driver.set_tree_hop(Some(p1));

        let rx = ack_frame(key(0x50), self_key, key(0xFF), 1, pid(0x11));
        router.handle_bootstrap_ack(&mut driver, p1, &rx, 1234).unwrap();

        // Setup went out toward the responder.
        assert_eq!(driver.outbox.len(), 1);
        let (peer, frame) = &driver.outbox[0];
        assert_eq!(*peer, p1);
        assert_eq!(frame.frame_type, FrameType::Setup);
        assert_eq!(frame.destination_key, key(0x50));
        assert_eq!(frame.source_key, self_key);

        // Ascending installed, keyed under our own key.
        let asc = router.ascending_entry().unwrap();
        assert_eq!(asc.index.public_key, self_key);
        assert_eq!(asc.index.path_id, pid(0x11));
        assert_eq!(asc.origin, key(0x50));
        assert_eq!(asc.source, driver.local_id());
        assert_eq!(asc.destination, p1);
        assert_eq!(asc.last_seen, 1234);
    }

    #[test]
    fn ack_not_installed_without_tree_route() {
        let self_key = key(0x30);
        let mut router = SnekRouter::new(self_key);
        let mut driver = MockDriver::new();
        let p1 = driver.add_peer(key(0x50));
        driver.set_root(key(0xFF), 1);
        driver.set_tree_hop(None);

        let rx = ack_frame(key(0x50), self_key, key(0xFF), 1, pid(0x11));
        router.handle_bootstrap_ack(&mut driver, p1, &rx, 1000).unwrap();
        assert!(driver.outbox.is_empty());
        assert!(router.ascending.is_none());
        assert!(router.table.is_empty());
    }

    #[test]
    fn ack_not_installed_when_queue_full() {
        let self_key = key(0x30);
        let mut router = SnekRouter::new(self_key);
        let mut driver = MockDriver::new();
        let p1 = driver.add_peer(key(0x50));
        driver.set_root(key(0xFF), 1);
        driver.set_tree_hop(Some(p1));
        driver.fail_pushes_to(p1);

        let rx = ack_frame(key(0x50), self_key, key(0xFF), 1, pid(0x11));
        router.handle_bootstrap_ack(&mut driver, p1, &rx, 1000).unwrap();
        assert!(router.ascending.is_none());
        assert!(router.table.is_empty());
    }

    #[test]
    fn closer_ack_replaces_ascending() {
        // Scenario: ascending points at 0x70, then 0x50 answers. 0x50 sits
        // between us and 0x70 on the ring, so it wins.
        let self_key = key(0x10);
        let mut router = SnekRouter::new(self_key);
        let mut driver = MockDriver::new();
        let far = driver.add_peer(key(0x70));
        let near = driver.add_peer(key(0x50));
        driver.set_root(key(0xFF), 1);
        driver.set_tree_hop(Some(near));
        let local = driver.local_id();

        let old_index = SnakeIndex {
            public_key: self_key,
            path_id: pid(0xAA),
        };
        router.table.insert(SnakeEntry {
            index: old_index,
            origin: key(0x70),
            source: local,
            destination: far,
            last_seen: 1000,
            root_public_key: key(0xFF),
            root_sequence: RootSequence(1),
        });
        router.ascending = Some(old_index);

        let rx = ack_frame(key(0x50), self_key, key(0xFF), 1, pid(0xBB));
        router.handle_bootstrap_ack(&mut driver, near, &rx, 1001).unwrap();

        // New ascending to 0x50 under the new path id.
        let asc = router.ascending_entry().unwrap();
        assert_eq!(asc.origin, key(0x50));
        assert_eq!(asc.index.path_id, pid(0xBB));

        // Old path torn down exactly once, through its old destination.
        let teardowns: Vec<_> = driver
            .outbox
            .iter()
            .filter(|(_, f)| f.frame_type == FrameType::Teardown)
            .collect();
        assert_eq!(teardowns.len(), 1);
        assert_eq!(teardowns[0].0, far);
        assert_eq!(teardowns[0].1.destination_key, self_key);
        assert_eq!(teardowns[0].1.payload, pid(0xAA).as_bytes());
        assert!(!router.table.contains(&old_index));
    }

    #[test]
    fn refresh_from_same_ascending_node_updates_path_id() {
        let self_key = key(0x10);
        let mut router = SnekRouter::new(self_key);
        let mut driver = MockDriver::new();
        let up = driver.add_peer(key(0x50));
        driver.set_root(key(0xFF), 1);
        driver.set_tree_hop(Some(up));
        let local = driver.local_id();

        let old_index = SnakeIndex {
            public_key: self_key,
            path_id: pid(0xAA),
        };
        router.table.insert(SnakeEntry {
            index: old_index,
            origin: key(0x50),
            source: local,
            destination: up,
            last_seen: 1000,
            root_public_key: key(0xFF),
            root_sequence: RootSequence(1),
        });
        router.ascending = Some(old_index);

        let rx = ack_frame(key(0x50), self_key, key(0xFF), 1, pid(0xBB));
        router.handle_bootstrap_ack(&mut driver, up, &rx, 1001).unwrap();

        let asc = router.ascending_entry().unwrap();
        assert_eq!(asc.index.path_id, pid(0xBB));
        assert_eq!(asc.origin, key(0x50));
        assert!(!router.table.contains(&old_index));
    }

    #[test]
    fn farther_ack_does_not_replace_ascending() {
        let self_key = key(0x10);
        let mut router = SnekRouter::new(self_key);
        let mut driver = MockDriver::new();
        let near = driver.add_peer(key(0x30));
        let far = driver.add_peer(key(0x70));
        driver.set_root(key(0xFF), 1);
        driver.set_tree_hop(Some(far));
        let local = driver.local_id();

        let index = SnakeIndex {
            public_key: self_key,
            path_id: pid(0xAA),
        };
        router.table.insert(SnakeEntry {
            index,
            origin: key(0x30),
            source: local,
            destination: near,
            last_seen: 1000,
            root_public_key: key(0xFF),
            root_sequence: RootSequence(1),
        });
        router.ascending = Some(index);

        let rx = ack_frame(key(0x70), self_key, key(0xFF), 1, pid(0xBB));
        router.handle_bootstrap_ack(&mut driver, far, &rx, 1001).unwrap();

        assert!(driver.outbox.is_empty());
        assert_eq!(router.ascending_entry().unwrap().origin, key(0x30));
    }
}
