//! Multi-node convergence: drive a star overlay until the snake settles,
//! then check the ascending links thread every node in key order.

use std::collections::VecDeque;

use sidewinder_core::{Coordinates, Frame, FrameType, PublicKey, RootSequence};
use sidewinder_routing::{
    AncestrySignature, PeerId, RootAnnouncement, SnekDriver, SnekRouter,
};

const LOCAL: PeerId = PeerId(0);

/// Driver for one node of a star overlay: node 0 is the hub and the
/// spanning-tree root, every other node hangs off it directly.
struct StarDriver {
    me: usize,
    keys: Vec<PublicKey>,
    outbox: Vec<(PeerId, Frame)>,
}

fn node_peer(index: usize) -> PeerId {
    PeerId(index as u64 + 1)
}

fn peer_node(peer: PeerId) -> usize {
    peer.0 as usize - 1
}

fn node_coords(index: usize) -> Coordinates {
    if index == 0 {
        Coordinates::default()
    } else {
        Coordinates::new(vec![index as u64])
    }
}

impl StarDriver {
    fn new(me: usize, keys: Vec<PublicKey>) -> Self {
        Self {
            me,
            keys,
            outbox: Vec::new(),
        }
    }

    fn chain(&self, node: usize) -> Vec<AncestrySignature> {
        let mut chain = vec![AncestrySignature {
            public_key: self.keys[0],
            destination_port: 1,
        }];
        if node != 0 {
            chain.push(AncestrySignature {
                public_key: self.keys[node],
                destination_port: node as u64,
            });
        }
        chain
    }
}

impl SnekDriver for StarDriver {
    fn local(&self) -> PeerId {
        LOCAL
    }

    fn parent(&self) -> Option<PeerId> {
        (self.me != 0).then(|| node_peer(0))
    }

    fn root_announcement(&self) -> RootAnnouncement {
        RootAnnouncement {
            root_public_key: self.keys[0],
            root_sequence: RootSequence(1),
            signatures: self.chain(self.me),
        }
    }

    fn coordinates(&self) -> Coordinates {
        node_coords(self.me)
    }

    fn peers(&self) -> Vec<PeerId> {
        if self.me == 0 {
            (1..self.keys.len()).map(node_peer).collect()
        } else {
            vec![node_peer(0)]
        }
    }

    fn is_started(&self, peer: PeerId) -> bool {
        peer == LOCAL || peer_node(peer) < self.keys.len()
    }

    fn peer_key(&self, peer: PeerId) -> Option<PublicKey> {
        self.keys.get(peer_node(peer)).copied()
    }

    fn ancestry(&self, peer: PeerId) -> Vec<AncestrySignature> {
        self.chain(peer_node(peer))
    }

    fn tree_next_hop(&mut self, _from: PeerId, frame: &Frame) -> Option<PeerId> {
        if frame.destination == node_coords(self.me) {
            return Some(LOCAL);
        }
        if self.me == 0 {
            let target = *frame.destination.ports().first()? as usize;
            (target < self.keys.len()).then(|| node_peer(target))
        } else {
            Some(node_peer(0))
        }
    }

    fn push(&mut self, peer: PeerId, frame: Frame) -> bool {
        self.outbox.push((peer, frame));
        true
    }
}

fn dispatch(router: &mut SnekRouter, driver: &mut StarDriver, from: PeerId, frame: Frame, now: u64) {
    match frame.frame_type {
        FrameType::Bootstrap => match router.next_hop_snek(driver, from, &frame, true, now) {
            Some(next) if next != LOCAL => {
                driver.push(next, frame);
            }
            _ => router
                .handle_bootstrap(driver, from, &frame)
                .expect("well-formed bootstrap"),
        },
        FrameType::BootstrapAck => {
            let next = driver.tree_next_hop(LOCAL, &frame);
            match next {
                Some(next) if next != LOCAL => {
                    driver.push(next, frame);
                }
                _ => router
                    .handle_bootstrap_ack(driver, from, &frame, now)
                    .expect("well-formed bootstrap ack"),
            }
        }
        FrameType::Setup => {
            let next = driver.tree_next_hop(LOCAL, &frame);
            router
                .handle_setup(driver, from, &frame, next, now)
                .expect("well-formed setup");
        }
        FrameType::Teardown => {
            let peers = router
                .handle_teardown(driver, from, &frame, now)
                .expect("well-formed teardown");
            for peer in peers {
                driver.push(peer, frame.clone());
            }
        }
        FrameType::Traffic => {}
    }
}

struct Overlay {
    routers: Vec<SnekRouter>,
    drivers: Vec<StarDriver>,
    inboxes: Vec<VecDeque<(PeerId, Frame)>>,
}

impl Overlay {
    fn star(keys: Vec<PublicKey>) -> Self {
        let n = keys.len();
        Self {
            routers: keys.iter().map(|&k| SnekRouter::new(k)).collect(),
            drivers: (0..n).map(|i| StarDriver::new(i, keys.clone())).collect(),
            inboxes: (0..n).map(|_| VecDeque::new()).collect(),
        }
    }

    /// Move outbound frames into their targets' inboxes. Frames to the
    /// local pseudo-peer stay home and are dropped here.
    fn shuttle(&mut self) -> bool {
        let mut moved = false;
        for sender in 0..self.drivers.len() {
            for (to, frame) in std::mem::take(&mut self.drivers[sender].outbox) {
                if to == LOCAL {
                    continue;
                }
                let target = peer_node(to);
                self.inboxes[target].push_back((node_peer(sender), frame));
                moved = true;
            }
        }
        moved
    }

    fn drain(&mut self, now: u64) {
        loop {
            let mut moved = self.shuttle();
            for i in 0..self.routers.len() {
                while let Some((from, frame)) = self.inboxes[i].pop_front() {
                    dispatch(&mut self.routers[i], &mut self.drivers[i], from, frame, now);
                    moved = true;
                }
            }
            if !moved {
                break;
            }
        }
    }

    fn run_rounds(&mut self, start: u64, rounds: u64) {
        for round in 0..rounds {
            let now = start + round;
            for i in 0..self.routers.len() {
                self.routers[i].maintain(&mut self.drivers[i], now);
            }
            self.drain(now);
        }
    }
}

/// Keys with distinct leading bytes; node 0 (the hub and root) highest.
fn star_keys(leaf_bytes: &[u8]) -> Vec<PublicKey> {
    let mut keys = vec![{
        let mut bytes = [0u8; 32];
        bytes[0] = 0xF0;
        PublicKey::new(bytes)
    }];
    for &b in leaf_bytes {
        let mut bytes = [0u8; 32];
        bytes[0] = b;
        keys.push(PublicKey::new(bytes));
    }
    keys
}

#[test]
fn star_overlay_converges_to_key_order() {
    let keys = star_keys(&[0x30, 0x10, 0x70, 0x50, 0x20, 0x60, 0x40]);
    let mut overlay = Overlay::star(keys.clone());
    overlay.run_rounds(1000, 8);

    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by_key(|&i| keys[i]);

    // Every node but the highest points its ascending at its successor.
    for pair in order.windows(2) {
        let (lower, upper) = (pair[0], pair[1]);
        let asc = overlay.routers[lower]
            .ascending_entry()
            .unwrap_or_else(|| panic!("node {lower} has no ascending entry"));
        assert_eq!(
            asc.origin, keys[upper],
            "node {lower} should ascend to node {upper}"
        );
        let desc = overlay.routers[upper]
            .descending_entry()
            .unwrap_or_else(|| panic!("node {upper} has no descending entry"));
        assert_eq!(
            desc.index.public_key, keys[lower],
            "node {upper} should descend from node {lower}"
        );
    }

    // The ends of the snake stay open.
    let highest = *order.last().unwrap();
    let lowest = order[0];
    assert!(overlay.routers[highest].ascending_entry().is_none());
    assert!(overlay.routers[lowest].descending_entry().is_none());

    // Structural invariants on every node: the ascending entry is keyed
    // under the node's own key and points strictly upward, the
    // descending entry strictly downward.
    for (i, router) in overlay.routers.iter().enumerate() {
        if let Some(asc) = router.ascending_entry() {
            assert_eq!(asc.index.public_key, keys[i]);
            assert!(keys[i] < asc.origin);
        }
        if let Some(desc) = router.descending_entry() {
            assert!(desc.index.public_key < keys[i]);
        }
    }
}

#[test]
fn freshly_generated_identities_converge() {
    use sidewinder_core::identity::Identity;

    // Same property with real Ed25519 keys: the hub takes the highest
    // key so that every leaf finds a neighbour above itself.
    let mut keys: Vec<PublicKey> = (0..6).map(|_| Identity::generate().public_key()).collect();
    keys.sort();
    let hub = keys.pop().unwrap();
    let mut all = vec![hub];
    all.extend(keys.iter().copied());

    let mut overlay = Overlay::star(all.clone());
    overlay.run_rounds(1000, 8);

    let mut order: Vec<usize> = (0..all.len()).collect();
    order.sort_by_key(|&i| all[i]);
    for pair in order.windows(2) {
        let asc = overlay.routers[pair[0]].ascending_entry().unwrap();
        assert_eq!(asc.origin, all[pair[1]]);
    }
}

#[test]
fn converged_overlay_is_quiescent() {
    let keys = star_keys(&[0x30, 0x10, 0x50]);
    let mut overlay = Overlay::star(keys);
    overlay.run_rounds(1000, 6);

    // Once converged, further maintenance produces no frames at all.
    for i in 0..overlay.routers.len() {
        overlay.routers[i].maintain(&mut overlay.drivers[i], 5000);
    }
    let quiet = overlay
        .drivers
        .iter()
        .all(|driver| driver.outbox.is_empty());
    assert!(quiet, "maintenance on a converged snake should be silent");
}

#[test]
fn teardown_echo_does_not_loop() {
    // Tear the converged snake at one node and let every resulting
    // teardown propagate, including the echo back to the peer it arrived
    // from. The overlay must settle instead of cycling frames.
    let keys = star_keys(&[0x30, 0x10, 0x50]);
    let mut overlay = Overlay::star(keys.clone());
    overlay.run_rounds(1000, 6);

    let lowest = (0..keys.len()).min_by_key(|&i| keys[i]).unwrap();
    let asc = overlay.routers[lowest].ascending_entry().unwrap();
    let (path_key, path_id) = (asc.index.public_key, asc.index.path_id);
    overlay.routers[lowest].send_teardown_for_existing_path(
        &mut overlay.drivers[lowest],
        LOCAL,
        path_key,
        path_id,
        2000,
    );
    // Terminates; the re-bootstrap inside the teardown re-forms the link.
    overlay.drain(2000);
    overlay.run_rounds(2001, 4);
    let asc = overlay.routers[lowest].ascending_entry().unwrap();
    assert_eq!(asc.index.public_key, keys[lowest]);
}

#[test]
fn transit_entries_appear_on_the_hub() {
    let keys = star_keys(&[0x30, 0x10, 0x50]);
    let mut overlay = Overlay::star(keys);
    overlay.run_rounds(1000, 6);

    // Leaf-to-leaf snake paths cross the hub, so the hub must hold
    // entries it is neither end of.
    let hub = &overlay.routers[0];
    let transit = hub
        .table()
        .iter()
        .filter(|(_, e)| e.source != LOCAL && e.destination != LOCAL)
        .count();
    assert!(transit > 0, "hub should carry transit entries");
}
