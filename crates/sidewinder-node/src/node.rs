//! The node actor: a single task that owns all routing state.
//!
//! Everything that mutates the snake (inbound frames, topology updates,
//! the maintenance tick) funnels through one `select!` loop, so handlers
//! run one at a time and never observe each other's partial updates. The
//! spanning tree itself is maintained elsewhere: its parent choice, root
//! announcements, and next-hop routine arrive through events and the
//! injected tree router.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use sidewinder_core::{Coordinates, Frame, FrameType, PublicKey, RootSequence};
use sidewinder_routing::{
    AncestrySignature, PeerId, RootAnnouncement, SnekDriver, SnekRouter,
};

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::peer::{Peer, PeerRegistry, LOCAL_PEER};

/// Tree-space next-hop routine supplied by the spanning-tree layer.
pub type TreeRouterFn = Box<dyn FnMut(PeerId, &Frame) -> Option<PeerId> + Send>;

/// Events delivered to the actor.
#[derive(Debug)]
pub enum NodeEvent {
    /// A frame arrived from a peer's reader.
    Inbound { from: PeerId, frame: Frame },
    /// The spanning tree picked a new parent (or lost it).
    ParentChanged(Option<PeerId>),
    /// A peer delivered a new root announcement.
    AnnouncementReceived {
        peer: PeerId,
        announcement: RootAnnouncement,
    },
    /// Our own tree coordinates changed.
    CoordinatesChanged(Coordinates),
    /// A peer link finished (or lost) its handshake.
    PeerStarted { peer: PeerId, started: bool },
    /// A peer link went away for good.
    PeerRemoved(PeerId),
}

/// Cloneable handle for talking to a running [`SnekNode`].
#[derive(Clone)]
pub struct NodeHandle {
    event_tx: mpsc::Sender<NodeEvent>,
    shutdown_tx: watch::Sender<bool>,
}

impl NodeHandle {
    /// Queue an event for the actor.
    pub async fn send(&self, event: NodeEvent) -> Result<(), NodeError> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| NodeError::ShuttingDown)
    }

    /// Ask the actor to stop after the event it is currently handling.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// The actor-side view of the world outside the snake.
struct NodeDriver {
    public_key: PublicKey,
    registry: PeerRegistry,
    parent: Option<PeerId>,
    announcements: HashMap<PeerId, RootAnnouncement>,
    coordinates: Coordinates,
    tree: TreeRouterFn,
    delivered_tx: mpsc::Sender<Frame>,
}

impl SnekDriver for NodeDriver {
    fn local(&self) -> PeerId {
        LOCAL_PEER
    }

    fn parent(&self) -> Option<PeerId> {
        self.parent
    }

    fn root_announcement(&self) -> RootAnnouncement {
        // Without a parent we are our own root.
        self.parent
            .and_then(|p| self.announcements.get(&p).cloned())
            .unwrap_or_else(|| RootAnnouncement {
                root_public_key: self.public_key,
                root_sequence: RootSequence(0),
                signatures: Vec::new(),
            })
    }

    fn coordinates(&self) -> Coordinates {
        self.coordinates.clone()
    }

    fn peers(&self) -> Vec<PeerId> {
        self.announcements.keys().copied().collect()
    }

    fn is_started(&self, peer: PeerId) -> bool {
        if peer == LOCAL_PEER {
            return true;
        }
        self.registry.get(peer).is_some_and(|p| p.is_started())
    }

    fn peer_key(&self, peer: PeerId) -> Option<PublicKey> {
        self.registry.get(peer).map(|p| p.public_key())
    }

    fn ancestry(&self, peer: PeerId) -> Vec<AncestrySignature> {
        self.announcements
            .get(&peer)
            .map(|ann| ann.signatures.clone())
            .unwrap_or_default()
    }

    fn tree_next_hop(&mut self, from: PeerId, frame: &Frame) -> Option<PeerId> {
        (self.tree)(from, frame)
    }

    fn push(&mut self, peer: PeerId, frame: Frame) -> bool {
        if peer == LOCAL_PEER {
            // Local delivery; a congested consumer drops like a queue would.
            return self.delivered_tx.try_send(frame).is_ok();
        }
        match self.registry.get(peer) {
            Some(p) => p.proto().push(frame),
            // Peer gone between lookup and use: drop the frame.
            None => false,
        }
    }
}

/// The node actor. Construct, wire up peers, then [`run`](Self::run) it.
pub struct SnekNode {
    router: SnekRouter,
    driver: NodeDriver,
    event_tx: mpsc::Sender<NodeEvent>,
    event_rx: mpsc::Receiver<NodeEvent>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    maintain_interval: std::time::Duration,
    proto_queue_capacity: usize,
    started_at: Instant,
    delivered_rx: Option<mpsc::Receiver<Frame>>,
}

impl SnekNode {
    pub fn new(config: &NodeConfig, public_key: PublicKey, tree: TreeRouterFn) -> Self {
        let (event_tx, event_rx) = mpsc::channel(config.node.event_queue_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (delivered_tx, delivered_rx) = mpsc::channel(config.node.event_queue_capacity);

        Self {
            router: SnekRouter::new(public_key),
            driver: NodeDriver {
                public_key,
                registry: PeerRegistry::new(),
                parent: None,
                announcements: HashMap::new(),
                coordinates: Coordinates::default(),
                tree,
                delivered_tx,
            },
            event_tx,
            event_rx,
            shutdown_tx,
            shutdown_rx,
            maintain_interval: config.maintain_interval(),
            proto_queue_capacity: config.node.proto_queue_capacity,
            started_at: Instant::now(),
            delivered_rx: Some(delivered_rx),
        }
    }

    /// Handle for feeding events and shutting down, cloneable freely.
    pub fn handle(&self) -> NodeHandle {
        NodeHandle {
            event_tx: self.event_tx.clone(),
            shutdown_tx: self.shutdown_tx.clone(),
        }
    }

    /// Register a peer link before the actor starts.
    pub fn register_peer(&mut self, public_key: PublicKey) -> Arc<Peer> {
        self.driver
            .registry
            .register(public_key, self.proto_queue_capacity)
    }

    /// Receiver of frames addressed to this node. Take it once.
    pub fn take_delivered(&mut self) -> Option<mpsc::Receiver<Frame>> {
        self.delivered_rx.take()
    }

    /// The snake state, for inspection before the actor starts.
    #[must_use]
    pub fn router(&self) -> &SnekRouter {
        &self.router
    }

    fn now(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Run the actor until shutdown or until every handle is dropped.
    pub async fn run(mut self) {
        let mut tick = tokio::time::interval(self.maintain_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        tracing::info!("snek node shutting down");
                        break;
                    }
                }
                _ = tick.tick() => {
                    let now = self.now();
                    self.router.maintain(&mut self.driver, now);
                }
                event = self.event_rx.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
            }
        }
    }

    fn handle_event(&mut self, event: NodeEvent) {
        match event {
            NodeEvent::Inbound { from, frame } => self.dispatch(from, frame),
            NodeEvent::ParentChanged(parent) => {
                tracing::debug!(?parent, "tree parent changed");
                self.driver.parent = parent;
            }
            NodeEvent::AnnouncementReceived { peer, announcement } => {
                self.driver.announcements.insert(peer, announcement);
            }
            NodeEvent::CoordinatesChanged(coordinates) => {
                self.driver.coordinates = coordinates;
            }
            NodeEvent::PeerStarted { peer, started } => {
                if let Some(p) = self.driver.registry.get(peer) {
                    p.set_started(started);
                }
            }
            NodeEvent::PeerRemoved(peer) => {
                self.driver.registry.remove(peer);
                self.driver.announcements.remove(&peer);
                if self.driver.parent == Some(peer) {
                    self.driver.parent = None;
                }
            }
        }
    }

    /// Classify an inbound frame and route or handle it.
    fn dispatch(&mut self, from: PeerId, frame: Frame) {
        let now = self.now();
        match frame.frame_type {
            FrameType::Bootstrap => {
                match self
                    .router
                    .next_hop_snek(&self.driver, from, &frame, true, now)
                {
                    Some(next) if next != LOCAL_PEER => {
                        self.driver.push(next, frame);
                    }
                    // No progress possible: the probe dead-ends here.
                    _ => {
                        if let Err(e) = self.router.handle_bootstrap(&mut self.driver, from, &frame)
                        {
                            tracing::debug!("dropping malformed bootstrap: {e}");
                        }
                    }
                }
            }
            FrameType::BootstrapAck => {
                match self.driver.tree_next_hop(LOCAL_PEER, &frame) {
                    Some(next) if next != LOCAL_PEER => {
                        self.driver.push(next, frame);
                    }
                    _ => {
                        if let Err(e) =
                            self.router
                                .handle_bootstrap_ack(&mut self.driver, from, &frame, now)
                        {
                            tracing::debug!("dropping malformed bootstrap ack: {e}");
                        }
                    }
                }
            }
            FrameType::Setup => {
                let next_hop = self.driver.tree_next_hop(LOCAL_PEER, &frame);
                if let Err(e) =
                    self.router
                        .handle_setup(&mut self.driver, from, &frame, next_hop, now)
                {
                    tracing::debug!("dropping malformed setup: {e}");
                }
            }
            FrameType::Teardown => {
                match self.router.handle_teardown(&mut self.driver, from, &frame, now) {
                    Ok(peers) => {
                        for peer in peers {
                            self.driver.push(peer, frame.clone());
                        }
                    }
                    Err(e) => tracing::debug!("dropping malformed teardown: {e}"),
                }
            }
            FrameType::Traffic => {
                match self
                    .router
                    .next_hop_snek(&self.driver, from, &frame, false, now)
                {
                    Some(next) if next != LOCAL_PEER => {
                        self.driver.push(next, frame);
                    }
                    Some(_) => {
                        self.driver.push(LOCAL_PEER, frame);
                    }
                    None => {}
                }
            }
        }
    }
}
