//! # Collision Events
//!
//! The engine reports contact starts and stops from inside the step. They
//! are resolved to entities on the spot and queued on a bounded channel;
//! the world drains the queue once per tick, after stepping, and hands
//! the batch to a single callback with the world lock released.
//!
//! ```text
//! step() ──> CollisionCollector ──channel──> CollisionQueue::drain ──> callback
//!                                                   │
//!                                   active pairs ───┘ (stay events)
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use glam::Vec3;
use ligament_core::EntityId;
use rapier3d::dynamics::RigidBodySet;
use rapier3d::geometry::{
    ColliderHandle, ColliderSet, CollisionEvent as EngineCollisionEvent, ContactPair,
};
use rapier3d::math::Real;
use rapier3d::pipeline::EventHandler;

use crate::body::BodyHandle;
use crate::convert::{from_point, from_vector};
use crate::system::PhysicsSystem;

/// Phase of a contact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CollisionKind {
    /// First tick of contact.
    Begin,
    /// Contact continues. Only reported when stay events are enabled.
    Stay,
    /// Contact ended or one of the bodies was removed.
    End,
}

/// One collision notification.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CollisionEvent {
    /// Phase.
    pub kind: CollisionKind,
    /// Entity owning the first body, if any.
    pub entity_a: Option<EntityId>,
    /// Entity owning the second body, if any.
    pub entity_b: Option<EntityId>,
    /// First body, if it still exists.
    pub body_a: Option<BodyHandle>,
    /// Second body, if it still exists.
    pub body_b: Option<BodyHandle>,
    /// Mean of the manifold contact points. Zero for sensors and ended contacts.
    pub contact_point: Vec3,
    /// Contact normal pointing from A towards B. Zero when unknown.
    pub normal: Vec3,
    /// Deepest penetration among the manifold points.
    pub penetration_depth: f32,
    /// Whether either side is a sensor.
    pub is_sensor: bool,
}

impl CollisionEvent {
    /// Checks if `entity` is one of the two participants.
    #[must_use]
    pub fn involves(&self, entity: EntityId) -> bool {
        self.entity_a == Some(entity) || self.entity_b == Some(entity)
    }

    /// The participant that is not `entity`.
    #[must_use]
    pub fn other(&self, entity: EntityId) -> Option<EntityId> {
        if self.entity_a == Some(entity) {
            self.entity_b
        } else if self.entity_b == Some(entity) {
            self.entity_a
        } else {
            None
        }
    }
}

/// Callback receiving drained collision events.
pub type CollisionCallback = Box<dyn FnMut(&CollisionEvent) + Send>;

type PairKey = (ColliderHandle, ColliderHandle);

#[derive(Clone, Copy)]
struct QueuedContact {
    pair: PairKey,
    event: CollisionEvent,
}

/// Engine-side event handler. Runs inside the step, possibly on a
/// worker thread.
pub(crate) struct CollisionCollector {
    tx: Sender<QueuedContact>,
    dropped: AtomicU64,
}

impl CollisionCollector {
    pub(crate) fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl EventHandler for CollisionCollector {
    fn handle_collision_event(
        &self,
        bodies: &RigidBodySet,
        colliders: &ColliderSet,
        event: EngineCollisionEvent,
        contact_pair: Option<&ContactPair>,
    ) {
        let kind = if event.started() {
            CollisionKind::Begin
        } else {
            CollisionKind::End
        };
        let pair = (event.collider1(), event.collider2());
        let geometry = match (kind, contact_pair) {
            (CollisionKind::Begin, Some(contact)) => manifold_geometry(contact, colliders),
            _ => ContactGeometry::default(),
        };

        let (body_a, entity_a) = resolve(bodies, colliders, pair.0);
        let (body_b, entity_b) = resolve(bodies, colliders, pair.1);
        let queued = QueuedContact {
            pair,
            event: CollisionEvent {
                kind,
                entity_a,
                entity_b,
                body_a,
                body_b,
                contact_point: geometry.point,
                normal: geometry.normal,
                penetration_depth: geometry.depth,
                is_sensor: event.sensor(),
            },
        };

        match self.tx.try_send(queued) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(dropped, "collision queue full, event dropped");
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

/// Receiving side of the queue plus the set of pairs currently touching.
pub(crate) struct CollisionQueue {
    rx: Receiver<QueuedContact>,
    active: HashMap<PairKey, CollisionEvent>,
    report_stay: bool,
}

impl CollisionQueue {
    /// Creates both halves of a queue holding at most `capacity` events.
    pub(crate) fn new(capacity: usize) -> (CollisionCollector, Self) {
        let (tx, rx) = bounded(capacity);
        (
            CollisionCollector {
                tx,
                dropped: AtomicU64::new(0),
            },
            Self {
                rx,
                active: HashMap::new(),
                report_stay: false,
            },
        )
    }

    pub(crate) fn set_report_stay(&mut self, enabled: bool) {
        self.report_stay = enabled;
    }

    pub(crate) const fn report_stay(&self) -> bool {
        self.report_stay
    }

    /// Number of pairs currently in contact.
    pub(crate) fn active_pairs(&self) -> usize {
        self.active.len()
    }

    /// Pulls every queued event, then appends a stay event per pair that
    /// was already touching before this batch.
    pub(crate) fn drain(&mut self, system: &PhysicsSystem) -> Vec<CollisionEvent> {
        let mut batch = Vec::with_capacity(self.rx.len());
        let mut begun: HashSet<PairKey> = HashSet::new();
        for queued in self.rx.try_iter() {
            match queued.event.kind {
                CollisionKind::Begin => {
                    self.active.insert(queued.pair, queued.event);
                    begun.insert(queued.pair);
                }
                CollisionKind::End | CollisionKind::Stay => {
                    self.active.remove(&queued.pair);
                    begun.remove(&queued.pair);
                }
            }
            batch.push(queued.event);
        }

        if self.report_stay {
            for (pair, started) in &self.active {
                if begun.contains(pair) {
                    continue;
                }
                let geometry = system
                    .narrow_phase
                    .contact_pair(pair.0, pair.1)
                    .map(|contact| manifold_geometry(contact, &system.colliders))
                    .unwrap_or_default();
                batch.push(CollisionEvent {
                    kind: CollisionKind::Stay,
                    contact_point: geometry.point,
                    normal: geometry.normal,
                    penetration_depth: geometry.depth,
                    ..*started
                });
            }
        }

        batch
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct ContactGeometry {
    pub point: Vec3,
    pub normal: Vec3,
    pub depth: f32,
}

/// Averages the contact points of every manifold of a pair.
pub(crate) fn manifold_geometry(pair: &ContactPair, colliders: &ColliderSet) -> ContactGeometry {
    let Some(collider) = colliders.get(pair.collider1) else {
        return ContactGeometry::default();
    };

    let mut sum = Vec3::ZERO;
    let mut count = 0u32;
    let mut geometry = ContactGeometry::default();
    for manifold in &pair.manifolds {
        if manifold.points.is_empty() {
            continue;
        }
        geometry.normal = from_vector(&manifold.data.normal);
        for point in &manifold.points {
            sum += from_point(&(collider.position() * point.local_p1));
            count += 1;
            geometry.depth = geometry.depth.max(-point.dist);
        }
    }

    if count > 0 {
        geometry.point = sum / count as f32;
    }
    geometry
}

fn resolve(
    bodies: &RigidBodySet,
    colliders: &ColliderSet,
    collider: ColliderHandle,
) -> (Option<BodyHandle>, Option<EntityId>) {
    let Some(parent) = colliders.get(collider).and_then(|c| c.parent()) else {
        return (None, None);
    };
    let entity = bodies
        .get(parent)
        .and_then(|body| EntityId::from_user_data(body.user_data));
    (Some(BodyHandle(parent)), entity)
}
