//! Climb point graph.
//!
//! Climb points are grip positions along ledges, each with a mount pose (where
//! the hanging root sits) and a dismount pose (where the character stands
//! after climbing up). Points on the same ledge are linked by undirected
//! edges used for shimmying. The graph is an arena: nodes refer to each other
//! by [`ClimbPointId`] and are owned by the ledge entity they belong to.

use std::collections::HashMap;

use bevy::prelude::*;

use crate::config::ClimbConfig;
use crate::host::look_rotation;
use crate::scanner::LedgeData;

/// Handle of a point in the [`ClimbPointGraph`].
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClimbPointId(pub u32);

/// A root pose.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct ClimbAnchor {
    /// Root position.
    pub position: Vec3,
    /// Root rotation.
    pub rotation: Quat,
}

impl ClimbAnchor {
    /// Create an anchor.
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }
}

/// A grip point on a ledge.
#[derive(Debug, Clone, PartialEq)]
pub struct ClimbPoint {
    /// Grip position on the ledge.
    pub position: Vec3,
    /// Pose of the root while hanging from this point.
    pub mount: ClimbAnchor,
    /// Pose of the root after climbing up from this point.
    pub dismount: ClimbAnchor,
    /// Whether the legs hang freely (no wall below the grip).
    pub free_hang: bool,
    /// Ledge entity owning the point.
    pub ledge: Entity,
    /// Whether the point was created on demand rather than authored.
    pub synthesized: bool,
    neighbors: Vec<ClimbPointId>,
}

impl ClimbPoint {
    /// Points reachable by shimmying from this one.
    pub fn neighbors(&self) -> &[ClimbPointId] {
        &self.neighbors
    }
}

/// Mount and dismount anchors for a grip on a ledge face.
///
/// `face_normal` points out of the ledge face toward the character.
pub fn ledge_anchors(
    grip: Vec3,
    climb_up_point: Vec3,
    face_normal: Vec3,
    config: &ClimbConfig,
) -> (ClimbAnchor, ClimbAnchor) {
    let facing = look_rotation(-face_normal);
    let outward = Vec3::new(face_normal.x, 0.0, face_normal.z).normalize_or_zero();
    let mount = ClimbAnchor::new(
        grip + outward * config.hang_wall_distance - Vec3::Y * config.hang_reach,
        facing,
    );
    let dismount = ClimbAnchor::new(climb_up_point, facing);
    (mount, dismount)
}

/// Arena of climb points, indexed by ledge.
#[derive(Resource, Debug, Clone, Default)]
pub struct ClimbPointGraph {
    points: Vec<Option<ClimbPoint>>,
    free: Vec<u32>,
    by_ledge: HashMap<Entity, Vec<ClimbPointId>>,
}

impl ClimbPointGraph {
    /// Add an authored point.
    pub fn add_point(
        &mut self,
        ledge: Entity,
        position: Vec3,
        mount: ClimbAnchor,
        dismount: ClimbAnchor,
        free_hang: bool,
    ) -> ClimbPointId {
        self.insert(ClimbPoint {
            position,
            mount,
            dismount,
            free_hang,
            ledge,
            synthesized: false,
            neighbors: Vec::new(),
        })
    }

    fn insert(&mut self, point: ClimbPoint) -> ClimbPointId {
        let ledge = point.ledge;
        let id = match self.free.pop() {
            Some(slot) => {
                self.points[slot as usize] = Some(point);
                ClimbPointId(slot)
            }
            None => {
                self.points.push(Some(point));
                ClimbPointId(self.points.len() as u32 - 1)
            }
        };
        self.by_ledge.entry(ledge).or_default().push(id);
        id
    }

    /// Number of slots in the arena, live or free.
    pub fn capacity(&self) -> usize {
        self.points.len()
    }

    fn disconnect(&mut self, id: ClimbPointId) {
        let neighbors = self.get_mut(id).map(|p| std::mem::take(&mut p.neighbors)).unwrap_or_default();
        for other in neighbors {
            if let Some(point) = self.get_mut(other) {
                point.neighbors.retain(|&n| n != id);
            }
        }
    }

    /// Link two points in both directions. Returns false when either point
    /// is missing or `a == b`.
    pub fn connect(&mut self, a: ClimbPointId, b: ClimbPointId) -> bool {
        if a == b || self.get(a).is_none() || self.get(b).is_none() {
            return false;
        }
        for (from, to) in [(a, b), (b, a)] {
            if let Some(point) = self.get_mut(from) {
                if !point.neighbors.contains(&to) {
                    point.neighbors.push(to);
                }
            }
        }
        true
    }

    /// Author a ledge as a chain of grips, each linked to the next.
    ///
    /// `face_normal` points out of the ledge face; dismount poses sit
    /// `climb_up_inset` behind the grips on top of the ledge.
    pub fn add_ledge_chain(
        &mut self,
        ledge: Entity,
        grips: &[Vec3],
        face_normal: Vec3,
        free_hang: bool,
        config: &ClimbConfig,
        climb_up_inset: f32,
    ) -> Vec<ClimbPointId> {
        let outward = Vec3::new(face_normal.x, 0.0, face_normal.z).normalize_or_zero();
        let ids: Vec<ClimbPointId> = grips
            .iter()
            .map(|&grip| {
                let (mount, dismount) =
                    ledge_anchors(grip, grip - outward * climb_up_inset, face_normal, config);
                self.add_point(ledge, grip, mount, dismount, free_hang)
            })
            .collect();
        for pair in ids.windows(2) {
            self.connect(pair[0], pair[1]);
        }
        ids
    }

    /// Point by handle.
    pub fn get(&self, id: ClimbPointId) -> Option<&ClimbPoint> {
        self.points.get(id.0 as usize).and_then(Option::as_ref)
    }

    fn get_mut(&mut self, id: ClimbPointId) -> Option<&mut ClimbPoint> {
        self.points.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    /// Points owned by `ledge`.
    pub fn points_on(&self, ledge: Entity) -> &[ClimbPointId] {
        self.by_ledge.get(&ledge).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of live points.
    pub fn len(&self) -> usize {
        self.by_ledge.values().map(Vec::len).sum()
    }

    /// Whether the graph holds no points.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ledges that own at least one point.
    pub fn ledges(&self) -> impl Iterator<Item = Entity> + '_ {
        self.by_ledge.keys().copied()
    }

    /// Point on `ledge` closest to `position`, optionally restricted.
    fn nearest_where(
        &self,
        ledge: Entity,
        position: Vec3,
        filter: impl Fn(&ClimbPoint) -> bool,
    ) -> Option<(ClimbPointId, f32)> {
        self.points_on(ledge)
            .iter()
            .filter_map(|&id| self.get(id).map(|point| (id, point)))
            .filter(|(_, point)| filter(*point))
            .map(|(id, point)| (id, point.position.distance(position)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Point on `ledge` closest to `position`.
    pub fn nearest_point(&self, ledge: Entity, position: Vec3) -> Option<ClimbPointId> {
        self.nearest_where(ledge, position, |_| true).map(|(id, _)| id)
    }

    /// Nearest point on the ledge a scan found, creating one if needed.
    ///
    /// Authored points always win. On a ledge without authored points a
    /// synthesized point within `point_reuse_distance` of the grip is reused;
    /// otherwise a new one is synthesized from the ledge geometry and linked
    /// to the nearest synthesized point within `point_link_distance`. Once a
    /// ledge holds `max_synthesized_points`, the nearest one is moved to the
    /// grip instead.
    pub fn get_or_create_point(
        &mut self,
        ledge: Entity,
        data: &LedgeData,
        free_hang: bool,
        config: &ClimbConfig,
    ) -> ClimbPointId {
        let grip = data.hang_point;
        if let Some((id, _)) = self.nearest_where(ledge, grip, |p| !p.synthesized) {
            return id;
        }

        let nearest = self.nearest_where(ledge, grip, |p| p.synthesized);
        if let Some((id, distance)) = nearest {
            if distance <= config.point_reuse_distance {
                return id;
            }
        }

        let (mount, dismount) = ledge_anchors(grip, data.climb_up_point, data.hit_normal, config);
        let point = ClimbPoint {
            position: grip,
            mount,
            dismount,
            free_hang,
            ledge,
            synthesized: true,
            neighbors: Vec::new(),
        };

        let synthesized = self.points_on(ledge).len();
        let id = match nearest {
            Some((id, _)) if synthesized >= config.max_synthesized_points => {
                self.disconnect(id);
                if let Some(slot) = self.get_mut(id) {
                    *slot = point;
                }
                id
            }
            _ => self.insert(point),
        };

        let link = self
            .points_on(ledge)
            .iter()
            .copied()
            .filter(|&other| other != id)
            .filter_map(|other| self.get(other).map(|p| (other, p.position.distance(grip))))
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((other, distance)) = link {
            if distance <= config.point_link_distance {
                self.connect(id, other);
            }
        }
        id
    }

    /// Nearest neighbor of `current` lying in `direction`.
    ///
    /// Only neighbors with a positive dot product between `direction` and the
    /// offset to them qualify.
    pub fn neighbor_in_direction(&self, current: ClimbPointId, direction: Vec3) -> Option<ClimbPointId> {
        let point = self.get(current)?;
        point
            .neighbors
            .iter()
            .filter_map(|&id| self.get(id).map(|n| (id, n.position - point.position)))
            .filter(|(_, offset)| offset.dot(direction) > 0.0)
            .min_by(|a, b| a.1.length_squared().total_cmp(&b.1.length_squared()))
            .map(|(id, _)| id)
    }

    /// Drop every point owned by `ledge`.
    pub fn remove_ledge(&mut self, ledge: Entity) {
        let Some(ids) = self.by_ledge.remove(&ledge) else {
            return;
        };
        for &id in &ids {
            if let Some(slot) = self.points.get_mut(id.0 as usize) {
                if slot.take().is_some() {
                    self.free.push(id.0);
                }
            }
        }
        for point in self.points.iter_mut().flatten() {
            point.neighbors.retain(|n| !ids.contains(n));
        }
    }
}

/// Drop climb points whose ledge entity no longer exists.
pub fn prune_climb_points(mut graph: ResMut<ClimbPointGraph>, entities: &bevy::ecs::entity::Entities) {
    let stale: Vec<Entity> = graph.ledges().filter(|&e| !entities.contains(e)).collect();
    for ledge in stale {
        debug!("dropping climb points of despawned ledge {ledge}");
        graph.remove_ledge(ledge);
    }
}
