//! Tracking geometry: volumes, boundary surfaces and their connections.
//!
//! The geometry is an arena. Volumes and boundary surfaces live in flat
//! vectors and refer to each other through [`VolumeId`] and [`BoundaryId`].
//! A boundary knows the volume on each side of its surface, a volume knows
//! its boundaries in declaration order. Containment between volumes is kept in
//! a [`VolumeHierarchy`].
//!
//! # Key Components
//!
//! - [`Surface`]: planes, discs and z-aligned cylinders with straight-line intersections
//! - [`VolumeBounds`]: cuboid and tube volume shapes
//! - [`BoundarySurface`]: a surface glued between two volumes, with optional material
//! - [`TrackingGeometry`]: the arena and position lookup

use std::f64::consts::PI;
use std::fmt;

use nalgebra::{Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{BOUNDS_TOLERANCE, CONTAINMENT_TOLERANCE, PARALLEL_THRESHOLD};
use crate::hierarchy::VolumeHierarchy;
use crate::parameters::Direction;
use crate::surface_material::SurfaceMaterial;


#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("the geometry has no volumes")]
    EmptyGeometry,
    #[error("volume {0} does not exist")]
    UnknownVolume(VolumeId),
    #[error("the geometry already has a root volume")]
    MultipleRoots,
    #[error("volume '{0}' has no boundary surfaces")]
    NoBoundaries(String),
}

/// Index of a volume in a [`TrackingGeometry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VolumeId(pub usize);

/// Index of a boundary surface in a [`TrackingGeometry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BoundaryId(pub usize);

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}", self.0)
    }
}

impl fmt::Display for BoundaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// A boundary surface shape.
///
/// Discs and cylinders are aligned with the global z axis.
#[derive(Debug, Clone, PartialEq)]
pub enum Surface {
    Plane {
        center: Point3<f32>,
        normal: Vector3<f32>,
        u_axis: Vector3<f32>,
        v_axis: Vector3<f32>,
        half_u: Option<f32>, // None means unbounded
        half_v: Option<f32>,
    },
    Disc {
        center: Point3<f32>,
        r_min: f32,
        r_max: f32,
    },
    Cylinder {
        center: Point3<f32>,
        radius: f32,
        half_z: f32,
    },
}

impl Surface {
    pub fn plane(
        center: Point3<f32>,
        normal: Vector3<f32>,
        half_u: Option<f32>,
        half_v: Option<f32>,
    ) -> Self {
        let normal = normal.normalize();
        let reference = if normal.z.abs() < 0.9 {
            Vector3::z()
        } else {
            Vector3::x()
        };
        let u_axis = reference.cross(&normal).normalize();
        let v_axis = normal.cross(&u_axis);
        Surface::Plane {
            center,
            normal,
            u_axis,
            v_axis,
            half_u,
            half_v,
        }
    }

    pub fn disc(center: Point3<f32>, r_min: f32, r_max: f32) -> Self {
        Surface::Disc {
            center,
            r_min,
            r_max,
        }
    }

    pub fn cylinder(center: Point3<f32>, radius: f32, half_z: f32) -> Self {
        Surface::Cylinder {
            center,
            radius,
            half_z,
        }
    }

    /// Signed path lengths along `direction` at which the straight line
    /// through `position` meets the bounded surface, in ascending order.
    pub fn intersections(&self, position: &Point3<f32>, direction: &Vector3<f32>) -> Vec<f32> {
        match self {
            Surface::Plane {
                center,
                normal,
                u_axis,
                v_axis,
                half_u,
                half_v,
            } => {
                let denom = normal.dot(direction);
                if denom.abs() < PARALLEL_THRESHOLD {
                    return Vec::new();
                }
                let s = normal.dot(&(center - position)) / denom;
                let hit = position + direction * s - center;
                let inside_u = half_u.map_or(true, |h| hit.dot(u_axis).abs() <= h + BOUNDS_TOLERANCE);
                let inside_v = half_v.map_or(true, |h| hit.dot(v_axis).abs() <= h + BOUNDS_TOLERANCE);
                if inside_u && inside_v {
                    vec![s]
                } else {
                    Vec::new()
                }
            }
            Surface::Disc {
                center,
                r_min,
                r_max,
            } => {
                if direction.z.abs() < PARALLEL_THRESHOLD {
                    return Vec::new();
                }
                let s = (center.z - position.z) / direction.z;
                let hit = position + direction * s - center;
                let r = (hit.x * hit.x + hit.y * hit.y).sqrt();
                if r >= r_min - BOUNDS_TOLERANCE && r <= r_max + BOUNDS_TOLERANCE {
                    vec![s]
                } else {
                    Vec::new()
                }
            }
            Surface::Cylinder {
                center,
                radius,
                half_z,
            } => {
                // solved in double precision, the state often sits on the surface
                let px = (position.x - center.x) as f64;
                let py = (position.y - center.y) as f64;
                let dx = direction.x as f64;
                let dy = direction.y as f64;
                let a = dx * dx + dy * dy;
                if a < (PARALLEL_THRESHOLD as f64).powi(2) {
                    return Vec::new();
                }
                let b = 2.0 * (px * dx + py * dy);
                let c = px * px + py * py - (*radius as f64).powi(2);
                let discriminant = b * b - 4.0 * a * c;
                if discriminant < 0.0 {
                    return Vec::new();
                }
                let root = discriminant.sqrt();
                [(-b - root) / (2.0 * a), (-b + root) / (2.0 * a)]
                    .into_iter()
                    .map(|s| s as f32)
                    .filter(|s| {
                        let z = position.z + direction.z * s - center.z;
                        z.abs() <= half_z + BOUNDS_TOLERANCE
                    })
                    .collect()
            }
        }
    }

    /// Whether `position` lies on the bounded surface within `tolerance`.
    pub fn is_on(&self, position: &Point3<f32>, tolerance: f32) -> bool {
        match self {
            Surface::Plane {
                center,
                normal,
                u_axis,
                v_axis,
                half_u,
                half_v,
            } => {
                let d = position - center;
                d.dot(normal).abs() <= tolerance
                    && half_u.map_or(true, |h| d.dot(u_axis).abs() <= h + tolerance)
                    && half_v.map_or(true, |h| d.dot(v_axis).abs() <= h + tolerance)
            }
            Surface::Disc {
                center,
                r_min,
                r_max,
            } => {
                let d = position - center;
                let r = (d.x * d.x + d.y * d.y).sqrt();
                d.z.abs() <= tolerance && r >= r_min - tolerance && r <= r_max + tolerance
            }
            Surface::Cylinder {
                center,
                radius,
                half_z,
            } => {
                let d = position - center;
                let r = (d.x * d.x + d.y * d.y).sqrt();
                (r - radius).abs() <= tolerance && d.z.abs() <= half_z + tolerance
            }
        }
    }

    /// Unit normal at a position on the surface. Cylinders point outwards.
    pub fn normal(&self, position: &Point3<f32>) -> Vector3<f32> {
        match self {
            Surface::Plane { normal, .. } => *normal,
            Surface::Disc { .. } => Vector3::z(),
            Surface::Cylinder { center, .. } => {
                let radial = Vector3::new(position.x - center.x, position.y - center.y, 0.0);
                if radial.norm() > 0.0 {
                    radial.normalize()
                } else {
                    Vector3::x()
                }
            }
        }
    }

    /// Local two-dimensional coordinates of a position on the surface:
    /// (u, v) for planes, (r, phi) for discs and (R·phi, z) for cylinders.
    pub fn local(&self, position: &Point3<f32>) -> Point2<f32> {
        match self {
            Surface::Plane {
                center,
                u_axis,
                v_axis,
                ..
            } => {
                let d = position - center;
                Point2::new(d.dot(u_axis), d.dot(v_axis))
            }
            Surface::Disc { center, .. } => {
                let d = position - center;
                Point2::new((d.x * d.x + d.y * d.y).sqrt(), d.y.atan2(d.x))
            }
            Surface::Cylinder { center, radius, .. } => {
                let d = position - center;
                Point2::new(radius * d.y.atan2(d.x), d.z)
            }
        }
    }

    /// Factor `1/|cos α|` between the direction and the surface normal.
    pub fn path_correction(&self, position: &Point3<f32>, direction: &Vector3<f32>) -> f32 {
        let cos_alpha = self.normal(position).dot(direction).abs();
        1.0 / cos_alpha.max(PARALLEL_THRESHOLD)
    }

    /// Area of the surface, if bounded.
    pub fn area(&self) -> Option<f32> {
        match self {
            Surface::Plane {
                half_u: Some(hu),
                half_v: Some(hv),
                ..
            } => Some(4.0 * hu * hv),
            Surface::Plane { .. } => None,
            Surface::Disc { r_min, r_max, .. } => {
                Some((PI * ((*r_max as f64).powi(2) - (*r_min as f64).powi(2))) as f32)
            }
            Surface::Cylinder { radius, half_z, .. } => {
                Some((2.0 * PI * *radius as f64 * 2.0 * *half_z as f64) as f32)
            }
        }
    }
}

/// Shape of a volume, centred on the volume's centre and aligned with the axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VolumeBounds {
    Cuboid { half_x: f32, half_y: f32, half_z: f32 },
    Tube { r_min: f32, r_max: f32, half_z: f32 },
}

impl VolumeBounds {
    pub fn cuboid(half_x: f32, half_y: f32, half_z: f32) -> Self {
        VolumeBounds::Cuboid {
            half_x,
            half_y,
            half_z,
        }
    }

    pub fn tube(r_min: f32, r_max: f32, half_z: f32) -> Self {
        VolumeBounds::Tube {
            r_min,
            r_max,
            half_z,
        }
    }

    /// Tests a position given relative to the volume centre.
    pub fn contains(&self, local: &Point3<f32>, tolerance: f32) -> bool {
        match self {
            VolumeBounds::Cuboid {
                half_x,
                half_y,
                half_z,
            } => {
                local.x.abs() <= half_x + tolerance
                    && local.y.abs() <= half_y + tolerance
                    && local.z.abs() <= half_z + tolerance
            }
            VolumeBounds::Tube {
                r_min,
                r_max,
                half_z,
            } => {
                let r = (local.x * local.x + local.y * local.y).sqrt();
                r >= r_min - tolerance && r <= r_max + tolerance && local.z.abs() <= half_z + tolerance
            }
        }
    }
}

/// A region of the detector bounded by boundary surfaces.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    pub name: String,
    pub center: Point3<f32>,
    pub bounds: VolumeBounds,
    boundaries: Vec<BoundaryId>,
}

impl Volume {
    pub fn contains(&self, position: &Point3<f32>) -> bool {
        let local = Point3::from(position - self.center);
        self.bounds.contains(&local, CONTAINMENT_TOLERANCE)
    }

    /// Boundary surfaces in declaration order.
    pub fn boundaries(&self) -> &[BoundaryId] {
        &self.boundaries
    }
}

/// A surface glued between two volumes.
///
/// **Context**: When a track reaches a boundary, navigation continues in the
/// volume on the far side, which depends on the side the track leaves from.
///
/// **How it Works**: The volume on the side the surface normal points to is
/// `along_normal`, the other one `opposite_normal`. Either may be missing,
/// which means that side is outside the modelled geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundarySurface {
    pub surface: Surface,
    pub along_normal: Option<VolumeId>,
    pub opposite_normal: Option<VolumeId>,
    pub material: Option<SurfaceMaterial>,
}

impl BoundarySurface {
    /// The volume a track enters when it passes the surface at `position`
    /// moving along `direction` (flipped for [`Direction::Opposite`]).
    pub fn attached_volume(
        &self,
        position: &Point3<f32>,
        direction: &Vector3<f32>,
        nav_direction: Direction,
    ) -> Option<VolumeId> {
        let heading = direction * nav_direction.sign();
        if self.surface.normal(position).dot(&heading) > 0.0 {
            self.along_normal
        } else {
            self.opposite_normal
        }
    }
}

/// Arena holding the volumes and boundary surfaces of a detector.
///
/// The first volume added is the root and every later volume must name a
/// parent. Built once, then shared read-only between traversals.
#[derive(Debug, Clone, Default)]
pub struct TrackingGeometry {
    volumes: Vec<Volume>,
    boundaries: Vec<BoundarySurface>,
    hierarchy: VolumeHierarchy,
}

impl TrackingGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_volume(
        &mut self,
        name: &str,
        center: Point3<f32>,
        bounds: VolumeBounds,
        parent: Option<VolumeId>,
    ) -> Result<VolumeId, GeometryError> {
        match parent {
            None if !self.volumes.is_empty() => return Err(GeometryError::MultipleRoots),
            Some(parent) => self.check_volume(parent)?,
            None => {}
        }

        let id = self.hierarchy.push();
        self.volumes.push(Volume {
            name: name.to_string(),
            center,
            bounds,
            boundaries: Vec::new(),
        });
        if let Some(parent) = parent {
            self.hierarchy.set_parent(id, parent.0);
        }
        Ok(VolumeId(id))
    }

    /// Adds a boundary and registers it with the volumes on both sides.
    pub fn add_boundary(
        &mut self,
        surface: Surface,
        along_normal: Option<VolumeId>,
        opposite_normal: Option<VolumeId>,
        material: Option<SurfaceMaterial>,
    ) -> Result<BoundaryId, GeometryError> {
        for volume in along_normal.iter().chain(opposite_normal.iter()) {
            self.check_volume(*volume)?;
        }

        let id = BoundaryId(self.boundaries.len());
        self.boundaries.push(BoundarySurface {
            surface,
            along_normal,
            opposite_normal,
            material,
        });

        for volume in along_normal.iter().chain(opposite_normal.iter()) {
            let boundaries = &mut self.volumes[volume.0].boundaries;
            if !boundaries.contains(&id) {
                boundaries.push(id);
            }
        }
        Ok(id)
    }

    fn check_volume(&self, volume: VolumeId) -> Result<(), GeometryError> {
        if volume.0 < self.volumes.len() {
            Ok(())
        } else {
            Err(GeometryError::UnknownVolume(volume))
        }
    }

    /// Checks that the geometry can be navigated: it has a root and every
    /// leaf volume has boundary surfaces.
    pub fn validate(&self) -> Result<(), GeometryError> {
        if self.volumes.is_empty() {
            return Err(GeometryError::EmptyGeometry);
        }
        for (i, volume) in self.volumes.iter().enumerate() {
            if self.hierarchy.children(i).is_empty() && volume.boundaries.is_empty() {
                return Err(GeometryError::NoBoundaries(volume.name.clone()));
            }
        }
        Ok(())
    }

    pub fn root(&self) -> Option<VolumeId> {
        (!self.volumes.is_empty()).then_some(VolumeId(0))
    }

    pub fn volume(&self, id: VolumeId) -> &Volume {
        &self.volumes[id.0]
    }

    pub fn boundary(&self, id: BoundaryId) -> &BoundarySurface {
        &self.boundaries[id.0]
    }

    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    pub fn boundaries(&self) -> &[BoundarySurface] {
        &self.boundaries
    }

    pub fn parent(&self, id: VolumeId) -> Option<VolumeId> {
        self.hierarchy.get_parent(id.0).map(VolumeId)
    }

    pub fn children(&self, id: VolumeId) -> impl Iterator<Item = VolumeId> + '_ {
        self.hierarchy.children(id.0).iter().map(|&c| VolumeId(c))
    }

    /// Finds the innermost volume containing a position, or `None` outside
    /// the root volume. A parent is tested before its children and the
    /// search descends into the first child that contains the position.
    pub fn locate(&self, position: &Point3<f32>) -> Option<VolumeId> {
        let root = self.root()?;
        if !self.volume(root).contains(position) {
            return None;
        }
        let found = self
            .hierarchy
            .descend(root.0, |id| self.volumes[id].contains(position));
        Some(VolumeId(found))
    }
}
