//! Construction of a cylindrical barrel detector for material scans.
//!
//! The barrel is a world tube around the z axis, split into concentric tube
//! volumes at the layer radii. Every layer is a cylinder boundary carrying a
//! binned material map, the volumes are closed by end-cap discs and the
//! outermost cylinder leads out of the world.

use std::f32::consts::PI;

use anyhow::{ensure, Context, Result};
use itertools::Itertools;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::bins::{BinUtility, BinningData, BinningOption, BinningValue};
use crate::geometry::{Surface, TrackingGeometry, VolumeBounds, VolumeId};
use crate::material::{Material, MaterialProperties};
use crate::surface_material::{BinnedSurfaceMaterial, SurfaceMaterial};

#[cfg(test)]
mod tests {

    use super::*;
    use nalgebra::Vector3;

    fn silicon() -> Material {
        Material::new(93.7, 465.2, 28.0855, 14.0, 2.329e-3)
    }

    pub(crate) fn two_layers() -> DetectorSettings {
        DetectorSettings {
            half_length: 100.0,
            world_radius: 50.0,
            layers: vec![
                LayerSettings {
                    radius: 10.0,
                    thickness: 0.5,
                    material: silicon(),
                    bins_phi: 4,
                    bins_z: 2,
                    split_factor: 0.0,
                    thickness_map: None,
                },
                LayerSettings {
                    radius: 30.0,
                    thickness: 1.0,
                    material: silicon(),
                    bins_phi: 8,
                    bins_z: 4,
                    split_factor: 0.0,
                    thickness_map: None,
                },
            ],
        }
    }

    #[test]
    fn barrel_layout() {
        let geometry = build_barrel(&two_layers(), 1.0).unwrap();
        // world plus one volume inside each layer and one outside the last
        assert_eq!(geometry.volumes().len(), 4);
        // two layers, outer cylinder, two discs per gap volume
        assert_eq!(geometry.boundaries().len(), 3 + 2 * 3);
        assert_eq!(geometry.locate(&Point3::new(1.0, 0.0, 0.0)), Some(VolumeId(1)));
        assert_eq!(geometry.locate(&Point3::new(20.0, 0.0, 0.0)), Some(VolumeId(2)));
        assert_eq!(geometry.locate(&Point3::new(40.0, 0.0, 0.0)), Some(VolumeId(3)));
        assert_eq!(geometry.locate(&Point3::new(60.0, 0.0, 0.0)), None);
    }

    #[test]
    fn layers_carry_scaled_material() {
        let settings = two_layers();
        let geometry = build_barrel(&settings, 2.0).unwrap();
        let layer = geometry
            .boundaries()
            .iter()
            .find(|b| matches!(b.surface, Surface::Cylinder { radius, .. } if radius == 10.0))
            .unwrap();
        let material = layer.material.as_ref().unwrap();
        let props = material.material_global(&Point3::new(10.0, 0.0, 0.0));
        assert!((props.thickness() - 1.0).abs() < 1e-6);

        let SurfaceMaterial::Binned(binned) = material else {
            panic!("layer material should be binned");
        };
        assert_eq!(binned.bin_utility().bins0(), 4);
        assert_eq!(binned.bin_utility().bins1(), 2);
    }

    #[test]
    fn layer_cylinders_point_outwards() {
        let geometry = build_barrel(&two_layers(), 1.0).unwrap();
        let inner = geometry.volume(VolumeId(1)).boundaries()[0];
        let boundary = geometry.boundary(inner);
        let position = Point3::new(10.0, 0.0, 0.0);
        assert_eq!(
            boundary.attached_volume(&position, &Vector3::x(), crate::parameters::Direction::Along),
            Some(VolumeId(2))
        );
    }

    #[test]
    fn thickness_map_sets_each_bin() {
        let mut settings = two_layers();
        settings.layers[0].thickness_map = Some(vec![vec![0.1, 0.2, 0.3, 0.4], vec![0.5, 0.6, 0.7, 0.8]]);
        let geometry = build_barrel(&settings, 1.0).unwrap();
        let layer = geometry.boundary(geometry.volume(VolumeId(1)).boundaries()[0]);
        let SurfaceMaterial::Binned(binned) = layer.material.as_ref().unwrap() else {
            panic!("layer material should be binned");
        };
        assert!((binned.material(0, 0).thickness() - 0.1).abs() < 1e-6);
        assert!((binned.material(3, 0).thickness() - 0.4).abs() < 1e-6);
        assert!((binned.material(1, 1).thickness() - 0.6).abs() < 1e-6);

        settings.layers[0].thickness_map = Some(vec![vec![0.1; 4]]);
        assert!(settings.validate().is_err());
        settings.layers[0].thickness_map = Some(vec![vec![0.1; 3], vec![0.1; 4]]);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn unordered_layers_are_rejected() {
        let mut settings = two_layers();
        settings.layers.swap(0, 1);
        assert!(settings.validate().is_err());
        let mut settings = two_layers();
        settings.world_radius = 20.0;
        assert!(settings.validate().is_err());
    }
}

/// One sensitive layer of the barrel.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LayerSettings {
    pub radius: f32,
    pub thickness: f32,
    pub material: Material,
    pub bins_phi: usize,
    pub bins_z: usize,
    #[serde(default)]
    pub split_factor: f32,
    /// Thickness per bin, one row of `bins_phi` values for each z bin.
    /// Replaces `thickness` where given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thickness_map: Option<Vec<Vec<f32>>>,
}

/// Shape of the barrel detector.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DetectorSettings {
    pub half_length: f32,
    pub world_radius: f32,
    pub layers: Vec<LayerSettings>,
}

impl DetectorSettings {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.half_length > 0.0, "Detector half length must be greater than 0");
        ensure!(!self.layers.is_empty(), "Detector needs at least one layer");
        ensure!(
            self.layers.iter().all(|layer| layer.radius > 0.0),
            "Layer radii must be greater than 0"
        );
        ensure!(
            self.layers
                .iter()
                .tuple_windows()
                .all(|(a, b)| a.radius < b.radius),
            "Layer radii must be strictly increasing"
        );
        let outermost = self.layers.iter().map(|layer| layer.radius).fold(0.0, f32::max);
        ensure!(
            self.world_radius > outermost,
            "World radius {} must enclose the outermost layer at {}",
            self.world_radius,
            outermost
        );
        for layer in &self.layers {
            ensure!(
                layer.bins_phi > 0 && layer.bins_z > 0,
                "Layer at radius {} needs at least one bin per axis",
                layer.radius
            );
            ensure!(
                layer.thickness >= 0.0,
                "Layer at radius {} has a negative thickness",
                layer.radius
            );
            if let Some(map) = &layer.thickness_map {
                ensure!(
                    map.len() == layer.bins_z && map.iter().all(|row| row.len() == layer.bins_phi),
                    "Thickness map of layer at radius {} must have {} rows of {} values",
                    layer.radius,
                    layer.bins_z,
                    layer.bins_phi
                );
                ensure!(
                    map.iter().flatten().all(|&t| t >= 0.0),
                    "Thickness map of layer at radius {} has a negative entry",
                    layer.radius
                );
            }
        }
        Ok(())
    }
}

/// Builds the barrel geometry, with all layer material multiplied by `scale`.
///
/// **Context**: Material scans need a realistic detector: nested volumes,
/// shared boundaries and position-dependent material on the layers.
///
/// **How it Works**: Volume `i` spans the radial gap between consecutive
/// radii of `[0, layers.., world_radius]`. Each layer cylinder is glued
/// between the gap inside it (opposite the outward normal) and the gap
/// outside it. The discs at `±half_length` and the outer cylinder only have a
/// volume on their inner side, so crossing them leaves the geometry.
pub fn build_barrel(settings: &DetectorSettings, scale: f32) -> Result<TrackingGeometry> {
    settings.validate()?;

    let half_z = settings.half_length;
    let mut geometry = TrackingGeometry::new();
    let world = geometry.add_volume(
        "world",
        Point3::origin(),
        VolumeBounds::tube(0.0, settings.world_radius, half_z),
        None,
    )?;

    let radii: Vec<f32> = std::iter::once(0.0)
        .chain(settings.layers.iter().map(|layer| layer.radius))
        .chain(std::iter::once(settings.world_radius))
        .collect();

    let gaps = radii
        .iter()
        .tuple_windows()
        .enumerate()
        .map(|(i, (&r_min, &r_max))| {
            geometry.add_volume(
                &format!("gap{}", i),
                Point3::origin(),
                VolumeBounds::tube(r_min, r_max, half_z),
                Some(world),
            )
        })
        .collect::<Result<Vec<VolumeId>, _>>()?;

    for (i, layer) in settings.layers.iter().enumerate() {
        let material = layer_material(layer, half_z, scale)
            .with_context(|| format!("Failed to build material of layer {}", i))?;
        geometry.add_boundary(
            Surface::cylinder(Point3::origin(), layer.radius, half_z),
            Some(gaps[i + 1]),
            Some(gaps[i]),
            Some(material.into()),
        )?;
    }

    for (gap, (&r_min, &r_max)) in gaps.iter().zip(radii.iter().tuple_windows()) {
        geometry.add_boundary(
            Surface::disc(Point3::new(0.0, 0.0, -half_z), r_min, r_max),
            Some(*gap),
            None,
            None,
        )?;
        geometry.add_boundary(
            Surface::disc(Point3::new(0.0, 0.0, half_z), r_min, r_max),
            None,
            Some(*gap),
            None,
        )?;
    }

    if let Some(outermost) = gaps.last() {
        geometry.add_boundary(
            Surface::cylinder(Point3::origin(), settings.world_radius, half_z),
            None,
            Some(*outermost),
            None,
        )?;
    }

    geometry.validate()?;
    info!(
        "built barrel with {} layers, {} volumes and {} boundaries",
        settings.layers.len(),
        geometry.volumes().len(),
        geometry.boundaries().len()
    );
    Ok(geometry)
}

/// Material map of a layer, binned in (R·phi, z).
fn layer_material(layer: &LayerSettings, half_z: f32, scale: f32) -> Result<BinnedSurfaceMaterial> {
    let arc = PI * layer.radius;
    let bin_utility = BinUtility::new(BinningData::equidistant(
        BinningValue::RPhi,
        BinningOption::Closed,
        layer.bins_phi,
        -arc,
        arc,
    )?)
    .with_axis(BinningData::equidistant(
        BinningValue::Z,
        BinningOption::Open,
        layer.bins_z,
        -half_z,
        half_z,
    )?)?;

    let matrix = match &layer.thickness_map {
        Some(map) => map
            .iter()
            .map(|row| {
                row.iter()
                    .map(|&t| MaterialProperties::from_material(layer.material, t))
                    .collect()
            })
            .collect(),
        None => {
            let slab = MaterialProperties::from_material(layer.material, layer.thickness);
            vec![vec![slab; layer.bins_phi]; layer.bins_z]
        }
    };
    let mut material = BinnedSurfaceMaterial::from_matrix(
        bin_utility,
        matrix,
        layer.split_factor,
        layer.bins_phi * layer.bins_z,
    )?;
    material *= scale;
    Ok(material)
}
