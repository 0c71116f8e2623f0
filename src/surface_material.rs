//! Material attached to boundary surfaces.
//!
//! Surfaces carry either one slab of material for their full extent
//! ([`HomogeneousSurfaceMaterial`]) or a table of slabs addressed by surface
//! bins ([`BinnedSurfaceMaterial`]). Both are built once, optionally rescaled
//! while the detector is assembled, and then shared read-only.

use std::{fmt, ops::MulAssign};

use nalgebra::{Point2, Point3};
use ndarray::Array2;
use thiserror::Error;

use crate::bins::BinUtility;
use crate::material::MaterialProperties;
use crate::parameters::Direction;

#[cfg(test)]
mod tests {

    use super::*;
    use crate::bins::{BinningData, BinningOption, BinningValue};

    fn slab(thickness: f32) -> MaterialProperties {
        MaterialProperties::new(93.7, 465.2, 28.0855, 14.0, 2.329e-3, thickness)
    }

    fn utility_3x2() -> BinUtility {
        BinUtility::new(
            BinningData::equidistant(BinningValue::X, BinningOption::Open, 3, 0.0, 3.0).unwrap(),
        )
        .with_axis(
            BinningData::equidistant(BinningValue::Y, BinningOption::Open, 2, 0.0, 2.0).unwrap(),
        )
        .unwrap()
    }

    fn matrix_3x2() -> Vec<Vec<MaterialProperties>> {
        (0..2)
            .map(|bin1| {
                (0..3)
                    .map(|bin0| slab(1.0 + bin0 as f32 + 10.0 * bin1 as f32))
                    .collect()
            })
            .collect()
    }

    #[test]
    fn direct_access_matches_matrix() {
        let matrix = matrix_3x2();
        let material = BinnedSurfaceMaterial::from_matrix(utility_3x2(), matrix.clone(), 0.0, 7)
            .unwrap();
        // lookups elsewhere don't disturb the table
        let _ = material.material_local(&Point2::new(0.5, 0.5));
        let _ = material.material_global(&Point3::new(2.5, 1.5, 0.0));
        for bin1 in 0..2 {
            for bin0 in 0..3 {
                assert_eq!(*material.material(bin0, bin1), matrix[bin1][bin0]);
            }
        }
        assert_eq!(material.entries(), 7);
    }

    #[test]
    fn local_and_global_lookup() {
        let material =
            BinnedSurfaceMaterial::from_matrix(utility_3x2(), matrix_3x2(), 0.0, 1).unwrap();
        assert_eq!(material.material_local(&Point2::new(1.5, 1.5)).thickness(), 12.0);
        assert_eq!(
            material.material_global(&Point3::new(2.5, 0.5, 4.0)).thickness(),
            3.0
        );
        // out of range values land in the edge bins
        assert_eq!(material.material_local(&Point2::new(-9.0, 9.0)).thickness(), 11.0);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let mut matrix = matrix_3x2();
        matrix[1].pop();
        let result = BinnedSurfaceMaterial::from_matrix(utility_3x2(), matrix, 0.0, 1);
        assert!(matches!(result, Err(MaterialError::ShapeMismatch { .. })));

        let result = BinnedSurfaceMaterial::from_matrix(utility_3x2(), vec![], 0.0, 1);
        assert!(matches!(result, Err(MaterialError::ShapeMismatch { .. })));

        let result = BinnedSurfaceMaterial::from_matrix(utility_3x2(), matrix_3x2(), 1.5, 1);
        assert!(matches!(result, Err(MaterialError::InvalidSplitFactor(_))));
    }

    #[test]
    fn vector_is_promoted_to_single_row() {
        let utility = BinUtility::new(
            BinningData::equidistant(BinningValue::X, BinningOption::Open, 3, 0.0, 3.0).unwrap(),
        );
        let material =
            BinnedSurfaceMaterial::from_vector(utility, vec![slab(1.0), slab(2.0), slab(3.0)], 0.5, 1)
                .unwrap();
        assert_eq!(material.full_material().dim(), (1, 3));
        assert_eq!(material.material(2, 0).thickness(), 3.0);
        assert_eq!(material.material_local(&Point2::new(1.2, 100.0)).thickness(), 2.0);
    }

    #[test]
    #[should_panic]
    fn out_of_range_bin_panics() {
        let material =
            BinnedSurfaceMaterial::from_matrix(utility_3x2(), matrix_3x2(), 0.0, 1).unwrap();
        let _ = material.material(3, 0);
    }

    #[test]
    fn store_scaling_commutes_with_entry_scaling() {
        let original =
            BinnedSurfaceMaterial::from_matrix(utility_3x2(), matrix_3x2(), 0.25, 4).unwrap();
        let mut scaled = original.clone();
        scaled *= 0.8;
        for bin1 in 0..2 {
            for bin0 in 0..3 {
                let mut expected = *original.material(bin0, bin1);
                expected *= 0.8;
                assert_eq!(*scaled.material(bin0, bin1), expected);
                assert_eq!(
                    scaled.material(bin0, bin1).thickness_in_x0(),
                    expected.thickness_in_x0()
                );
            }
        }
        assert_eq!(scaled.entries(), 4);
        assert_eq!(scaled.bin_utility(), original.bin_utility());
    }

    #[test]
    fn clone_is_independent() {
        let original =
            BinnedSurfaceMaterial::from_matrix(utility_3x2(), matrix_3x2(), 0.25, 4).unwrap();
        let mut copy = original.clone();
        copy *= 2.0;
        assert_eq!(original.material(0, 0).thickness(), 1.0);
        assert_eq!(copy.material(0, 0).thickness(), 2.0);
        assert_eq!(copy.split_factor(), 0.25);
    }

    #[test]
    fn split_factor_shares() {
        let material = HomogeneousSurfaceMaterial::new(slab(1.0), 0.3).unwrap();
        let material = SurfaceMaterial::Homogeneous(material);
        assert_eq!(material.factor(Direction::Along, MaterialUpdateStage::Full), 1.0);
        assert!((material.factor(Direction::Along, MaterialUpdateStage::Pre) - 0.3).abs() < 1e-6);
        assert!((material.factor(Direction::Along, MaterialUpdateStage::Post) - 0.7).abs() < 1e-6);
        assert!(
            (material.factor(Direction::Opposite, MaterialUpdateStage::Pre) - 0.7).abs() < 1e-6
        );
    }

    #[test]
    fn homogeneous_ignores_position() {
        let mut material = SurfaceMaterial::Homogeneous(
            HomogeneousSurfaceMaterial::new(slab(0.5), 0.0).unwrap(),
        );
        material *= 2.0;
        assert_eq!(material.material_local(&Point2::new(1e3, -1e3)).thickness(), 1.0);
        assert_eq!(
            material.material_global(&Point3::new(0.0, 0.0, 0.0)).thickness(),
            1.0
        );
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum MaterialError {
    #[error("material matrix is {rows}x{cols}, but the bin utility expects {bins1}x{bins0}")]
    ShapeMismatch {
        rows: usize,
        cols: usize,
        bins0: usize,
        bins1: usize,
    },
    #[error("split factor {0} is outside [0, 1]")]
    InvalidSplitFactor(f32),
}

/// Which part of a boundary crossing a material update describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialUpdateStage {
    Pre,  // before the surface in propagation direction
    Full, // the whole slab at once
    Post, // after the surface in propagation direction
}

fn check_split_factor(split_factor: f32) -> Result<(), MaterialError> {
    if (0.0..=1.0).contains(&split_factor) {
        Ok(())
    } else {
        Err(MaterialError::InvalidSplitFactor(split_factor))
    }
}

/// One slab of material for the full surface.
#[derive(Debug, Clone, PartialEq)]
pub struct HomogeneousSurfaceMaterial {
    full_material: MaterialProperties,
    split_factor: f32,
}

impl HomogeneousSurfaceMaterial {
    pub fn new(full_material: MaterialProperties, split_factor: f32) -> Result<Self, MaterialError> {
        check_split_factor(split_factor)?;
        Ok(Self {
            full_material,
            split_factor,
        })
    }

    pub fn material(&self) -> &MaterialProperties {
        &self.full_material
    }

    pub fn split_factor(&self) -> f32 {
        self.split_factor
    }
}

impl MulAssign<f32> for HomogeneousSurfaceMaterial {
    fn mul_assign(&mut self, scale: f32) {
        self.full_material *= scale;
    }
}

/// Position-dependent material of a surface, one slab per bin.
///
/// **Context**: Material maps record what a detector surface really contains,
/// which varies across it (sensors, cooling pipes, overlaps). Navigation
/// queries the map at the crossing point for every boundary it passes.
///
/// **How it Works**: A [`BinUtility`] turns the crossing position into
/// `(bin0, bin1)` and the matrix holds the slab of each bin, indexed as
/// `[bin1, bin0]`. The split factor records how the mapped material was
/// shared between the two traversal directions when the map was made; the
/// entry count records how many mapping samples went into the map. Neither
/// is used by the lookups.
#[derive(Debug, Clone, PartialEq)]
pub struct BinnedSurfaceMaterial {
    bin_utility: BinUtility,
    full_material: Array2<MaterialProperties>,
    split_factor: f32,
    entries: usize,
}

impl BinnedSurfaceMaterial {
    /// Creates a one-dimensional material map, stored as a single row.
    pub fn from_vector(
        bin_utility: BinUtility,
        full_properties: Vec<MaterialProperties>,
        split_factor: f32,
        entries: usize,
    ) -> Result<Self, MaterialError> {
        Self::from_matrix(bin_utility, vec![full_properties], split_factor, entries)
    }

    /// Creates a material map from rows of bin0 entries, one row per bin1.
    pub fn from_matrix(
        bin_utility: BinUtility,
        full_properties: Vec<Vec<MaterialProperties>>,
        split_factor: f32,
        entries: usize,
    ) -> Result<Self, MaterialError> {
        check_split_factor(split_factor)?;

        let bins0 = bin_utility.bins0();
        let bins1 = bin_utility.bins1();
        let rows = full_properties.len();
        if let Some(row) = full_properties.iter().find(|row| row.len() != bins0) {
            return Err(MaterialError::ShapeMismatch {
                rows,
                cols: row.len(),
                bins0,
                bins1,
            });
        }
        if rows != bins1 {
            return Err(MaterialError::ShapeMismatch {
                rows,
                cols: bins0,
                bins0,
                bins1,
            });
        }

        let flat: Vec<MaterialProperties> = full_properties.into_iter().flatten().collect();
        let full_material = Array2::from_shape_vec((bins1, bins0), flat).map_err(|_| {
            MaterialError::ShapeMismatch {
                rows,
                cols: bins0,
                bins0,
                bins1,
            }
        })?;

        Ok(Self {
            bin_utility,
            full_material,
            split_factor,
            entries,
        })
    }

    pub fn bin_utility(&self) -> &BinUtility {
        &self.bin_utility
    }

    /// The material matrix, shaped `(bins1, bins0)`.
    pub fn full_material(&self) -> &Array2<MaterialProperties> {
        &self.full_material
    }

    pub fn split_factor(&self) -> f32 {
        self.split_factor
    }

    /// Number of mapping samples the map was built from.
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Direct bin access. Panics if a bin index is out of range.
    pub fn material(&self, bin0: usize, bin1: usize) -> &MaterialProperties {
        let (bins1, bins0) = self.full_material.dim();
        assert!(
            bin0 < bins0 && bin1 < bins1,
            "bin ({}, {}) requested, but the material map only has {}x{} bins",
            bin0,
            bin1,
            bins0,
            bins1
        );
        &self.full_material[[bin1, bin0]]
    }

    pub fn material_local(&self, local: &Point2<f32>) -> &MaterialProperties {
        let (bin0, bin1) = self.bin_utility.bin_local(local);
        self.material(bin0, bin1)
    }

    pub fn material_global(&self, position: &Point3<f32>) -> &MaterialProperties {
        let (bin0, bin1) = self.bin_utility.bin_global(position);
        self.material(bin0, bin1)
    }
}

impl MulAssign<f32> for BinnedSurfaceMaterial {
    /// Rescales every bin, the binning and entry count stay as they are.
    fn mul_assign(&mut self, scale: f32) {
        self.full_material
            .iter_mut()
            .for_each(|props| *props *= scale);
    }
}

impl fmt::Display for BinnedSurfaceMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (bins1, bins0) = self.full_material.dim();
        writeln!(
            f,
            "BinnedSurfaceMaterial: {}x{} bins, split factor {:.3}, {} entries",
            bins0, bins1, self.split_factor, self.entries
        )?;
        write!(f, "{}", self.bin_utility)?;
        for ((bin1, bin0), props) in self.full_material.indexed_iter() {
            writeln!(f, "  [{}, {}] {}", bin0, bin1, props)?;
        }
        Ok(())
    }
}

/// The material a boundary surface can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceMaterial {
    Homogeneous(HomogeneousSurfaceMaterial),
    Binned(BinnedSurfaceMaterial),
}

impl SurfaceMaterial {
    pub fn material_local(&self, local: &Point2<f32>) -> &MaterialProperties {
        match self {
            SurfaceMaterial::Homogeneous(material) => material.material(),
            SurfaceMaterial::Binned(material) => material.material_local(local),
        }
    }

    pub fn material_global(&self, position: &Point3<f32>) -> &MaterialProperties {
        match self {
            SurfaceMaterial::Homogeneous(material) => material.material(),
            SurfaceMaterial::Binned(material) => material.material_global(position),
        }
    }

    pub fn split_factor(&self) -> f32 {
        match self {
            SurfaceMaterial::Homogeneous(material) => material.split_factor(),
            SurfaceMaterial::Binned(material) => material.split_factor(),
        }
    }

    /// Share of the full material to apply at a given update stage.
    ///
    /// The split factor is the pre-update share when travelling along the
    /// momentum; travelling against it swaps the pre and post shares.
    pub fn factor(&self, direction: Direction, stage: MaterialUpdateStage) -> f32 {
        let split = self.split_factor();
        match (stage, direction) {
            (MaterialUpdateStage::Full, _) => 1.0,
            (MaterialUpdateStage::Pre, Direction::Along)
            | (MaterialUpdateStage::Post, Direction::Opposite) => split,
            (MaterialUpdateStage::Post, Direction::Along)
            | (MaterialUpdateStage::Pre, Direction::Opposite) => 1.0 - split,
        }
    }
}

impl MulAssign<f32> for SurfaceMaterial {
    fn mul_assign(&mut self, scale: f32) {
        match self {
            SurfaceMaterial::Homogeneous(material) => *material *= scale,
            SurfaceMaterial::Binned(material) => *material *= scale,
        }
    }
}

impl From<HomogeneousSurfaceMaterial> for SurfaceMaterial {
    fn from(material: HomogeneousSurfaceMaterial) -> Self {
        SurfaceMaterial::Homogeneous(material)
    }
}

impl From<BinnedSurfaceMaterial> for SurfaceMaterial {
    fn from(material: BinnedSurfaceMaterial) -> Self {
        SurfaceMaterial::Binned(material)
    }
}
