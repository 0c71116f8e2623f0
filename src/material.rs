//! Material constants and thickness-carrying material properties.
//!
//! This module describes the matter a trajectory traverses when it crosses a
//! boundary surface. A [`Material`] holds the constants of a medium, while
//! [`MaterialProperties`] attaches a thickness and caches the traversed
//! fraction of a radiation length and of a nuclear interaction length.
//!
//! The material model provides:
//! - Vacuum detection for empty or zero-thickness material
//! - Thickness scaling with consistent derived fractions
//! - Averaging of layered material with the absorption-length mixing rule
//!
//! # Key Components
//!
//! - [`Material`]: X0, L0, A, Z and density of a medium
//! - [`MaterialProperties`]: a material slab of given thickness

use std::{fmt, ops::MulAssign};

use serde::{Deserialize, Serialize};


/// Physical constants of a medium.
///
/// Lengths are in the geometry unit (mm by convention), density in g/mm3.
/// A zero density marks vacuum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Material {
    x0: f32,  // radiation length
    l0: f32,  // nuclear interaction length
    ar: f32,  // relative atomic mass
    z: f32,   // atomic number
    rho: f32, // density
}

impl Material {
    pub fn new(x0: f32, l0: f32, ar: f32, z: f32, rho: f32) -> Self {
        Self { x0, l0, ar, z, rho }
    }

    pub fn vacuum() -> Self {
        Self::default()
    }

    /// Returns true unless the material is vacuum.
    pub fn is_valid(&self) -> bool {
        self.rho > 0.0
    }

    pub fn x0(&self) -> f32 {
        self.x0
    }

    pub fn l0(&self) -> f32 {
        self.l0
    }

    pub fn ar(&self) -> f32 {
        self.ar
    }

    pub fn z(&self) -> f32 {
        self.z
    }

    pub fn density(&self) -> f32 {
        self.rho
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return write!(f, "vacuum");
        }
        write!(
            f,
            "X0 = {:.4} | L0 = {:.4} | A = {:.4} | Z = {:.4} | rho = {:.6}",
            self.x0, self.l0, self.ar, self.z, self.rho
        )
    }
}

/// A slab of material with a defined thickness.
///
/// **Context**: Boundary surfaces carry the material of the detector elements
/// projected onto them. The navigator and material-effects engines only ever
/// need the material budget of the slab, so it is cached.
///
/// **How it Works**: The fractions `t/X0` and `t/L0` are computed once when
/// the slab is created and rescaled together with the thickness. Equality
/// compares the material and the thickness only, since the fractions depend
/// on them.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MaterialProperties {
    material: Material,
    thickness: f32,
    thickness_in_x0: f32,
    thickness_in_l0: f32,
}

impl MaterialProperties {
    /// Creates material properties from the raw material constants.
    pub fn new(x0: f32, l0: f32, ar: f32, z: f32, rho: f32, thickness: f32) -> Self {
        Self::from_material(Material::new(x0, l0, ar, z, rho), thickness)
    }

    pub fn from_material(material: Material, thickness: f32) -> Self {
        let thickness_in_x0 = if material.x0 > 0.0 {
            thickness / material.x0
        } else {
            0.0
        };
        let thickness_in_l0 = if material.l0 > 0.0 {
            thickness / material.l0
        } else {
            0.0
        };
        Self {
            material,
            thickness,
            thickness_in_x0,
            thickness_in_l0,
        }
    }

    /// Vacuum with a thickness.
    pub fn vacuum(thickness: f32) -> Self {
        Self::from_material(Material::vacuum(), thickness)
    }

    /// Combines several layers into a single equivalent slab.
    ///
    /// **Context**: Material mapping collapses the stack of materials found
    /// along a track segment into one slab per surface bin. The stack must
    /// keep its total material budget.
    ///
    /// **How it Works**: The traversed fractions add up, so the averaged
    /// radiation length is `Σt / Σ(t/X0)` and likewise for the interaction
    /// length. Atomic mass and number are weighted by the areal mass `rho·t`
    /// of each layer and the density is the total areal mass over the total
    /// thickness. With `normalize` the result describes a slab of unit
    /// thickness, otherwise the summed thickness is kept.
    pub fn average(layers: &[MaterialProperties], normalize: bool) -> Self {
        let mut thickness = 0.0_f64;
        let mut thickness_in_x0 = 0.0_f64;
        let mut thickness_in_l0 = 0.0_f64;
        let mut areal_mass = 0.0_f64;
        let mut ar = 0.0_f64;
        let mut z = 0.0_f64;

        for layer in layers {
            let t = layer.thickness as f64;
            let weight = layer.material.rho as f64 * t;
            thickness += t;
            thickness_in_x0 += layer.thickness_in_x0 as f64;
            thickness_in_l0 += layer.thickness_in_l0 as f64;
            ar += layer.material.ar as f64 * weight;
            z += layer.material.z as f64 * weight;
            areal_mass += weight;
        }

        if thickness <= 0.0 || areal_mass <= 0.0 {
            return Self::vacuum(if normalize { 1.0 } else { thickness as f32 });
        }

        let x0 = if thickness_in_x0 > 0.0 {
            thickness / thickness_in_x0
        } else {
            0.0
        };
        let l0 = if thickness_in_l0 > 0.0 {
            thickness / thickness_in_l0
        } else {
            0.0
        };
        let material = Material::new(
            x0 as f32,
            l0 as f32,
            (ar / areal_mass) as f32,
            (z / areal_mass) as f32,
            (areal_mass / thickness) as f32,
        );

        let thickness = if normalize { 1.0 } else { thickness as f32 };
        Self::from_material(material, thickness)
    }

    /// Returns true unless the slab is vacuum or has no thickness.
    pub fn is_valid(&self) -> bool {
        self.material.is_valid() && self.thickness > 0.0
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn thickness(&self) -> f32 {
        self.thickness
    }

    /// The traversed fraction of a radiation length.
    pub fn thickness_in_x0(&self) -> f32 {
        self.thickness_in_x0
    }

    /// The traversed fraction of a nuclear interaction length.
    pub fn thickness_in_l0(&self) -> f32 {
        self.thickness_in_l0
    }
}

impl MulAssign<f32> for MaterialProperties {
    /// Scales the amount of material, the constants are untouched.
    fn mul_assign(&mut self, scale: f32) {
        self.thickness *= scale;
        self.thickness_in_x0 *= scale;
        self.thickness_in_l0 *= scale;
    }
}

impl PartialEq for MaterialProperties {
    fn eq(&self, other: &Self) -> bool {
        // t/X0 and t/L0 depend on the other two
        self.material == other.material && self.thickness == other.thickness
    }
}

impl fmt::Display for MaterialProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | t = {:.4} | t/X0 = {:.6} | t/L0 = {:.6}",
            self.material, self.thickness, self.thickness_in_x0, self.thickness_in_l0
        )
    }
}
