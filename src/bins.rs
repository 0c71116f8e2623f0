//! Bin addressing over surface coordinates.
//!
//! A [`BinUtility`] maps a local surface coordinate or a global position onto
//! a pair of bin indices. Each axis is described by a [`BinningData`] that
//! knows which quantity it reads, how its edges are laid out and what happens
//! to values outside its range.

use std::fmt;

use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};
use thiserror::Error;


#[derive(Debug, Error, PartialEq)]
pub enum BinningError {
    #[error("an axis needs at least one bin")]
    NoBins,
    #[error("axis range [{min}, {max}] is empty")]
    EmptyRange { min: f32, max: f32 },
    #[error("bin boundaries must be strictly increasing, got {0:?}")]
    UnorderedBoundaries(Vec<f32>),
    #[error("a bin utility supports at most two axes")]
    TooManyAxes,
}

/// The global quantity read by a binning axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinningValue {
    X,
    Y,
    Z,
    R,
    Phi,
    RPhi,
}

impl BinningValue {
    /// Projects a global position onto the quantity this value describes.
    /// Phi is gauged to [-pi, pi].
    pub fn project(&self, position: &Point3<f32>) -> f32 {
        let perp = (position.x * position.x + position.y * position.y).sqrt();
        match self {
            BinningValue::X => position.x,
            BinningValue::Y => position.y,
            BinningValue::Z => position.z,
            BinningValue::R => perp,
            BinningValue::Phi => position.y.atan2(position.x),
            BinningValue::RPhi => perp * position.y.atan2(position.x),
        }
    }
}

/// Behaviour of an axis for values outside its range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinningOption {
    Open,   // clamp to the first/last bin
    Closed, // wrap around, e.g. for phi
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum BinningType {
    Equidistant { step: f32 },
    Arbitrary { boundaries: Vec<f32> },
}

/// A single binning axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinningData {
    pub value: BinningValue,
    pub option: BinningOption,
    bins: usize,
    min: f32,
    max: f32,
    kind: BinningType,
}

impl BinningData {
    /// Creates an axis of `bins` equally sized bins between `min` and `max`.
    pub fn equidistant(
        value: BinningValue,
        option: BinningOption,
        bins: usize,
        min: f32,
        max: f32,
    ) -> Result<Self, BinningError> {
        if bins == 0 {
            return Err(BinningError::NoBins);
        }
        if max <= min {
            return Err(BinningError::EmptyRange { min, max });
        }
        Ok(Self {
            value,
            option,
            bins,
            min,
            max,
            kind: BinningType::Equidistant {
                step: (max - min) / bins as f32,
            },
        })
    }

    /// Creates an axis from explicit, strictly increasing bin edges.
    pub fn arbitrary(
        value: BinningValue,
        option: BinningOption,
        boundaries: Vec<f32>,
    ) -> Result<Self, BinningError> {
        if boundaries.len() < 2 {
            return Err(BinningError::NoBins);
        }
        if boundaries.windows(2).any(|w| w[1] <= w[0]) {
            return Err(BinningError::UnorderedBoundaries(boundaries));
        }
        Ok(Self {
            value,
            option,
            bins: boundaries.len() - 1,
            min: boundaries[0],
            max: boundaries[boundaries.len() - 1],
            kind: BinningType::Arbitrary { boundaries },
        })
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    /// Finds the bin of a value. Values out of range are clamped for open
    /// axes and wrapped to the opposite end for closed axes.
    pub fn search(&self, value: f32) -> usize {
        let last = self.bins - 1;
        if value < self.min {
            return match self.option {
                BinningOption::Open => 0,
                BinningOption::Closed => last,
            };
        }
        if value >= self.max {
            return match self.option {
                BinningOption::Open => last,
                BinningOption::Closed if value > self.max => 0,
                BinningOption::Closed => last,
            };
        }
        let bin = match &self.kind {
            BinningType::Equidistant { step } => ((value - self.min) / step) as usize,
            BinningType::Arbitrary { boundaries } => {
                // first edge above the value closes the bin
                boundaries.partition_point(|edge| *edge <= value) - 1
            }
        };
        bin.min(last)
    }

    /// Lower and upper edge of a bin.
    pub fn edges(&self, bin: usize) -> (f32, f32) {
        match &self.kind {
            BinningType::Equidistant { step } => (
                self.min + bin as f32 * step,
                self.min + (bin + 1) as f32 * step,
            ),
            BinningType::Arbitrary { boundaries } => (boundaries[bin], boundaries[bin + 1]),
        }
    }

    pub fn center(&self, bin: usize) -> f32 {
        let (low, high) = self.edges(bin);
        0.5 * (low + high)
    }
}

/// Maps positions on a surface onto up to two bin indices.
///
/// **Context**: Surface material is stored per bin, so every material lookup
/// starts by turning a position into `(bin0, bin1)`.
///
/// **How it Works**: Local coordinates are read per axis index (axis 0 takes
/// `local[0]`, axis 1 takes `local[1]`), global positions are projected by
/// each axis' [`BinningValue`]. A missing second axis always yields bin 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinUtility {
    axes: Vec<BinningData>,
}

impl BinUtility {
    pub fn new(axis: BinningData) -> Self {
        Self { axes: vec![axis] }
    }

    /// Adds a second axis.
    pub fn with_axis(mut self, axis: BinningData) -> Result<Self, BinningError> {
        if self.axes.len() >= 2 {
            return Err(BinningError::TooManyAxes);
        }
        self.axes.push(axis);
        Ok(self)
    }

    pub fn axes(&self) -> &[BinningData] {
        &self.axes
    }

    pub fn dimensions(&self) -> usize {
        self.axes.len()
    }

    pub fn bins0(&self) -> usize {
        self.axes[0].bins()
    }

    pub fn bins1(&self) -> usize {
        self.axes.get(1).map_or(1, |axis| axis.bins())
    }

    pub fn bin_local(&self, local: &Point2<f32>) -> (usize, usize) {
        let bin0 = self.axes[0].search(local.x);
        let bin1 = self.axes.get(1).map_or(0, |axis| axis.search(local.y));
        (bin0, bin1)
    }

    pub fn bin_global(&self, position: &Point3<f32>) -> (usize, usize) {
        let bin0 = self.axes[0].search(self.axes[0].value.project(position));
        let bin1 = self
            .axes
            .get(1)
            .map_or(0, |axis| axis.search(axis.value.project(position)));
        (bin0, bin1)
    }
}

impl fmt::Display for BinUtility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, axis) in self.axes.iter().enumerate() {
            writeln!(
                f,
                "  axis {}: {:?} {:?} {} bins in [{:.4}, {:.4}]",
                i,
                axis.value,
                axis.option,
                axis.bins(),
                axis.min(),
                axis.max()
            )?;
        }
        Ok(())
    }
}
