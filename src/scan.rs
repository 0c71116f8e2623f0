//! Material scans: many straight tracks shot through the barrel detector.
//!
//! A scan generates track directions from the origin, follows every track
//! with the extrapolator and records how much material it crossed. It
//! provides:
//! - Reproducible track generation from a seed
//! - Parallel traversal with rayon and a progress bar
//! - Per-track records and a summary with status counts
//! - A material profile in pseudorapidity
//!
//! # Key Components
//!
//! - [`MaterialScan`]: builds the detector and runs the tracks
//! - [`TrackRecord`]: outcome of one track
//! - [`ScanSummary`]: aggregate of a whole scan

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::bins::{BinningData, BinningOption, BinningValue};
use crate::context::NavigationContext;
use crate::detector::build_barrel;
use crate::effects::NoMaterialEffects;
use crate::extrapolator::Extrapolator;
use crate::geometry::TrackingGeometry;
use crate::navigator::{NavigationConfig, StaticNavigator};
use crate::output;
use crate::parameters::{ChargedParameters, NeutralParameters, TrackState};
use crate::propagator::StraightLinePropagator;
use crate::settings::Settings;
use crate::status::NavigationStatus;

#[cfg(test)]
mod tests {

    use super::*;
    use crate::settings::load_default_config;

    fn small_scan(seed: u64) -> MaterialScan {
        let mut settings = load_default_config().unwrap();
        settings.num_tracks = 64;
        settings.seed = Some(seed);
        MaterialScan::new(settings).unwrap()
    }

    #[test]
    fn seeded_directions_repeat() {
        let a = small_scan(3).generate_directions();
        let b = small_scan(3).generate_directions();
        let c = small_scan(4).generate_directions();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.iter().all(|(eta, phi)| {
            (-2.5..=2.5).contains(eta) && (-std::f32::consts::PI..=std::f32::consts::PI).contains(phi)
        }));
    }

    #[test]
    fn direction_from_eta() {
        let central = direction(0.0, 0.0);
        assert!((central - Vector3::x()).norm() < 1e-6);
        let forward = direction(5.0, 0.0);
        assert!(forward.z > 0.99);
        assert!((direction(1.3, 2.0).norm() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn central_track_crosses_every_layer() {
        let mut scan = small_scan(1);
        let record = scan.trace(0.0, 0.3);
        let layers = scan.settings.detector.layers.len();
        assert_eq!(record.status, NavigationStatus::OutOfGeometry);
        assert_eq!(record.steps, layers + 1);
        assert!((record.path_length - scan.settings.detector.world_radius).abs() < 1e-2);

        let expected: f32 = scan
            .settings
            .detector
            .layers
            .iter()
            .map(|layer| layer.thickness / layer.material.x0())
            .sum();
        assert!((record.material_in_x0 - expected).abs() < 1e-4);

        // a second scan over the same seed gives identical records
        scan.solve().unwrap();
        let mut again = small_scan(1);
        again.solve().unwrap();
        assert_eq!(scan.records, again.records);
    }

    #[test]
    fn summary_counts_every_track() {
        let mut scan = small_scan(9);
        let summary = scan.solve().unwrap();
        assert_eq!(summary.num_tracks, 64);
        assert_eq!(summary.status_counts.values().sum::<usize>(), 64);
        assert!(summary.max_x0 >= summary.mean_x0);
        let profile = scan.material_profile();
        assert_eq!(
            profile.iter().map(|bin| bin.count).sum::<usize>(),
            64
        );
    }
}

/// Outcome of one track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackRecord {
    pub eta: f32,
    pub phi: f32,
    pub material_in_x0: f32,
    pub material_in_l0: f32,
    pub steps: usize,
    pub path_length: f32,
    pub status: NavigationStatus,
}

/// Aggregate of a material scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub timestamp: String,
    pub num_tracks: usize,
    pub neutral: bool,
    pub seed: Option<u64>,
    pub mean_x0: f32,
    pub max_x0: f32,
    pub mean_l0: f32,
    pub max_l0: f32,
    pub mean_steps: f32,
    pub status_counts: BTreeMap<String, usize>,
    pub duration_secs: f64,
}

/// Material budget in one pseudorapidity bin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileBin {
    pub eta_low: f32,
    pub eta_high: f32,
    pub mean_x0: f32,
    pub mean_l0: f32,
    pub count: usize,
}

/// Unit direction for a pseudorapidity and azimuth.
pub fn direction(eta: f32, phi: f32) -> Vector3<f32> {
    let theta = 2.0 * (-eta).exp().atan();
    Vector3::new(
        phi.cos() * theta.sin(),
        phi.sin() * theta.sin(),
        theta.cos(),
    )
}

/// Material scan through a barrel detector.
///
/// **Context**: The quickest check of a detector description is to shoot
/// straight tracks through it and look at the material they see.
///
/// **How it Works**: Builds the geometry once and shares it through an
/// `Arc`. Directions are drawn up front from one RNG so the result does not
/// depend on thread scheduling, then every track gets its own navigation
/// context and is extrapolated in parallel.
#[derive(Debug)]
pub struct MaterialScan {
    pub settings: Settings,
    pub records: Vec<TrackRecord>,
    extrapolator: Extrapolator<StraightLinePropagator, NoMaterialEffects>,
}

impl MaterialScan {
    pub fn new(settings: Settings) -> Result<Self> {
        let geometry = build_barrel(&settings.detector, settings.material_scale)?;
        Ok(Self::with_geometry(settings, geometry))
    }

    /// Scans a prebuilt geometry instead of the configured barrel.
    pub fn with_geometry(settings: Settings, geometry: TrackingGeometry) -> Self {
        let config = NavigationConfig::new(
            StraightLinePropagator::default(),
            NoMaterialEffects,
            Arc::new(geometry),
        )
        .with_path_cutoff(settings.path_cutoff);
        let extrapolator = Extrapolator::new(StaticNavigator::new(config));
        Self {
            settings,
            records: Vec::new(),
            extrapolator,
        }
    }

    pub fn geometry(&self) -> &TrackingGeometry {
        self.extrapolator.navigator().geometry()
    }

    /// Draws `(eta, phi)` for every track.
    pub fn generate_directions(&self) -> Vec<(f32, f32)> {
        let mut rng = match self.settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let (eta_min, eta_max) = (self.settings.eta_min, self.settings.eta_max);
        (0..self.settings.num_tracks)
            .map(|_| {
                let eta = rng.random_range(eta_min..eta_max);
                let phi = rng.random_range(-std::f32::consts::PI..std::f32::consts::PI);
                (eta, phi)
            })
            .collect()
    }

    /// Follows one track from the origin.
    pub fn trace(&self, eta: f32, phi: f32) -> TrackRecord {
        let origin = Point3::origin();
        let heading = direction(eta, phi);
        if self.settings.neutral {
            let parameters = NeutralParameters::new(origin, heading, self.settings.momentum);
            self.follow(parameters, eta, phi)
        } else {
            let parameters = ChargedParameters::new(origin, heading, self.settings.momentum, 1.0);
            self.follow(parameters, eta, phi)
        }
    }

    fn follow<P: TrackState>(&self, parameters: P, eta: f32, phi: f32) -> TrackRecord {
        let mut ctx = NavigationContext::new(parameters, None)
            .with_loop_guard(self.settings.check_loops)
            .with_max_steps(self.settings.max_steps);
        let status = self.extrapolator.extrapolate(&mut ctx);
        TrackRecord {
            eta,
            phi,
            material_in_x0: ctx.material_in_x0,
            material_in_l0: ctx.material_in_l0,
            steps: ctx.step_count(),
            path_length: ctx.path_length,
            status,
        }
    }

    /// Runs every track in parallel and summarises the scan.
    pub fn solve(&mut self) -> Result<ScanSummary> {
        let start = Instant::now();
        println!("Scanning {} tracks...", self.settings.num_tracks);

        let directions = self.generate_directions();

        let pb = ProgressBar::new(directions.len() as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] {bar:40.green/blue} {pos:>5}/{len:5} {msg} ETA: {eta_precise}",
            )?
            .progress_chars("█▇▆▅▄▃▂▁"),
        );
        pb.set_message("tracks".to_string());

        self.records = directions
            .par_iter()
            .map(|&(eta, phi)| {
                let record = self.trace(eta, phi);
                pb.inc(1);
                record
            })
            .collect();
        pb.finish_and_clear();

        let duration = start.elapsed();
        let time_per_track = duration / self.settings.num_tracks.max(1) as u32;
        println!(
            "Time taken: {:.2?}, Time per track: {:.2?}",
            duration, time_per_track
        );

        let summary = self.summary(duration.as_secs_f64());
        let failures: usize = self
            .records
            .iter()
            .filter(|record| record.status.is_failure())
            .count();
        if failures > 0 {
            warn!("{} of {} tracks failed to navigate", failures, self.records.len());
        }
        info!(
            "mean material {:.4} X0, {:.4} L0",
            summary.mean_x0, summary.mean_l0
        );
        Ok(summary)
    }

    fn summary(&self, duration_secs: f64) -> ScanSummary {
        let n = self.records.len().max(1) as f32;
        let sum = |f: fn(&TrackRecord) -> f32| self.records.iter().map(f).sum::<f32>();
        let max = |f: fn(&TrackRecord) -> f32| self.records.iter().map(f).fold(0.0, f32::max);

        let mut status_counts: BTreeMap<String, usize> = NavigationStatus::all()
            .iter()
            .filter(|status| status.is_terminal())
            .map(|status| (status.to_string(), 0))
            .collect();
        for record in &self.records {
            *status_counts.entry(record.status.to_string()).or_insert(0) += 1;
        }

        ScanSummary {
            timestamp: chrono::Local::now().to_rfc3339(),
            num_tracks: self.records.len(),
            neutral: self.settings.neutral,
            seed: self.settings.seed,
            mean_x0: sum(|r| r.material_in_x0) / n,
            max_x0: max(|r| r.material_in_x0),
            mean_l0: sum(|r| r.material_in_l0) / n,
            max_l0: max(|r| r.material_in_l0),
            mean_steps: sum(|r| r.steps as f32) / n,
            status_counts,
            duration_secs,
        }
    }

    /// Mean material per pseudorapidity bin over the finished tracks.
    pub fn material_profile(&self) -> Vec<ProfileBin> {
        // an axis over eta; only its edges and search are used, never projection
        let Ok(binning) = BinningData::equidistant(
            BinningValue::Z,
            BinningOption::Open,
            self.settings.profile_bins,
            self.settings.eta_min,
            self.settings.eta_max,
        ) else {
            return Vec::new();
        };

        let mut profile: Vec<ProfileBin> = (0..binning.bins())
            .map(|bin| {
                let (eta_low, eta_high) = binning.edges(bin);
                ProfileBin {
                    eta_low,
                    eta_high,
                    mean_x0: 0.0,
                    mean_l0: 0.0,
                    count: 0,
                }
            })
            .collect();

        for record in &self.records {
            let bin = &mut profile[binning.search(record.eta)];
            bin.mean_x0 += record.material_in_x0;
            bin.mean_l0 += record.material_in_l0;
            bin.count += 1;
        }
        for bin in profile.iter_mut().filter(|bin| bin.count > 0) {
            bin.mean_x0 /= bin.count as f32;
            bin.mean_l0 /= bin.count as f32;
        }
        profile
    }

    /// Writes the records, profile, summary and settings to the output directory.
    pub fn writeup(&self, summary: &ScanSummary) -> Result<()> {
        let dir = &self.settings.directory;
        output::write_tracks(&self.records, dir)?;
        output::write_profile(&self.material_profile(), dir)?;
        output::write_summary(summary, dir)?;
        output::write_settings(&self.settings, dir)?;
        println!("Results written to {:?}", dir);
        Ok(())
    }
}
