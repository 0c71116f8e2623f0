use anyhow::{anyhow, ensure, Context, Result};
use clap::Parser;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;

use crate::config::DEFAULT_PATH_CUTOFF;
use crate::detector::DetectorSettings;

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn default_config_loads() {
        let settings = load_default_config().unwrap();
        assert!(settings.num_tracks > 0);
        assert!(settings.eta_min < settings.eta_max);
        assert!(!settings.detector.layers.is_empty());
        assert_eq!(settings.material_scale, 1.0);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let mut settings = load_default_config().unwrap();
        settings.eta_min = 3.0;
        settings.eta_max = -3.0;
        assert!(validate_config(&settings).is_err());

        let mut settings = load_default_config().unwrap();
        settings.momentum = 0.0;
        assert!(validate_config(&settings).is_err());
    }

    #[test]
    fn cli_overrides() {
        let mut settings = load_default_config().unwrap();
        let args = CliArgs::parse_from(["detnav", "--tracks", "12", "--seed", "5", "--neutral"]);
        apply_cli_args(&mut settings, args);
        assert_eq!(settings.num_tracks, 12);
        assert_eq!(settings.seed, Some(5));
        assert!(settings.neutral);
    }
}

/// Runtime configuration of a material scan.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Settings {
    pub num_tracks: usize,
    pub momentum: f32,
    pub eta_min: f32,
    pub eta_max: f32,
    pub seed: Option<u64>,
    pub max_steps: usize,
    pub check_loops: bool,
    pub neutral: bool,
    #[serde(default = "default_path_cutoff")]
    pub path_cutoff: f32,
    #[serde(default = "default_scale_factor")]
    pub material_scale: f32,
    #[serde(default = "default_profile_bins")]
    pub profile_bins: usize,
    pub directory: PathBuf,
    pub detector: DetectorSettings,
}

fn default_scale_factor() -> f32 {
    1.0
}

fn default_profile_bins() -> usize {
    20
}

fn default_path_cutoff() -> f32 {
    DEFAULT_PATH_CUTOFF
}

/// Loads `config/default.toml` only, without environment or command line.
pub fn load_default_config() -> Result<Settings> {
    let root = retrieve_project_root()?;
    let default_config_file = root.join("config/default.toml");

    let settings = Config::builder()
        .add_source(File::from(default_config_file).required(true))
        .build()
        .context("Error loading configuration")?;

    let config: Settings = settings
        .try_deserialize()
        .context("Error deserializing configuration")?;

    validate_config(&config)?;

    Ok(config)
}

/// Loads the configuration: `config/local.toml` if present, else
/// `config/default.toml`, then `DETNAV_*` environment variables, then
/// command-line overrides.
pub fn load_config() -> Result<Settings> {
    let root = retrieve_project_root()?;

    let default_config_file = root.join("config/default.toml");
    let local_config = root.join("config/local.toml");

    // Check if local config exists, if not use default
    let config_file = if local_config.exists() {
        println!("Using local configuration: {:?}", local_config);
        local_config
    } else {
        println!("Using default configuration: {:?}", default_config_file);
        default_config_file
    };

    let settings = Config::builder()
        .add_source(File::from(config_file).required(true))
        .add_source(Environment::with_prefix("detnav"))
        .build()
        .context("Error loading configuration")?;

    let mut config: Settings = settings
        .try_deserialize()
        .context("Error deserializing configuration")?;

    // Parse command-line arguments and override values
    apply_cli_args(&mut config, CliArgs::parse());

    validate_config(&config)?;

    Ok(config)
}

fn apply_cli_args(config: &mut Settings, args: CliArgs) {
    if let Some(tracks) = args.tracks {
        config.num_tracks = tracks;
    }
    if let Some(momentum) = args.momentum {
        config.momentum = momentum;
    }
    if let Some(eta_min) = args.eta_min {
        config.eta_min = eta_min;
    }
    if let Some(eta_max) = args.eta_max {
        config.eta_max = eta_max;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(max_steps) = args.max_steps {
        config.max_steps = max_steps;
    }
    if let Some(scale) = args.scale {
        config.material_scale = scale;
    }
    if let Some(dir) = args.dir {
        config.directory = dir;
    }
    if args.check_loops {
        config.check_loops = true;
    }
    if args.neutral {
        config.neutral = true;
    }
}

/// Retrieve the project root directory.
/// This function tries to find the project root directory in different ways:
/// 1. If the CARGO_MANIFEST_DIR environment variable is set, use it.
/// 2. If the DETNAV_ROOT_DIR environment variable is set, use it.
/// 3. If the "config" subdirectory is found in the executable directory or any of its parents, use it.
fn retrieve_project_root() -> Result<PathBuf> {
    if let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") {
        // When running through cargo (e.g. cargo run, cargo test)
        return Ok(PathBuf::from(manifest_dir));
    }
    if let Ok(path) = env::var("DETNAV_ROOT_DIR") {
        return Ok(PathBuf::from(path));
    }

    // Fallback: walk upward from the executable directory
    let exe_path = env::current_exe().context("Failed to get current executable path")?;
    exe_path
        .ancestors()
        .skip(1)
        .find(|dir| dir.join("config").is_dir())
        .map(|dir| dir.to_path_buf())
        .ok_or_else(|| anyhow!("Could not find project root directory"))
}

fn validate_config(config: &Settings) -> Result<()> {
    ensure!(config.num_tracks > 0, "Number of tracks must be greater than 0");
    ensure!(config.momentum > 0.0, "Momentum must be greater than 0");
    ensure!(
        config.eta_min < config.eta_max,
        "Eta range [{}, {}] is empty",
        config.eta_min,
        config.eta_max
    );
    ensure!(config.max_steps > 0, "Maximum number of steps must be greater than 0");
    ensure!(config.path_cutoff > 0.0, "Path cutoff must be greater than 0");
    ensure!(config.profile_bins > 0, "Number of profile bins must be greater than 0");
    ensure!(config.material_scale >= 0.0, "Material scale must not be negative");
    config.detector.validate()
}

#[derive(Parser, Debug)]
#[command(version, about = "detnav - material scan through a tracking geometry")]
pub struct CliArgs {
    /// Number of tracks to shoot through the detector.
    #[arg(short, long)]
    tracks: Option<usize>,

    /// Track momentum in GeV.
    #[arg(short, long)]
    momentum: Option<f32>,

    /// Lower end of the pseudorapidity range.
    #[arg(long, allow_hyphen_values = true)]
    eta_min: Option<f32>,

    /// Upper end of the pseudorapidity range.
    #[arg(long, allow_hyphen_values = true)]
    eta_max: Option<f32>,

    /// Random seed for track generation.
    #[arg(short, long)]
    seed: Option<u64>,

    /// Maximum number of boundary crossings per track.
    #[arg(long)]
    max_steps: Option<usize>,

    /// Fail tracks that re-enter a volume they already visited.
    #[arg(long)]
    check_loops: bool,

    /// Shoot neutral instead of charged tracks.
    #[arg(long)]
    neutral: bool,

    /// Scale factor applied to all surface material.
    #[arg(long)]
    scale: Option<f32>,

    /// Output directory.
    #[arg(short, long)]
    dir: Option<PathBuf>,
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Settings:
  - Tracks: {}
  - Momentum: {:.4}
  - Eta Range: [{:.3}, {:.3}]
  - Seed: {:?}
  - Max Steps: {}
  - Check Loops: {}
  - Neutral: {}
  - Material Scale: {:.4}
  - Layers: {}
  ",
            self.num_tracks,
            self.momentum,
            self.eta_min,
            self.eta_max,
            self.seed,
            self.max_steps,
            self.check_loops,
            self.neutral,
            self.material_scale,
            self.detector.layers.len(),
        )
    }
}
