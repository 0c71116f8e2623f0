use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::scan::{ProfileBin, ScanSummary, TrackRecord};
use crate::settings::Settings;


fn create_file(dir: &Path, name: &str) -> Result<BufWriter<File>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {:?}", dir))?;
    let path = dir.join(name);
    let file = File::create(&path).with_context(|| format!("Failed to create {:?}", path))?;
    Ok(BufWriter::new(file))
}

/// Write one row per track: eta, phi, X0, L0, steps, path length and status
pub fn write_tracks(records: &[TrackRecord], dir: &Path) -> Result<()> {
    let mut writer = create_file(dir, "tracks.dat")?;

    writeln!(writer, "# eta phi x0 l0 steps path_length status")?;
    for record in records {
        writeln!(
            writer,
            "{} {} {} {} {} {} {}",
            record.eta,
            record.phi,
            record.material_in_x0,
            record.material_in_l0,
            record.steps,
            record.path_length,
            record.status
        )?;
    }

    writer.flush()?;
    Ok(())
}

/// Write the material profile against the eta bin edges
pub fn write_profile(profile: &[ProfileBin], dir: &Path) -> Result<()> {
    let mut writer = create_file(dir, "profile.dat")?;

    writeln!(writer, "# eta_low eta_high mean_x0 mean_l0 count")?;
    for bin in profile {
        writeln!(
            writer,
            "{} {} {} {} {}",
            bin.eta_low, bin.eta_high, bin.mean_x0, bin.mean_l0, bin.count
        )?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_summary(summary: &ScanSummary, dir: &Path) -> Result<()> {
    let mut writer = create_file(dir, "summary.json")?;
    serde_json::to_writer_pretty(&mut writer, summary).context("Failed to write summary")?;
    writer.flush()?;
    Ok(())
}

/// Write the settings the scan ran with, so it can be repeated
pub fn write_settings(settings: &Settings, dir: &Path) -> Result<()> {
    let mut writer = create_file(dir, "settings.toml")?;
    let text = toml::to_string_pretty(settings).context("Failed to serialize settings")?;
    writer.write_all(text.as_bytes())?;
    writer.flush()?;
    Ok(())
}
