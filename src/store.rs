// src/store.rs
//! Two-artifact model store: `<stem>.json` holds the architecture,
//! `<stem>.bin` the weight blob written by [`Module::save_weights`].

use crate::error::Result;
use crate::models::{AutoEncoder, AutoEncoderSpec};
use crate::module::Module;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

fn with_suffix(stem: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(stem.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

pub fn architecture_path(stem: &Path) -> PathBuf {
    with_suffix(stem, ".json")
}

pub fn weights_path(stem: &Path) -> PathBuf {
    with_suffix(stem, ".bin")
}

/// Writes both artifacts next to their final names, then renames the blob
/// before the architecture, so a readable `<stem>.json` always has the
/// matching `<stem>.bin` beside it.
pub fn save_autoencoder(model: &AutoEncoder, stem: &Path) -> Result<()> {
    if let Some(dir) = stem.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }

    let json_tmp = with_suffix(stem, ".json.tmp");
    let bin_tmp = with_suffix(stem, ".bin.tmp");
    let written = write_artifacts(model, stem, &json_tmp, &bin_tmp);
    if written.is_err() {
        let _ = fs::remove_file(&json_tmp);
        let _ = fs::remove_file(&bin_tmp);
    }
    written?;

    info!("Autoencoder saved under {}", stem.display());
    Ok(())
}

fn write_artifacts(model: &AutoEncoder, stem: &Path, json_tmp: &Path, bin_tmp: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(model.spec())?;
    fs::write(json_tmp, json)?;
    model.save_weights(bin_tmp)?;

    fs::rename(bin_tmp, weights_path(stem))?;
    fs::rename(json_tmp, architecture_path(stem))?;
    Ok(())
}

pub fn load_autoencoder(stem: &Path) -> Result<AutoEncoder> {
    let json = fs::read_to_string(architecture_path(stem))?;
    let spec: AutoEncoderSpec = serde_json::from_str(&json)?;

    // 初始权重随后会被 blob 覆盖，种子无关紧要
    let model = AutoEncoder::new(spec, &mut StdRng::seed_from_u64(0))?;
    model.load_weights(&weights_path(stem))?;

    for (i, p) in model.parameters().iter().enumerate() {
        info!("{:?} {}", p.shape(), i);
    }
    Ok(model)
}
