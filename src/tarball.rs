//! Build the [`Image`] model from a `docker save`/OCI image tarball.
//!
//! The tarball is unpacked into a scoped temp directory, then
//! `manifest.json`, `index.json`, and the image config are walked to
//! produce ordered layers (oldest first) with their content digests and the
//! shell commands recorded in the build history. Plain and gzipped
//! tarballs are both accepted, detected by magic bytes.

use crate::command::Command as ShellCommand;
use crate::image::{Image, Layer};
use crate::notifier::Notifier;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::process::Command;
use tar_rs as tar;
use tempfile::TempDir;

/// Export an image from the local docker daemon into a tarball held in a
/// temp directory. The directory must outlive the returned path.
pub fn fetch_image_tarball(image_ref: &str, notifier: &Notifier) -> Result<(PathBuf, TempDir)> {
    let temp_dir = TempDir::new().context("Failed to create temporary directory")?;
    let tarball_path = temp_dir.path().join("image.tar");

    notifier.info(&format!("Exporting image '{}' to tarball...", image_ref));
    let output = Command::new("docker")
        .args(["save", "-o"])
        .arg(&tarball_path)
        .arg(image_ref)
        .output()
        .context("Failed to execute docker save")?;

    if !output.status.success() {
        let error = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("docker save failed: {}", error));
    }

    Ok((tarball_path, temp_dir))
}

/// Parse an image tarball into the image model, with layers oldest first.
pub fn image_from_tarball(
    tarball_path: &Path,
    image_ref: &str,
    notifier: &Notifier,
) -> Result<Image> {
    notifier.debug(&format!("Extracting image tarball: {:?}", tarball_path));

    let temp_dir = TempDir::new().context("Failed to create temporary directory")?;
    unpack_archive(tarball_path, temp_dir.path())?;

    let manifest_path = temp_dir.path().join("manifest.json");
    if !manifest_path.exists() {
        return Err(anyhow!(
            "Invalid image tarball: manifest.json not found. This does not appear to be a valid OCI/Docker image tarball."
        ));
    }

    let manifest_content =
        fs::read_to_string(&manifest_path).context("Failed to read manifest.json")?;
    let manifest: Vec<serde_json::Value> =
        serde_json::from_str(&manifest_content).context("Failed to parse manifest.json")?;
    if manifest.is_empty() {
        return Err(anyhow!("Empty manifest.json"));
    }

    let config_file = manifest[0]["Config"]
        .as_str()
        .ok_or_else(|| anyhow!("Invalid manifest format - missing Config"))?;
    let config_content = fs::read_to_string(temp_dir.path().join(config_file))
        .with_context(|| format!("Failed to read config file: {}", config_file))?;
    let config: oci_spec::image::ImageConfiguration =
        serde_json::from_str(&config_content).context("Failed to parse image configuration")?;

    let layer_digests: Vec<String> = manifest[0]["Layers"]
        .as_array()
        .ok_or_else(|| anyhow!("Invalid manifest format - missing Layers array"))?
        .iter()
        .map(|layer| {
            layer
                .as_str()
                .map(digest_from_layer_path)
                .ok_or_else(|| anyhow!("Invalid layer reference"))
        })
        .collect::<Result<_>>()?;

    let mut image = Image::parse_ref(image_ref);
    image.id = image_id(temp_dir.path(), config_file);
    image.layers = layers_from_history(&config, &layer_digests);

    notifier.info(&format!(
        "Loaded {} layers from image tarball",
        image.layers.len()
    ));

    Ok(image)
}

/// Map build-history entries to layers. History is stored newest to oldest
/// and only non-empty entries consume a blob digest, so the pairing walks
/// both in reverse.
fn layers_from_history(
    config: &oci_spec::image::ImageConfiguration,
    layer_digests: &[String],
) -> Vec<Layer> {
    let empty_history = Vec::new();
    let history = config.history().as_ref().unwrap_or(&empty_history);

    let mut digest_idx = layer_digests.len();
    let mut layers = Vec::new();

    for (i, entry) in history.iter().enumerate().rev() {
        let is_empty = entry.empty_layer().unwrap_or(false);
        let id = if !is_empty && digest_idx > 0 {
            digest_idx -= 1;
            layer_digests[digest_idx].clone()
        } else {
            format!("<empty-layer-{}>", i)
        };

        let mut layer = Layer::new(id);
        layer.created_at = entry
            .created()
            .as_ref()
            .and_then(|created| DateTime::parse_from_rfc3339(created).ok())
            .map(|dt| dt.with_timezone(&Utc));
        if let Some(created_by) = entry.created_by() {
            layer.commands = commands_from_created_by(created_by);
        }
        layers.push(layer);
    }

    layers.reverse();
    layers
}

/// Extract the shell commands from a history `created_by` line.
///
/// `#(nop)` entries are build directives (ENV, CMD, ...) and carry no shell
/// command. Execution entries drop their shell prefix and split on `&&` so
/// chained package-manager calls classify independently.
pub fn commands_from_created_by(created_by: &str) -> Vec<ShellCommand> {
    let line = if created_by.contains("/bin/sh -c #(nop)") {
        return Vec::new();
    } else if let Some(rest) = created_by.split("/bin/sh -c ").nth(1) {
        rest
    } else if let Some(rest) = created_by.strip_prefix("RUN ") {
        rest
    } else {
        return Vec::new();
    };

    line.split("&&")
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(ShellCommand::parse)
        .collect()
}

/// `blobs/sha256/<hash>` and legacy `<hash>/layer.tar` both canonicalize to
/// `sha256:<hash>`.
fn digest_from_layer_path(layer_path: &str) -> String {
    let path = Path::new(layer_path);
    if let Some(parent) = path.parent() {
        if parent.file_name().and_then(|s| s.to_str()) == Some("sha256") {
            if let Some(hash) = path.file_name().and_then(|s| s.to_str()) {
                return format!("sha256:{}", hash);
            }
        }
        if path.file_name().and_then(|s| s.to_str()) == Some("layer.tar") {
            if let Some(hash) = parent.file_name().and_then(|s| s.to_str()) {
                return format!("sha256:{}", hash);
            }
        }
    }
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(layer_path);
    match name.strip_suffix(".tar") {
        Some(hash) => format!("sha256:{}", hash),
        None if name.starts_with("sha256:") => name.to_string(),
        None => format!("sha256:{}", name),
    }
}

/// The manifest digest recorded in index.json, falling back to the config
/// blob path.
fn image_id(extract_dir: &Path, config_file: &str) -> Option<String> {
    let index_path = extract_dir.join("index.json");
    if let Ok(content) = fs::read_to_string(&index_path) {
        if let Ok(index) = serde_json::from_str::<serde_json::Value>(&content) {
            if let Some(digest) = index["manifests"][0]["digest"].as_str() {
                return Some(digest.to_string());
            }
        }
    }
    if let Some(hash) = config_file.strip_prefix("blobs/sha256/") {
        return Some(format!("sha256:{}", hash));
    }
    config_file
        .strip_suffix(".json")
        .map(|hash| format!("sha256:{}", hash))
}

/// Unpack a plain or gzipped tar archive, keeping entries inside the
/// destination directory.
fn unpack_archive(tar_path: &Path, dest: &Path) -> Result<()> {
    let mut magic = [0u8; 2];
    File::open(tar_path)
        .with_context(|| format!("Failed to open tar file: {}", tar_path.display()))?
        .read_exact(&mut magic)
        .context("Failed to read magic bytes from tar file")?;

    let file = File::open(tar_path)?;
    let mut archive: tar::Archive<Box<dyn Read>> = if magic == [0x1f, 0x8b] {
        tar::Archive::new(Box::new(GzDecoder::new(file)))
    } else {
        tar::Archive::new(Box::new(file))
    };

    for entry_result in archive.entries()? {
        let mut entry = entry_result.context("Failed to read tar entry")?;
        let entry_path = entry.path().context("Failed to get entry path")?;
        let rel_path = sanitize_entry_path(&entry_path);
        let target = dest.join(&rel_path);

        match entry.header().entry_type() {
            tar::EntryType::Directory => {
                fs::create_dir_all(&target)?;
            }
            tar::EntryType::Regular => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut out = File::create(&target)
                    .with_context(|| format!("Failed to create file: {}", target.display()))?;
                std::io::copy(&mut entry, &mut out)
                    .with_context(|| format!("Failed to write file: {}", target.display()))?;
            }
            other => {
                log::debug!("Skipping tar entry type {:?}: {:?}", other, rel_path);
            }
        }
    }

    Ok(())
}

fn sanitize_entry_path(p: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in p.components() {
        match comp {
            Component::Normal(c) => out.push(c),
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    out
}
