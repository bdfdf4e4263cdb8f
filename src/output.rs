//! Output directory guard
//!
//! A run only ever writes into a directory it created itself.

use crate::{ReconError, OUTPUT_DIR_PREFIX};
use chrono::{DateTime, TimeZone};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Pick the output directory without touching the filesystem beyond a
/// metadata lookup.
///
/// A user-supplied directory that already exists is rejected. Without one,
/// a timestamped name like `peepshot_2024_01_31_17_05_09` is derived.
pub fn resolve_output_dir<Tz>(
    requested: Option<&Path>,
    now: DateTime<Tz>,
) -> Result<PathBuf, ReconError>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    match requested {
        Some(path) if path.exists() => Err(ReconError::OutputExists(path.to_path_buf())),
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(PathBuf::from(format!(
            "{}{}",
            OUTPUT_DIR_PREFIX,
            now.format("%Y_%m_%d_%H_%M_%S")
        ))),
    }
}

/// Create the output directory. Fails if it appeared since it was resolved.
pub async fn prepare_output_dir(path: &Path) -> Result<(), ReconError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    match fs::create_dir(path).await {
        Ok(()) => {
            info!("Writing output to {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            Err(ReconError::OutputExists(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}
