use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::domain::case::CaseContext;
use crate::domain::error::{AppError, Result};

pub const APP_DIR_NAME: &str = "Trace";

/// Per-user data directory for templates, scripts and downloads.
pub fn app_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Desktop, falling back to the home directory.
pub fn default_output_root() -> PathBuf {
    dirs::desktop_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn ensure_investigation_dir(case: &CaseContext) -> Result<PathBuf> {
    let dir = case.investigation_dir();
    ensure_dir(&dir).map_err(|e| {
        AppError::IoError(format!(
            "Failed to create investigation directory {}: {}",
            dir.display(),
            e
        ))
    })?;
    Ok(dir)
}

pub fn ensure_scripts_dir(app_data_dir: &Path) -> std::io::Result<PathBuf> {
    let scripts_dir = app_data_dir.join("scripts");
    ensure_dir(&scripts_dir)?;
    Ok(scripts_dir)
}

pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

pub fn sha256_hex_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path).map_err(|e| {
        AppError::IoError(format!(
            "Failed to open file for hashing {}: {e}",
            path.display()
        ))
    })?;

    let mut hasher = Sha256::new();
    let mut buf = [0u8; 1024 * 64];
    loop {
        let n = file.read(&mut buf).map_err(|e| {
            AppError::IoError(format!(
                "Failed to read file for hashing {}: {e}",
                path.display()
            ))
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}
