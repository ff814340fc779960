use crate::domain::error::{AppError, Result};
use crate::domain::release::{compare_versions, parse_checksum, ReleaseAsset, UpdateCheck};
use crate::infrastructure::releases::ReleaseSource;
use crate::infrastructure::storage::{ensure_dir, sha256_hex_file};
use serde::Serialize;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct DownloadedUpdate {
    pub version: String,
    pub asset: String,
    pub path: PathBuf,
    pub bytes: u64,
    pub sha256: String,
    /// Whether a published checksum was found and matched.
    pub verified: bool,
}

pub struct AppUpdateUseCase {
    source: Arc<dyn ReleaseSource + Send + Sync>,
    current_version: String,
    updates_dir: PathBuf,
}

impl AppUpdateUseCase {
    pub fn new(
        source: Arc<dyn ReleaseSource + Send + Sync>,
        current_version: impl Into<String>,
        updates_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            current_version: current_version.into(),
            updates_dir: updates_dir.into(),
        }
    }

    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    pub async fn check(&self) -> Result<UpdateCheck> {
        let release = self.source.latest_release().await?;
        match compare_versions(&release.tag_name, &self.current_version)? {
            Ordering::Greater => {
                info!(version = %release.tag_name, "New version available");
                Ok(UpdateCheck::Available {
                    version: release.tag_name,
                    release_notes: release.body.unwrap_or_default(),
                    assets: release.assets,
                })
            }
            _ => Ok(UpdateCheck::UpToDate {
                current_version: self.current_version.clone(),
            }),
        }
    }

    /// Downloads an asset of the latest release (the first non-checksum
    /// asset when `asset_name` is `None`) into the updates directory.
    pub async fn download(&self, asset_name: Option<&str>) -> Result<DownloadedUpdate> {
        let release = self.source.latest_release().await?;

        let asset: &ReleaseAsset = match asset_name {
            Some(name) => release
                .assets
                .iter()
                .find(|asset| asset.name == name)
                .ok_or_else(|| {
                    AppError::NotFound(format!(
                        "Release {} has no asset named '{}'",
                        release.tag_name, name
                    ))
                })?,
            None => release.primary_asset().ok_or_else(|| {
                AppError::NotFound(format!("Release {} has no assets", release.tag_name))
            })?,
        };

        let file_name = Path::new(&asset.name)
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                AppError::UpdateError(format!("Unusable asset name '{}'", asset.name))
            })?;

        ensure_dir(&self.updates_dir)?;
        let path = self.updates_dir.join(file_name);
        let partial = self.updates_dir.join(format!("{}.part", file_name));

        info!(asset = %asset.name, version = %release.tag_name, "Downloading update");
        let bytes = match self
            .source
            .download_to(&asset.browser_download_url, &partial)
            .await
        {
            Ok(bytes) => bytes,
            Err(err) => {
                let _ = std::fs::remove_file(&partial);
                return Err(err);
            }
        };

        let sha256 = sha256_hex_file(&partial)?;
        let verified = match release.checksum_asset_for(asset) {
            Some(checksum_asset) => {
                let expected = self
                    .source
                    .fetch_text(&checksum_asset.browser_download_url)
                    .await
                    .and_then(|text| {
                        parse_checksum(&text).ok_or_else(|| {
                            AppError::UpdateError(format!(
                                "Malformed checksum file {}",
                                checksum_asset.name
                            ))
                        })
                    });
                match expected {
                    Ok(expected) if expected == sha256 => true,
                    Ok(expected) => {
                        let _ = std::fs::remove_file(&partial);
                        return Err(AppError::UpdateError(format!(
                            "Checksum mismatch for {}: expected {}, got {}",
                            asset.name, expected, sha256
                        )));
                    }
                    Err(err) => {
                        let _ = std::fs::remove_file(&partial);
                        return Err(err);
                    }
                }
            }
            None => {
                warn!(asset = %asset.name, "No checksum published; download not verified");
                false
            }
        };

        std::fs::rename(&partial, &path)?;
        info!(path = %path.display(), bytes, verified, "Update downloaded");

        Ok(DownloadedUpdate {
            version: release.tag_name.clone(),
            asset: asset.name.clone(),
            path,
            bytes,
            sha256,
            verified,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::release::ReleaseInfo;
    use async_trait::async_trait;
    use sha2::{Digest, Sha256};

    const PAYLOAD: &[u8] = b"release archive bytes";

    struct StubSource {
        release: ReleaseInfo,
        checksum: String,
    }

    fn asset(name: &str) -> ReleaseAsset {
        ReleaseAsset {
            name: name.to_string(),
            browser_download_url: format!("https://downloads.example/{}", name),
            size: 0,
        }
    }

    fn stub(tag: &str, assets: Vec<ReleaseAsset>, checksum: String) -> Arc<StubSource> {
        Arc::new(StubSource {
            release: ReleaseInfo {
                tag_name: tag.to_string(),
                body: Some("Bug fixes".to_string()),
                assets,
            },
            checksum,
        })
    }

    fn payload_digest() -> String {
        hex::encode(Sha256::digest(PAYLOAD))
    }

    #[async_trait]
    impl ReleaseSource for StubSource {
        async fn latest_release(&self) -> Result<ReleaseInfo> {
            Ok(self.release.clone())
        }

        async fn fetch_text(&self, _url: &str) -> Result<String> {
            Ok(self.checksum.clone())
        }

        async fn download_to(&self, _url: &str, dest: &Path) -> Result<u64> {
            std::fs::write(dest, PAYLOAD)?;
            Ok(PAYLOAD.len() as u64)
        }
    }

    #[tokio::test]
    async fn test_check_reports_newer_release() {
        let dir = tempfile::tempdir().unwrap();
        let use_case = AppUpdateUseCase::new(
            stub("v1.2.0", vec![asset("trace.zip")], String::new()),
            "1.0.0",
            dir.path(),
        );
        match use_case.check().await.unwrap() {
            UpdateCheck::Available {
                version,
                release_notes,
                assets,
            } => {
                assert_eq!(version, "v1.2.0");
                assert_eq!(release_notes, "Bug fixes");
                assert_eq!(assets.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_check_same_or_older_is_up_to_date() {
        let dir = tempfile::tempdir().unwrap();
        let use_case = AppUpdateUseCase::new(stub("v1.0.0", vec![], String::new()), "1.0.0", dir.path());
        assert_eq!(
            use_case.check().await.unwrap(),
            UpdateCheck::UpToDate {
                current_version: "1.0.0".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_download_verifies_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let source = stub(
            "v1.2.0",
            vec![asset("trace.zip"), asset("trace.zip.sha256")],
            format!("{}  trace.zip\n", payload_digest()),
        );
        let use_case = AppUpdateUseCase::new(source, "1.0.0", dir.path().join("updates"));

        let downloaded = use_case.download(None).await.unwrap();
        assert!(downloaded.verified);
        assert_eq!(downloaded.asset, "trace.zip");
        assert_eq!(downloaded.path, dir.path().join("updates").join("trace.zip"));
        assert_eq!(std::fs::read(&downloaded.path).unwrap(), PAYLOAD);
        assert!(!dir.path().join("updates").join("trace.zip.part").exists());
    }

    #[tokio::test]
    async fn test_download_rejects_mismatched_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let source = stub(
            "v1.2.0",
            vec![asset("trace.zip"), asset("trace.zip.sha256")],
            "0".repeat(64),
        );
        let use_case = AppUpdateUseCase::new(source, "1.0.0", dir.path());

        let err = use_case.download(Some("trace.zip")).await.unwrap_err();
        assert!(matches!(err, AppError::UpdateError(_)));
        assert!(!dir.path().join("trace.zip").exists());
        assert!(!dir.path().join("trace.zip.part").exists());
    }

    #[tokio::test]
    async fn test_download_without_checksum_is_unverified() {
        let dir = tempfile::tempdir().unwrap();
        let use_case = AppUpdateUseCase::new(
            stub("v1.2.0", vec![asset("trace.zip")], String::new()),
            "1.0.0",
            dir.path(),
        );
        let downloaded = use_case.download(None).await.unwrap();
        assert!(!downloaded.verified);
        assert_eq!(downloaded.sha256, payload_digest());

        let err = use_case.download(Some("other.zip")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
