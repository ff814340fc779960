use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::error::{AppError, Result};

/// Subset of the GitHub "latest release" payload the updater reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReleaseInfo {
    pub tag_name: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UpdateCheck {
    UpToDate { current_version: String },
    Available {
        version: String,
        release_notes: String,
        assets: Vec<ReleaseAsset>,
    },
}

impl ReleaseInfo {
    /// Companion `<asset>.sha256` published alongside `asset`, if any.
    pub fn checksum_asset_for(&self, asset: &ReleaseAsset) -> Option<&ReleaseAsset> {
        let expected = format!("{}.sha256", asset.name);
        self.assets.iter().find(|candidate| candidate.name == expected)
    }

    /// First asset that is not itself a checksum file.
    pub fn primary_asset(&self) -> Option<&ReleaseAsset> {
        self.assets
            .iter()
            .find(|asset| !asset.name.ends_with(".sha256"))
    }
}

fn parse_version(version: &str) -> Result<Vec<u64>> {
    let trimmed = version.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    trimmed
        .split('.')
        .map(|part| {
            part.parse::<u64>().map_err(|_| {
                AppError::UpdateError(format!("Invalid version string '{}'", version))
            })
        })
        .collect()
}

/// Compares dotted numeric versions part by part; `1.0 < 1.0.0`.
pub fn compare_versions(left: &str, right: &str) -> Result<Ordering> {
    let left = parse_version(left)?;
    let right = parse_version(right)?;
    Ok(left.cmp(&right))
}

/// Pulls the hex digest out of a `sha256sum`-style checksum file.
pub fn parse_checksum(contents: &str) -> Option<String> {
    let digest = contents.split_whitespace().next()?.to_ascii_lowercase();
    let valid = digest.len() == 64 && digest.chars().all(|c| c.is_ascii_hexdigit());
    valid.then_some(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("v1.2.0", "1.0.0").unwrap(), Ordering::Greater);
        assert_eq!(compare_versions("1.0.0", "v1.0.0").unwrap(), Ordering::Equal);
        assert_eq!(compare_versions("1.9", "1.10").unwrap(), Ordering::Less);
        assert_eq!(compare_versions("1.0", "1.0.0").unwrap(), Ordering::Less);
    }

    #[test]
    fn test_compare_versions_rejects_labels() {
        assert!(compare_versions("v1.0.0-beta", "1.0.0").is_err());
        assert!(compare_versions("latest", "1.0.0").is_err());
    }

    #[test]
    fn test_checksum_lookup() {
        let release = ReleaseInfo {
            tag_name: "v1.1.0".to_string(),
            body: None,
            assets: vec![
                ReleaseAsset {
                    name: "trace-macos.zip".to_string(),
                    browser_download_url: "https://example.com/trace-macos.zip".to_string(),
                    size: 10,
                },
                ReleaseAsset {
                    name: "trace-macos.zip.sha256".to_string(),
                    browser_download_url: "https://example.com/trace-macos.zip.sha256"
                        .to_string(),
                    size: 64,
                },
            ],
        };
        let primary = release.primary_asset().unwrap();
        assert_eq!(primary.name, "trace-macos.zip");
        assert_eq!(
            release.checksum_asset_for(primary).unwrap().name,
            "trace-macos.zip.sha256"
        );
    }

    #[test]
    fn test_parse_checksum() {
        let digest = "A".repeat(64);
        assert_eq!(
            parse_checksum(&format!("{}  trace-macos.zip\n", digest)),
            Some("a".repeat(64))
        );
        assert_eq!(parse_checksum("not-a-digest"), None);
        assert_eq!(parse_checksum(""), None);
    }
}
