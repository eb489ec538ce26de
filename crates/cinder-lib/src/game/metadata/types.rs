use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of the remote version catalog. Carries just enough information
/// to list installable versions and to locate a document by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialVersion {
    /// Version ID (e.g., "1.20.1")
    pub id: String,

    #[serde(rename = "type")]
    pub version_type: VersionType,

    /// URL of the full version document
    pub url: String,

    pub time: DateTime<Utc>,

    pub release_time: DateTime<Utc>,

    /// SHA-1 of the version document at `url`
    pub sha1: String,

    #[serde(default)]
    pub compliance_level: i32,
}

/// Version channel as reported by the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionType {
    Release,
    Snapshot,
    OldBeta,
    OldAlpha,
}

impl VersionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionType::Release => "release",
            VersionType::Snapshot => "snapshot",
            VersionType::OldBeta => "old_beta",
            VersionType::OldAlpha => "old_alpha",
        }
    }
}

impl std::fmt::Display for VersionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for VersionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "release" => Ok(VersionType::Release),
            "snapshot" => Ok(VersionType::Snapshot),
            "old_beta" => Ok(VersionType::OldBeta),
            "old_alpha" => Ok(VersionType::OldAlpha),
            _ => Err(anyhow::anyhow!("Unknown version type: {}", s)),
        }
    }
}

/// Latest release/snapshot pointers from the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestVersions {
    pub release: String,
    pub snapshot: String,
}

/// The remote version catalog, fetched once per process lifetime.
/// Entry order matches the remote listing (newest first).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionCatalog {
    pub latest: LatestVersions,
    pub versions: Vec<PartialVersion>,
}

impl VersionCatalog {
    /// Look up a catalog entry by version id
    pub fn find(&self, id: &str) -> Option<&PartialVersion> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// Iterate over stable releases only
    pub fn releases(&self) -> impl Iterator<Item = &PartialVersion> {
        self.versions
            .iter()
            .filter(|v| v.version_type == VersionType::Release)
    }
}
