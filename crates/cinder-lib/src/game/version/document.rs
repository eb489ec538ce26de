/// Version document parsing with inheritance support
use crate::game::launcher::types::OsType;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A node in a version inheritance chain, parsed from one remote document.
/// Field defaults mirror what the wire format leaves implicit: a missing
/// `mainClass` or `assetIndex` is a sentinel that a root document is not
/// allowed to carry (see [`VersionDocument::validate`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDocument {
    /// Version ID (e.g., "1.20.1" or "fabric-loader-0.15.0-1.20.1")
    pub id: String,

    /// Parent version to inherit from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inherits_from: Option<String>,

    /// Game and JVM argument token lists; `None` means the document declared
    /// no arguments at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Arguments>,

    /// Legacy space-delimited arguments (pre-1.13); folded into `arguments`
    /// by [`VersionDocument::from_json`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minecraft_arguments: Option<String>,

    /// Asset index reference; `None` is the "unset" sentinel
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_index: Option<AssetIndexRef>,

    /// Asset-group label (legacy versions)
    #[serde(default = "default_assets")]
    pub assets: String,

    /// Artifact-kind -> download descriptor ("client", "server", ...)
    #[serde(default)]
    pub downloads: HashMap<String, DownloadEntry>,

    #[serde(default)]
    pub libraries: Vec<Library>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    /// Main class to execute; `None` is the "none" sentinel
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_class: Option<String>,

    #[serde(default)]
    pub minimum_launcher_version: i32,

    #[serde(default = "default_compliance_level")]
    pub compliance_level: i32,

    pub release_time: String,

    pub time: String,

    /// Version type ("release", "snapshot", ...); may be empty
    #[serde(default, rename = "type")]
    pub version_type: String,
}

fn default_assets() -> String {
    "3".to_string()
}

fn default_compliance_level() -> i32 {
    3
}

impl VersionDocument {
    /// Parse a version document from raw JSON, folding a legacy
    /// `minecraftArguments` string into `arguments.game` (one literal token
    /// per whitespace-delimited word, empty `jvm`).
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let mut doc: VersionDocument =
            serde_json::from_slice(bytes).context("Failed to parse version document")?;
        doc.normalize_legacy_arguments();
        Ok(doc)
    }

    fn normalize_legacy_arguments(&mut self) {
        if self.arguments.is_none() {
            if let Some(legacy) = self.minecraft_arguments.take() {
                let game = legacy
                    .split_whitespace()
                    .map(|t| ArgumentToken::Plain(t.to_string()))
                    .collect();
                self.arguments = Some(Arguments { game, jvm: vec![] });
            }
        }
    }

    pub fn is_inheritor(&self) -> bool {
        self.inherits_from.is_some()
    }

    /// Root invariant: a document without a parent must be launchable on its
    /// own. Inheritors are always invalid as roots.
    pub fn validate(&self) -> bool {
        if self.is_inheritor() {
            return false;
        }

        if self.arguments.is_none() {
            return false;
        }

        if self.asset_index.is_none() {
            return false;
        }

        if self.downloads.is_empty() {
            return false;
        }

        if self.version_type.is_empty() {
            return false;
        }

        self.main_class.is_some()
    }
}

/// Game and JVM argument token lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arguments {
    #[serde(default)]
    pub game: Vec<ArgumentToken>,

    #[serde(default)]
    pub jvm: Vec<ArgumentToken>,
}

/// One argument token, either a plain string or gated behind rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgumentToken {
    Plain(String),

    Conditional {
        rules: Vec<Rule>,
        value: ArgumentValue,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    Single(String),
    Multiple(Vec<String>),
}

/// Rule gating a library or argument token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub action: RuleAction,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<OsRule>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<HashMap<String, bool>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OsRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

/// Evaluate a rule list: last matching rule wins, no match means disallow.
pub fn evaluate_rules(rules: &[Rule], os: OsType, features: &HashMap<String, bool>) -> bool {
    let mut allow = false;

    for rule in rules {
        let mut matches = true;

        if let Some(ref os_rule) = rule.os {
            if let Some(ref os_name) = os_rule.name {
                if os_name != os.as_str() {
                    matches = false;
                }
            }

            if matches {
                if let Some(ref arch) = os_rule.arch {
                    if arch != std::env::consts::ARCH {
                        matches = false;
                    }
                }
            }

            if matches {
                if let Some(ref version_expr) = os_rule.version {
                    // The expression is a regex matched against the host OS
                    // version string; a non-compiling expression never matches
                    if let Ok(re) = regex::Regex::new(version_expr) {
                        let host_version =
                            sysinfo::System::long_os_version().unwrap_or_default();
                        if !re.is_match(&host_version) {
                            matches = false;
                        }
                    } else {
                        matches = false;
                    }
                }
            }
        }

        if matches {
            if let Some(ref wanted) = rule.features {
                for (key, expected) in wanted {
                    let actual = features.get(key).copied().unwrap_or(false);
                    if actual != *expected {
                        matches = false;
                        break;
                    }
                }
            }
        }

        if matches {
            match rule.action {
                RuleAction::Allow => allow = true,
                RuleAction::Disallow => allow = false,
            }
        }
    }

    allow
}

/// One library dependency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Library {
    /// Maven coordinate: group:artifact:version
    pub name: String,

    /// Explicit download metadata (primary artifact + platform classifiers)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloads: Option<LibraryDownloads>,

    /// Custom base repository URL, used when no explicit downloads exist
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Rules gating applicability on the current platform
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Rule>>,

    /// OS name -> classifier template (e.g. "natives-windows-${arch}")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub natives: Option<HashMap<String, String>>,

    /// Path prefixes excluded from native extraction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extract: Option<ExtractRules>,
}

impl Library {
    /// Whether this library applies on the given platform
    pub fn applies_to(&self, os: OsType) -> bool {
        match &self.rules {
            Some(rules) => evaluate_rules(rules, os, &HashMap::new()),
            None => true,
        }
    }

    /// Relative repository path derived from the coordinate alone: each
    /// `.`-separated segment of the group and artifact parts becomes a path
    /// segment, joined as `group/artifact/version`. Used only when the
    /// document supplies no explicit artifact URL.
    pub fn coordinate_path(&self) -> Result<String> {
        let parts: Vec<&str> = self.name.split(':').collect();

        if parts.len() < 3 {
            anyhow::bail!("Invalid Maven coordinates: {}", self.name);
        }

        let group = parts[0].replace('.', "/");
        let artifact = parts[1].replace('.', "/");
        let version = parts[2];

        Ok(format!("{}/{}/{}", group, artifact, version))
    }

    /// Absolute artifact URL for a coordinate-only library
    pub fn coordinate_url(&self, base_url: &str) -> Result<String> {
        Ok(format!("{}{}", base_url, self.coordinate_path()?))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryDownloads {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub classifiers: Option<HashMap<String, Artifact>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractRules {
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Asset index reference descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndexRef {
    pub id: String,
    pub sha1: String,
    pub size: u64,
    #[serde(default)]
    pub total_size: u64,
    pub url: String,
}

/// One downloadable artifact of the version itself (client/server jar)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadEntry {
    pub url: String,
    pub sha1: String,
    pub size: u64,
}

/// Log4j-style logging configuration attached to some versions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<LoggingClientConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingClientConfig {
    pub argument: String,
    pub file: LoggingArtifact,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingArtifact {
    pub id: String,
    pub sha1: String,
    pub size: u64,
    pub url: String,
}
