/// Core types for game launching
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default Maven repository for coordinate-only libraries
pub const LIBRARIES_BASE_URL: &str = "https://libraries.minecraft.net/";

/// Asset object store; objects live at `<2-hex-prefix>/<hash>` below this
pub const RESOURCES_BASE_URL: &str = "https://resources.download.minecraft.net/";

/// Host platform, as named by version-document rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsType {
    Windows,
    #[serde(rename = "osx")]
    MacOS,
    Linux,
}

impl OsType {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            OsType::Windows
        } else if cfg!(target_os = "macos") {
            OsType::MacOS
        } else {
            OsType::Linux
        }
    }

    /// Name used in rule `os.name` fields
    pub fn as_str(&self) -> &'static str {
        match self {
            OsType::Windows => "windows",
            OsType::MacOS => "osx",
            OsType::Linux => "linux",
        }
    }

    /// Key into a library's `natives` classifier map
    pub fn natives_key(&self) -> &'static str {
        self.as_str()
    }

    pub fn classpath_separator(&self) -> char {
        match self {
            OsType::Windows => ';',
            _ => ':',
        }
    }
}

impl std::fmt::Display for OsType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Specification for launching a game instance
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Unique identifier for this instance
    pub instance_id: String,

    /// Version ID to launch (e.g., "1.20.1" or a loader-installed id)
    pub version_id: String,

    /// Root data directory (libraries, assets, natives live below it)
    pub data_dir: PathBuf,

    /// Instance-specific game directory
    pub game_dir: PathBuf,

    /// Java executable path
    pub java_path: PathBuf,

    /// Player username
    pub username: String,

    /// Player UUID
    pub uuid: String,

    /// User type ("msa" or "legacy")
    pub user_type: String,

    /// Xbox User ID (optional, but recommended for MSA)
    pub xuid: Option<String>,

    /// OAuth client ID, passed through to the game's `--clientId`
    pub client_id: String,

    /// Custom JVM arguments (prepended to the document's)
    pub jvm_args: Vec<String>,

    /// Custom game arguments (appended to the document's)
    pub game_args: Vec<String>,

    /// Window width (optional)
    pub window_width: Option<u32>,

    /// Window height (optional)
    pub window_height: Option<u32>,

    /// Minimum memory in MB (optional)
    pub min_memory: Option<u32>,

    /// Maximum memory in MB (optional)
    pub max_memory: Option<u32>,
}

impl LaunchSpec {
    /// Spec for an offline session: a random player UUID and the legacy
    /// user type, which skips server-side token validation
    pub fn offline(
        instance_id: impl Into<String>,
        version_id: impl Into<String>,
        data_dir: PathBuf,
        game_dir: PathBuf,
        java_path: PathBuf,
        username: impl Into<String>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            version_id: version_id.into(),
            data_dir,
            game_dir,
            java_path,
            username: username.into(),
            uuid: uuid::Uuid::new_v4().to_string(),
            user_type: "legacy".to_string(),
            xuid: None,
            client_id: String::new(),
            jvm_args: vec![],
            game_args: vec![],
            window_width: None,
            window_height: None,
            min_memory: None,
            max_memory: None,
        }
    }

    /// Get the path to the libraries directory
    pub fn libraries_dir(&self) -> PathBuf {
        self.data_dir.join("libraries")
    }

    /// Get the path to the assets directory
    pub fn assets_dir(&self) -> PathBuf {
        self.data_dir.join("assets")
    }

    /// Get the path to the versions directory
    pub fn versions_dir(&self) -> PathBuf {
        self.data_dir.join("versions")
    }

    /// Get the path to the natives directory for this version
    /// (natives are shared per version, not per instance)
    pub fn natives_dir(&self) -> PathBuf {
        self.data_dir.join("natives").join(&self.version_id)
    }

    /// Path of the client jar for this version
    pub fn client_jar(&self) -> PathBuf {
        self.versions_dir()
            .join(&self.version_id)
            .join(format!("{}.jar", self.version_id))
    }
}

/// Handle to a running process
#[derive(Debug)]
pub struct ProcessHandle {
    /// Process ID
    pub pid: u32,

    /// Child process handle (optional for reattachment scenarios)
    pub child: Option<tokio::process::Child>,
}

/// Represents a running game instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameInstance {
    /// Unique instance identifier
    pub instance_id: String,

    /// Version ID that was launched
    pub version_id: String,

    /// Process ID
    pub pid: u32,

    /// When the instance was started
    #[serde(with = "chrono::serde::ts_seconds")]
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// Game directory
    pub game_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_spec() -> LaunchSpec {
        LaunchSpec {
            instance_id: "x".to_string(),
            version_id: "1.20.1".to_string(),
            data_dir: PathBuf::from("/tmp/data"),
            game_dir: PathBuf::from("/tmp/data/instances/x"),
            java_path: PathBuf::from("/usr/bin/java"),
            username: "player".to_string(),
            uuid: "00000000-0000-0000-0000-000000000000".to_string(),
            user_type: "msa".to_string(),
            xuid: None,
            client_id: "cid".to_string(),
            jvm_args: vec![],
            game_args: vec![],
            window_width: None,
            window_height: None,
            min_memory: None,
            max_memory: None,
        }
    }

    #[test]
    fn derived_paths_hang_off_data_dir() {
        let spec = sample_spec();
        assert_eq!(spec.libraries_dir(), PathBuf::from("/tmp/data/libraries"));
        assert_eq!(
            spec.natives_dir(),
            PathBuf::from("/tmp/data/natives/1.20.1")
        );
        assert_eq!(
            spec.client_jar(),
            PathBuf::from("/tmp/data/versions/1.20.1/1.20.1.jar")
        );
    }

    #[test]
    fn os_names_match_rule_vocabulary() {
        assert_eq!(OsType::Windows.as_str(), "windows");
        assert_eq!(OsType::MacOS.as_str(), "osx");
        assert_eq!(OsType::Linux.as_str(), "linux");
        assert_eq!(OsType::Windows.classpath_separator(), ';');
        assert_eq!(OsType::Linux.classpath_separator(), ':');
    }
}
