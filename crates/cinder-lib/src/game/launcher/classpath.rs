/// Classpath construction from a flattened version document
use crate::game::launcher::types::OsType;
use crate::game::version::document::Library;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Convert Maven coordinates to an on-disk repository path.
/// Format: group:artifact:version[:classifier][@extension]
/// Example: "com.google.guava:guava:21.0" -> "com/google/guava/guava/21.0/guava-21.0.jar"
pub fn maven_to_path(coords: &str) -> Result<String> {
    let parts: Vec<&str> = coords.split(':').collect();

    if parts.len() < 3 {
        anyhow::bail!("Invalid Maven coordinates: {}", coords);
    }

    let group = parts[0].replace('.', "/");
    let artifact = parts[1];
    let mut version = parts[2];
    let mut classifier = None;
    let mut extension = "jar";

    if parts.len() == 3 {
        // group:artifact:version@extension
        if let Some((v, ext)) = version.split_once('@') {
            version = v;
            extension = ext;
        }
    } else {
        // group:artifact:version:classifier[@extension]
        if let Some((clf, ext)) = parts[3].split_once('@') {
            classifier = Some(clf);
            extension = ext;
        } else {
            classifier = Some(parts[3]);
        }
    }

    let filename = if let Some(clf) = classifier {
        format!("{}-{}-{}.{}", artifact, version, clf, extension)
    } else {
        format!("{}-{}.{}", artifact, version, extension)
    };

    Ok(format!("{}/{}/{}/{}", group, artifact, version, filename))
}

/// On-disk path (relative to the libraries dir) of a library's primary
/// artifact: the document's explicit path when present, otherwise derived
/// from the Maven coordinate
pub fn library_disk_path(library: &Library) -> Result<String> {
    if let Some(ref downloads) = library.downloads {
        if let Some(ref artifact) = downloads.artifact {
            if let Some(ref path) = artifact.path {
                return Ok(path.clone());
            }
        }
    }
    maven_to_path(&library.name)
}

/// Whether a library contributes a primary (non-natives-only) artifact
fn has_primary_artifact(library: &Library) -> bool {
    match &library.downloads {
        Some(downloads) => downloads.artifact.is_some(),
        // Coordinate-only libraries always have a primary artifact
        None => true,
    }
}

/// Build the JVM classpath: every applicable library's artifact followed by
/// the client jar, joined with the platform separator. Libraries are assumed
/// present on disk; the download stage runs first.
pub fn build_classpath(
    libraries: &[Library],
    libraries_dir: &Path,
    client_jar: &Path,
    os: OsType,
) -> Result<String> {
    let mut entries: Vec<String> = Vec::with_capacity(libraries.len() + 1);

    for library in libraries {
        if !library.applies_to(os) {
            continue;
        }
        if !has_primary_artifact(library) {
            continue;
        }

        let full_path: PathBuf = libraries_dir.join(library_disk_path(library)?);
        if !full_path.exists() {
            log::warn!("Classpath entry missing on disk: {:?}", full_path);
        }
        entries.push(full_path.to_string_lossy().to_string());
    }

    entries.push(client_jar.to_string_lossy().to_string());

    Ok(entries.join(&os.classpath_separator().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::version::document::{Artifact, LibraryDownloads, Rule, RuleAction};

    #[test]
    fn maven_to_path_simple() {
        let path = maven_to_path("com.google.guava:guava:21.0").unwrap();
        assert_eq!(path, "com/google/guava/guava/21.0/guava-21.0.jar");
    }

    #[test]
    fn maven_to_path_with_classifier() {
        let path = maven_to_path("org.lwjgl:lwjgl:3.3.1:natives-windows").unwrap();
        assert_eq!(
            path,
            "org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1-natives-windows.jar"
        );
    }

    #[test]
    fn maven_to_path_with_extension() {
        let path = maven_to_path("com.example:lib:1.0:sources@zip").unwrap();
        assert_eq!(path, "com/example/lib/1.0/lib-1.0-sources.zip");
    }

    #[test]
    fn maven_to_path_rejects_short_coords() {
        assert!(maven_to_path("just-a-name").is_err());
    }

    fn coordinate_library(name: &str) -> Library {
        Library {
            name: name.to_string(),
            downloads: None,
            url: None,
            rules: None,
            natives: None,
            extract: None,
        }
    }

    #[test]
    fn classpath_ends_with_client_jar() {
        let libraries = vec![coordinate_library("com.example:lib-a:1.0")];
        let cp = build_classpath(
            &libraries,
            Path::new("/data/libraries"),
            Path::new("/data/versions/1.20.1/1.20.1.jar"),
            OsType::Linux,
        )
        .unwrap();

        assert_eq!(
            cp,
            "/data/libraries/com/example/lib-a/1.0/lib-a-1.0.jar:/data/versions/1.20.1/1.20.1.jar"
        );
    }

    #[test]
    fn explicit_artifact_path_wins_over_coordinate() {
        let library = Library {
            name: "com.example:lib-a:1.0".to_string(),
            downloads: Some(LibraryDownloads {
                artifact: Some(Artifact {
                    path: Some("custom/location/lib-a.jar".to_string()),
                    url: None,
                    sha1: None,
                    size: None,
                }),
                classifiers: None,
            }),
            url: None,
            rules: None,
            natives: None,
            extract: None,
        };

        assert_eq!(
            library_disk_path(&library).unwrap(),
            "custom/location/lib-a.jar"
        );
    }

    #[test]
    fn inapplicable_library_is_excluded() {
        let mut library = coordinate_library("com.example:other-os-only:1.0");
        library.rules = Some(vec![Rule {
            action: RuleAction::Disallow,
            os: None,
            features: None,
        }]);

        let cp = build_classpath(
            &[library],
            Path::new("/data/libraries"),
            Path::new("/data/client.jar"),
            OsType::Linux,
        )
        .unwrap();

        assert_eq!(cp, "/data/client.jar");
    }
}
