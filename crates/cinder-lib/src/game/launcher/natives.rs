/// Native library extraction: resolve the platform classifier jar for each
/// library and unpack it into the per-version natives directory
use crate::game::launcher::classpath::maven_to_path;
use crate::game::launcher::error::LaunchError;
use crate::game::launcher::progress::ProgressTracker;
use crate::game::launcher::types::OsType;
use crate::game::version::document::{Artifact, Library};
use std::path::{Path, PathBuf};

/// Arch bits for `${arch}` classifier templates
pub(crate) fn arch_bits() -> &'static str {
    if cfg!(target_pointer_width = "32") {
        "32"
    } else {
        "64"
    }
}

/// Permissive classifier-key match: "osx" and "macos" are interchangeable
fn classifier_key_matches_os(key: &str, os: OsType) -> bool {
    let key = key.to_lowercase();
    if key.contains(os.as_str()) {
        return true;
    }
    os == OsType::MacOS && key.contains("macos")
}

/// Resolve the classifier string naming this library's natives jar for the
/// given platform, or `None` when the library carries no natives for it
pub fn resolve_native_classifier(library: &Library, os: OsType) -> Option<String> {
    if let Some(ref natives) = library.natives {
        if let Some(template) = natives.get(os.natives_key()) {
            return Some(template.replace("${arch}", arch_bits()));
        }
    }

    if let Some(ref downloads) = library.downloads {
        if let Some(ref classifiers) = downloads.classifiers {
            for key in classifiers.keys() {
                if classifier_key_matches_os(key, os) {
                    return Some(key.replace("${arch}", arch_bits()));
                }
            }
        }
    }

    None
}

/// Download metadata for the resolved natives classifier, when the document
/// declares it explicitly
pub fn native_artifact<'a>(library: &'a Library, classifier: &str) -> Option<&'a Artifact> {
    library
        .downloads
        .as_ref()
        .and_then(|d| d.classifiers.as_ref())
        .and_then(|c| c.get(classifier))
}

/// On-disk path (relative to the libraries dir) of a natives classifier jar
pub fn native_disk_path(library: &Library, classifier: &str) -> anyhow::Result<String> {
    if let Some(artifact) = native_artifact(library, classifier) {
        if let Some(ref path) = artifact.path {
            return Ok(path.clone());
        }
    }
    maven_to_path(&format!("{}:{}", library.name, classifier))
}

/// Extract the natives jars of every applicable library into `natives_dir`.
/// One tracker unit per library with natives; honors exclude rules and
/// cooperative cancellation between libraries.
pub async fn extract_natives(
    libraries: &[Library],
    libraries_dir: &Path,
    natives_dir: &Path,
    os: OsType,
    tracker: &ProgressTracker,
) -> Result<(), LaunchError> {
    tokio::fs::create_dir_all(natives_dir)
        .await
        .map_err(|e| LaunchError::CreatingFile {
            path: natives_dir.display().to_string(),
            source: e,
        })?;

    for library in libraries {
        if tracker.is_cancelled() {
            return Err(LaunchError::Cancelled);
        }

        if !library.applies_to(os) {
            continue;
        }

        let Some(classifier) = resolve_native_classifier(library, os) else {
            continue;
        };

        let jar_path: PathBuf = libraries_dir.join(
            native_disk_path(library, &classifier)
                .map_err(|e| LaunchError::Unknown { source: e })?,
        );

        if !jar_path.exists() {
            log::warn!(
                "Natives jar missing for {} ({}): {:?}",
                library.name,
                classifier,
                jar_path
            );
            tracker.inc(1);
            continue;
        }

        log::debug!("Extracting natives from: {:?}", jar_path);
        extract_jar(&jar_path, natives_dir, library)?;
        tracker.inc(1);
    }

    Ok(())
}

fn extract_jar(jar_path: &Path, output_dir: &Path, library: &Library) -> Result<(), LaunchError> {
    let unknown = |source: anyhow::Error| LaunchError::Unknown { source };

    let file = std::fs::File::open(jar_path)
        .map_err(|e| unknown(anyhow::Error::new(e).context(format!("opening {:?}", jar_path))))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| unknown(anyhow::Error::new(e).context(format!("reading {:?}", jar_path))))?;

    let exclusions = library
        .extract
        .as_ref()
        .map(|e| e.exclude.as_slice())
        .unwrap_or(&[]);

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| unknown(e.into()))?;

        if entry.is_dir() {
            continue;
        }
        if should_exclude(entry.name(), exclusions) {
            continue;
        }

        // Zip entry names come from the archive; reject any that escape
        let Some(relative) = entry.enclosed_name() else {
            log::warn!("Skipping unsafe zip entry: {}", entry.name());
            continue;
        };
        let output_path = output_dir.join(relative);

        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LaunchError::CreatingFile {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let mut output_file =
            std::fs::File::create(&output_path).map_err(|e| LaunchError::CreatingFile {
                path: output_path.display().to_string(),
                source: e,
            })?;
        std::io::copy(&mut entry, &mut output_file).map_err(|e| unknown(e.into()))?;
    }

    Ok(())
}

fn should_exclude(file_path: &str, exclusions: &[String]) -> bool {
    exclusions.iter().any(|e| file_path.starts_with(e))
}
