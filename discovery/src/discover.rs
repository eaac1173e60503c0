//! Finding descriptor files on disk and in installed packages.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use nodl_core::is_descriptor_path;
use tracing::debug;

use crate::config::NodlConfig;

/// Typed error for descriptor discovery.
#[derive(Debug, thiserror::Error)]
pub enum DiscoverError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No install prefix registers the package.
    #[error("package '{0}' not found")]
    PackageNotFound(String),

    /// The package is installed but ships no descriptor files.
    #[error("{0} has no NoDL files in its ament index.")]
    NoDescriptorFiles(String),

    /// Requested file names that the package does not ship.
    #[error("{file} not found in {package}.\n Options are {available:?}")]
    FileNotInPackage {
        package: String,
        file: String,
        available: Vec<String>,
    },

    /// Invalid or missing input (e.g. non-existent path, bad package name).
    #[error("{0}")]
    InvalidInput(String),

    /// Unreadable or malformed configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// How far below a directory to look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// Only the directory's own entries.
    TopLevel,
    /// The whole tree below the directory.
    Recursive,
}

/// Relative location of a package's marker in the ament resource index.
const PACKAGE_INDEX: &str = "share/ament_index/resource_index/packages";

/// Returns every `*.nodl.xml` file under `dir`, sorted by path.
///
/// Symlinked directories are not followed.
pub fn descriptor_files_in(dir: &Path, scan: Scan) -> Result<Vec<PathBuf>, DiscoverError> {
    let mut found = BTreeSet::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current)? {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                if scan == Scan::Recursive {
                    pending.push(path);
                }
            } else if is_descriptor_path(&path) && path.is_file() {
                found.insert(path);
            }
        }
    }

    debug!(dir = %dir.display(), count = found.len(), "Scanned for descriptor files");
    Ok(found.into_iter().collect())
}

/// Resolves the share directory of an installed package.
///
/// Prefixes are searched in order; the first one whose resource index
/// registers `package` wins.
pub fn package_share_directory(package: &str, prefixes: &[PathBuf]) -> Result<PathBuf, DiscoverError> {
    validate_package_name(package)?;

    for prefix in prefixes {
        let marker = prefix.join(PACKAGE_INDEX).join(package);
        if marker.is_file() {
            let share = prefix.join("share").join(package);
            debug!(package, share = %share.display(), "Resolved package share directory");
            return Ok(share);
        }
    }
    Err(DiscoverError::PackageNotFound(package.to_string()))
}

/// Lists the descriptor files a package installs.
///
/// # Errors
///
/// [`DiscoverError::PackageNotFound`] when no prefix registers the package,
/// [`DiscoverError::NoDescriptorFiles`] when it ships none.
pub fn discover(package: &str, config: &NodlConfig) -> Result<Vec<PathBuf>, DiscoverError> {
    let share = package_share_directory(package, &config.prefixes())?;
    let paths = if share.is_dir() {
        descriptor_files_in(&share, Scan::Recursive)?
    } else {
        Vec::new()
    };
    if paths.is_empty() {
        return Err(DiscoverError::NoDescriptorFiles(package.to_string()));
    }
    Ok(paths)
}

/// Keeps the discovered paths whose file names were requested.
///
/// Output follows discovery order. Every requested name must match.
pub fn select_files(
    package: &str,
    paths: &[PathBuf],
    names: &[String],
) -> Result<Vec<PathBuf>, DiscoverError> {
    let available = file_names(paths);
    if let Some(missing) = names.iter().find(|name| !available.contains(*name)) {
        return Err(DiscoverError::FileNotInPackage {
            package: package.to_string(),
            file: missing.clone(),
            available,
        });
    }

    Ok(paths
        .iter()
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| names.iter().any(|wanted| wanted == name))
        })
        .cloned()
        .collect())
}

/// File names of `paths`, for completion and diagnostics.
pub fn file_names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .filter_map(|path| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .collect()
}

/// Expands explicit inputs into descriptor paths.
///
/// Files are taken as given, in order; directories contribute their
/// top-level `*.nodl.xml` files. Repeated paths are kept once.
pub fn collect_descriptor_paths(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, DiscoverError> {
    if inputs.is_empty() {
        return Err(DiscoverError::InvalidInput(
            "No descriptor paths were provided".to_string(),
        ));
    }

    let mut seen = BTreeSet::new();
    let mut paths = Vec::new();
    for input in inputs {
        let expanded = if input.is_dir() {
            descriptor_files_in(input, Scan::TopLevel)?
        } else if input.is_file() {
            vec![input.clone()]
        } else {
            return Err(DiscoverError::InvalidInput(format!(
                "Could not access {}",
                input.display()
            )));
        };

        for path in expanded {
            if seen.insert(path.clone()) {
                paths.push(path);
            }
        }
    }
    Ok(paths)
}

fn validate_package_name(package: &str) -> Result<(), DiscoverError> {
    let trimmed = package.trim();
    if trimmed.is_empty() || trimmed != package {
        return Err(DiscoverError::InvalidInput(format!(
            "Invalid package name '{package}'"
        )));
    }
    if package.contains(['/', '\\']) || package == "." || package == ".." {
        return Err(DiscoverError::InvalidInput(format!(
            "Invalid package name '{package}'"
        )));
    }
    Ok(())
}
