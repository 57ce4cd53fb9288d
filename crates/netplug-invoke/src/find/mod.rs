//! Locating plugin executables in a list of search directories.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

const FIND_TARGET: &str = "netplug_invoke::find";

/// Errors raised while resolving a plugin name to an executable path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FindError {
    /// The plugin name was empty.
    #[error("plugin name must not be empty")]
    EmptyName,
    /// No directories were supplied to search.
    #[error("no search directories given for plugin {name:?}")]
    NoDirectories {
        /// Plugin that was requested.
        name: String,
    },
    /// No directory held a matching file.
    #[error("failed to find plugin {name:?} in path [{}]", display_dirs(.dirs))]
    NotFound {
        /// Plugin that was requested.
        name: String,
        /// Directories searched, in order.
        dirs: Vec<PathBuf>,
    },
}

fn display_dirs(dirs: &[PathBuf]) -> String {
    dirs.iter()
        .map(|dir| dir.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Returns the first `dir/name` among `dirs` that is a regular file.
///
/// On Windows `dir/name.exe` is tried after `dir/name` in each directory.
/// The file is not checked for execute permission; launching a
/// non-executable file fails later as a launch error.
///
/// # Errors
///
/// Returns [`FindError::EmptyName`] or [`FindError::NoDirectories`] for
/// unusable arguments and [`FindError::NotFound`] when no directory holds
/// the plugin.
///
/// # Example
///
/// ```no_run
/// use netplug_invoke::find::find_in_path;
///
/// let path = find_in_path("bridge", &["/opt/cni/bin"]);
/// ```
pub fn find_in_path<P: AsRef<Path>>(name: &str, dirs: &[P]) -> Result<PathBuf, FindError> {
    if name.is_empty() {
        return Err(FindError::EmptyName);
    }
    if dirs.is_empty() {
        return Err(FindError::NoDirectories {
            name: name.to_owned(),
        });
    }

    let found = dirs
        .iter()
        .flat_map(|dir| candidates(dir.as_ref(), name))
        .find(|candidate| candidate.is_file());

    match found {
        Some(path) => {
            debug!(
                target: FIND_TARGET,
                plugin = name,
                path = %path.display(),
                "resolved plugin"
            );
            Ok(path)
        }
        None => Err(FindError::NotFound {
            name: name.to_owned(),
            dirs: dirs.iter().map(|dir| dir.as_ref().to_path_buf()).collect(),
        }),
    }
}

#[cfg(not(windows))]
fn candidates(dir: &Path, name: &str) -> Vec<PathBuf> {
    vec![dir.join(name)]
}

#[cfg(windows)]
fn candidates(dir: &Path, name: &str) -> Vec<PathBuf> {
    vec![dir.join(name), dir.join(format!("{name}.exe"))]
}
