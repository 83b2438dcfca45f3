//! Workspace folder management for the request data.
//!
//! The layout produced here is `{base_path}/{uuid}/input` and
//! `{base_path}/{uuid}/output`, with the request storing the two paths
//! relative to the base folder.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, error, warn};

use crate::models::Request;

/// Ensure a folder exists, creating it (and its ancestors) if necessary.
///
/// Returns `false` if the path exists but is not a directory, or if the
/// creation failed.
pub fn ensure_folder(path: &Path) -> bool {
    if path.is_dir() {
        return true;
    }

    if path.exists() {
        error!(path = %path.display(), "The path exists but is not a directory");
        return false;
    }

    match std::fs::create_dir_all(path) {
        Ok(()) => true,
        Err(io_error) => {
            error!(path = %path.display(), error = %io_error, "Could not create the folder");
            false
        }
    }
}

/// The root data folder of a request, derived from its stored relative
/// folder paths.
///
/// Returns `None` if the request has no folders or if a stored path does not
/// resolve to a plain child of the base folder.
pub fn request_root_folder(request: &Request, base_path: &Path) -> Option<PathBuf> {
    let folder_in = request.folder_in.as_deref()?;
    let first_component = Path::new(folder_in).components().next()?;

    match first_component {
        Component::Normal(root_name) => Some(base_path.join(root_name)),
        _ => {
            error!(
                request_id = request.id,
                folder = %folder_in,
                "The stored request folder is not relative to the base folder"
            );
            None
        }
    }
}

/// Erase the folder tree that contains the data of a request. Best-effort:
/// a failure is logged and reported through the return value, never raised.
pub fn purge_request_folders(request: &Request, base_path: &Path) -> bool {
    let Some(root_folder) = request_root_folder(request, base_path) else {
        warn!(
            request_id = request.id,
            "The request has no data folder to delete."
        );
        return true;
    };

    if !root_folder.exists() {
        debug!(
            request_id = request.id,
            path = %root_folder.display(),
            "The request data folder does not exist, so nothing deleted."
        );
        return true;
    }

    match std::fs::remove_dir_all(&root_folder) {
        Ok(()) => {
            debug!(
                request_id = request.id,
                path = %root_folder.display(),
                "Request data folder deleted"
            );
            true
        }
        Err(io_error) => {
            warn!(
                request_id = request.id,
                path = %root_folder.display(),
                error = %io_error,
                "Some files in the request data folder could not be deleted"
            );
            false
        }
    }
}
