//! Resolves a slash-separated path to a folder, segment by segment.

use crate::error::RemoteError;
use crate::remote::{DriveItem, RemoteTree};
use tracing::debug;

/// Split a display path into trimmed, non-empty segments.
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split(['/', '\\'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Walk `path` from the drive root.
///
/// Each segment is looked up among the current folder's children by exact,
/// case-insensitive name. A missing segment is created when `create_missing`
/// is set, otherwise the walk stops with [`RemoteError::NotFound`] naming the
/// segment and the path walked so far. An empty path resolves to the root.
///
/// Walking the same path twice with `create_missing` creates nothing the
/// second time.
pub async fn walk_path<T: RemoteTree>(
    tree: &T,
    path: &str,
    create_missing: bool,
) -> Result<DriveItem, RemoteError> {
    let mut current = tree.root().await?;
    let mut walked: Vec<&str> = Vec::new();

    for segment in path_segments(path) {
        let wanted = segment.to_lowercase();
        let children = tree.list_children(&current).await?;
        let existing = children
            .into_iter()
            .find(|c| c.is_folder() && c.name.trim().to_lowercase() == wanted);

        current = match existing {
            Some(item) => item,
            None if create_missing => {
                debug!("Creating missing segment '{segment}'");
                tree.create_folder(&current, segment).await?
            }
            None => {
                return Err(RemoteError::NotFound {
                    segment: segment.to_string(),
                    parent: display_parent(&walked),
                })
            }
        };
        walked.push(segment);
    }

    Ok(current)
}

fn display_parent(walked: &[&str]) -> String {
    if walked.is_empty() {
        "/".to_string()
    } else {
        walked.join("/")
    }
}
