//! Upload of one local file into one remote folder.
//!
//! Small files go up in a single request. Anything at or above the
//! configured limit goes through a resumable session, read from disk one
//! chunk at a time so large files are never held in memory whole.

use crate::config::CourierConfig;
use crate::error::RemoteError;
use crate::remote::{chunk_ranges, ChunkStatus, DriveItem, RemoteTree};
use std::io::SeekFrom;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info};

/// How a file of a given size is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStrategy {
    Simple,
    Chunked,
}

impl UploadStrategy {
    /// `Simple` strictly below `limit`, `Chunked` otherwise.
    pub fn for_size(size: u64, limit: u64) -> Self {
        if size < limit {
            UploadStrategy::Simple
        } else {
            UploadStrategy::Chunked
        }
    }
}

fn local_read(path: &Path, e: std::io::Error) -> RemoteError {
    RemoteError::LocalRead {
        path: path.display().to_string(),
        detail: e.to_string(),
    }
}

/// Upload `local` into `folder` as `remote_name`, replacing any existing
/// file of that name.
pub async fn upload_file<T: RemoteTree>(
    tree: &T,
    folder: &DriveItem,
    local: &Path,
    remote_name: &str,
    config: &CourierConfig,
) -> Result<DriveItem, RemoteError> {
    let size = tokio::fs::metadata(local)
        .await
        .map_err(|e| local_read(local, e))?
        .len();

    match UploadStrategy::for_size(size, config.simple_upload_limit) {
        UploadStrategy::Simple => {
            debug!("Simple upload of '{remote_name}' ({size} bytes)");
            let content = tokio::fs::read(local).await.map_err(|e| local_read(local, e))?;
            tree.upload_small(folder, remote_name, content).await
        }
        UploadStrategy::Chunked => {
            upload_chunked(tree, folder, local, remote_name, size, config.chunk_size).await
        }
    }
}

async fn upload_chunked<T: RemoteTree>(
    tree: &T,
    folder: &DriveItem,
    local: &Path,
    remote_name: &str,
    size: u64,
    chunk_size: u64,
) -> Result<DriveItem, RemoteError> {
    let ranges = chunk_ranges(size, chunk_size);
    info!(
        "Chunked upload of '{remote_name}' ({size} bytes, {} chunk(s))",
        ranges.len()
    );
    let session = tree.create_upload_session(folder, remote_name).await?;
    let mut file = tokio::fs::File::open(local)
        .await
        .map_err(|e| local_read(local, e))?;

    for range in ranges {
        file.seek(SeekFrom::Start(range.start))
            .await
            .map_err(|e| local_read(local, e))?;
        let mut buf = vec![0u8; range.length() as usize];
        file.read_exact(&mut buf)
            .await
            .map_err(|e| local_read(local, e))?;

        match tree.upload_chunk(&session, range, buf).await? {
            ChunkStatus::Accepted => debug!("Chunk {} accepted", range.header_value()),
            ChunkStatus::Completed(item) => return Ok(item),
        }
    }

    Err(RemoteError::SessionIncomplete {
        name: remote_name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_threshold_is_exclusive() {
        let limit = 4 * 1024 * 1024;
        assert_eq!(UploadStrategy::for_size(0, limit), UploadStrategy::Simple);
        assert_eq!(UploadStrategy::for_size(limit - 1, limit), UploadStrategy::Simple);
        assert_eq!(UploadStrategy::for_size(limit, limit), UploadStrategy::Chunked);
        assert_eq!(UploadStrategy::for_size(limit + 1, limit), UploadStrategy::Chunked);
    }
}
