//! The remote item tree and its Graph implementation.
//!
//! ## Data Flow
//!
//! ```text
//! auth ──▶ graph ──▶ RemoteTree (trait) ──▶ resolve / upload
//! (token)  (HTTP)    (list, create, put)     (walker, matcher)
//! ```
//!
//! 1. [`auth`]  — client-credentials token and claim inspection
//! 2. [`graph`] — [`GraphClient`], the `RemoteTree` over the Graph REST API
//! 3. [`types`] — drive items, upload sessions and chunk ranges
//!
//! Everything above this module talks to [`RemoteTree`] only, so the
//! resolver, matcher and upload orchestrator can be exercised against an
//! in-memory tree.

pub mod auth;
pub mod graph;
pub mod types;

pub use graph::{check_connection, ConnectionReport, GraphClient};
pub use types::{chunk_ranges, ChunkRange, ChunkStatus, DriveItem, UploadSession};

use crate::error::RemoteError;

/// Read/write capability over a hierarchical item tree.
///
/// Implementations are driven sequentially; no method is called while
/// another is in flight.
#[allow(async_fn_in_trait)]
pub trait RemoteTree {
    /// The drive root.
    async fn root(&self) -> Result<DriveItem, RemoteError>;

    /// Every direct child of `parent`, folders and files, in storage order.
    async fn list_children(&self, parent: &DriveItem) -> Result<Vec<DriveItem>, RemoteError>;

    /// Item at a root-relative path.
    async fn get_by_path(&self, path: &str) -> Result<DriveItem, RemoteError>;

    /// Create a folder named `name` under `parent`. Fails with
    /// [`RemoteError::CreationConflict`] if the name is taken.
    async fn create_folder(&self, parent: &DriveItem, name: &str)
        -> Result<DriveItem, RemoteError>;

    /// Single-request upload, replacing any file with the same name.
    async fn upload_small(
        &self,
        folder: &DriveItem,
        name: &str,
        content: Vec<u8>,
    ) -> Result<DriveItem, RemoteError>;

    /// Open a resumable session for `name` under `folder` (replace on conflict).
    async fn create_upload_session(
        &self,
        folder: &DriveItem,
        name: &str,
    ) -> Result<UploadSession, RemoteError>;

    /// Send one chunk of a session.
    async fn upload_chunk(
        &self,
        session: &UploadSession,
        range: ChunkRange,
        content: Vec<u8>,
    ) -> Result<ChunkStatus, RemoteError>;
}
