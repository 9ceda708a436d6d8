//! Target resolution: from a configured path and a folder code to the
//! folder a file should land in.
//!
//! 1. [`walker`]  — base path to folder, optionally creating segments
//! 2. [`months`]  — month folders under the base, in configured order
//! 3. [`matcher`] — folder code to child folder (exact → prefix → contains)

pub mod matcher;
pub mod months;
pub mod walker;

pub use matcher::{match_folder, FolderMatch, MatchStrategy};
pub use months::select_months;
pub use walker::{path_segments, walk_path};
