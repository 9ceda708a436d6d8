//! Wire types for the drive item tree.

use serde::{Deserialize, Serialize};

/// Marker facet: present on folders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderFacet {
    #[serde(rename = "childCount", default)]
    pub child_count: Option<u64>,
}

/// Marker facet: present on files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFacet {
    #[serde(rename = "mimeType", default)]
    pub mime_type: Option<String>,
}

/// A node of the remote tree (`driveItem`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveItem {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "webUrl", default)]
    pub web_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<FolderFacet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileFacet>,
    #[serde(default)]
    pub size: Option<u64>,
}

impl DriveItem {
    /// A bare folder item. Used by fakes and tests.
    pub fn folder(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            web_url: None,
            folder: Some(FolderFacet::default()),
            file: None,
            size: None,
        }
    }

    /// A bare file item. Used by fakes and tests.
    pub fn file(id: impl Into<String>, name: impl Into<String>, size: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            web_url: None,
            folder: None,
            file: Some(FileFacet::default()),
            size: Some(size),
        }
    }

    pub fn is_folder(&self) -> bool {
        self.folder.is_some()
    }
}

/// One page of a collection response.
#[derive(Debug, Deserialize)]
pub(crate) struct Page<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,
}

/// A resumable upload session handed out by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSession {
    #[serde(rename = "uploadUrl")]
    pub upload_url: String,
    #[serde(rename = "expirationDateTime", default)]
    pub expiration: Option<String>,
}

/// Inclusive byte range of one chunk of a `total`-byte file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

impl ChunkRange {
    /// Number of bytes in the chunk.
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value of the `Content-Range` header.
    pub fn header_value(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total)
    }
}

/// Split `total` bytes into consecutive chunks of at most `chunk_size`.
pub fn chunk_ranges(total: u64, chunk_size: u64) -> Vec<ChunkRange> {
    let mut ranges = Vec::new();
    if chunk_size == 0 {
        return ranges;
    }
    let mut start = 0;
    while start < total {
        let end = (start + chunk_size).min(total) - 1;
        ranges.push(ChunkRange { start, end, total });
        start = end + 1;
    }
    ranges
}

/// The service's answer to one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkStatus {
    /// 202: keep sending.
    Accepted,
    /// 200/201: the file is complete.
    Completed(DriveItem),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialises_graph_item() {
        let json = r#"{
            "id": "01ABC",
            "name": "0701-0057_BCP",
            "webUrl": "https://contoso.sharepoint.com/x",
            "folder": {"childCount": 3}
        }"#;
        let item: DriveItem = serde_json::from_str(json).unwrap();
        assert!(item.is_folder());
        assert_eq!(item.folder.unwrap().child_count, Some(3));
        assert_eq!(item.web_url.as_deref(), Some("https://contoso.sharepoint.com/x"));
    }

    #[test]
    fn file_items_are_not_folders() {
        let json = r#"{"id": "9", "name": "a.pdf", "file": {"mimeType": "application/pdf"}, "size": 12}"#;
        let item: DriveItem = serde_json::from_str(json).unwrap();
        assert!(!item.is_folder());
        assert_eq!(item.size, Some(12));
    }

    #[test]
    fn chunk_ranges_cover_file_exactly() {
        let ranges = chunk_ranges(12, 5);
        assert_eq!(
            ranges,
            vec![
                ChunkRange { start: 0, end: 4, total: 12 },
                ChunkRange { start: 5, end: 9, total: 12 },
                ChunkRange { start: 10, end: 11, total: 12 },
            ]
        );
        assert_eq!(ranges.iter().map(ChunkRange::length).sum::<u64>(), 12);
        assert_eq!(ranges[2].header_value(), "bytes 10-11/12");
    }

    #[test]
    fn chunk_ranges_exact_multiple() {
        let ranges = chunk_ranges(10, 5);
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[1].end, 9);
    }

    #[test]
    fn chunk_ranges_empty_file() {
        assert!(chunk_ranges(0, 5).is_empty());
    }
}
