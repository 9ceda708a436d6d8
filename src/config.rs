//! Configuration types.
//!
//! Three values are built once at startup and passed by reference into every
//! component:
//!
//! * [`TenantConfig`] — who we are and where we write: tenant and
//!   application credentials, site, document library, default base path and
//!   the ordered month list. Loaded from a JSON document.
//! * [`CourierConfig`] — how the distribution run behaves: upload strategy
//!   threshold, chunk size, timeouts, create-missing and dry-run switches.
//! * [`ExtractionConfig`] — how certificate blocks are located and cropped.
//!
//! The run settings use builders so callers set only what they care about.

use crate::error::CourierError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the client secret from the file.
pub const CLIENT_SECRET_ENV: &str = "DOC_COURIER_CLIENT_SECRET";

/// Graph resumable uploads require chunk sizes in multiples of 320 KiB.
pub const CHUNK_ALIGNMENT: u64 = 320 * 1024;

const MIB: u64 = 1024 * 1024;

fn default_graph_base_url() -> String {
    "https://graph.microsoft.com/v1.0".to_string()
}

fn default_login_base_url() -> String {
    "https://login.microsoftonline.com".to_string()
}

/// Tenant, site and drive coordinates plus the folder layout defaults.
///
/// # Example document
/// ```json
/// {
///   "tenant_id": "00000000-0000-0000-0000-000000000000",
///   "client_id": "11111111-1111-1111-1111-111111111111",
///   "client_secret": "…",
///   "site_hostname": "contoso.sharepoint.com",
///   "site_path": "/sites/Finance",
///   "document_library": "Invoices",
///   "base_path": "LJC/2025",
///   "months": ["ENERO", "FEBRERO", "MARZO"]
/// }
/// ```
///
/// The same fields may instead sit under a `"sharepoint"` object, and the
/// older key names `site_domain`, `site_name` and `lista_meses` are accepted.
#[derive(Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    pub tenant_id: String,
    pub client_id: String,

    /// Never serialised back out. May be empty in the file when supplied via
    /// [`CLIENT_SECRET_ENV`].
    #[serde(default, skip_serializing)]
    pub client_secret: String,

    /// Host only, e.g. `contoso.sharepoint.com`.
    #[serde(alias = "site_domain")]
    pub site_hostname: String,

    /// Server-relative site path. `Finance` is shorthand for `/sites/Finance`.
    #[serde(alias = "site_name")]
    pub site_path: String,

    /// Display name of the document library (drive) inside the site.
    pub document_library: String,

    /// Default base path used when a row carries no override.
    #[serde(default)]
    pub base_path: String,

    /// Ordered month (or other top-level segment) names under the base.
    #[serde(default, alias = "lista_meses")]
    pub months: Vec<String>,

    #[serde(default = "default_graph_base_url")]
    pub graph_base_url: String,

    #[serde(default = "default_login_base_url")]
    pub login_base_url: String,
}

impl fmt::Debug for TenantConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantConfig")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &if self.client_secret.is_empty() {
                    "<unset>"
                } else {
                    "<redacted>"
                },
            )
            .field("site_hostname", &self.site_hostname)
            .field("site_path", &self.site_path)
            .field("document_library", &self.document_library)
            .field("base_path", &self.base_path)
            .field("months", &self.months)
            .field("graph_base_url", &self.graph_base_url)
            .finish()
    }
}

impl TenantConfig {
    /// Load the document from `path`, apply the environment override for
    /// the secret and validate.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CourierError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| CourierError::ConfigUnreadable {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        let mut config = Self::from_json(&raw).map_err(|e| CourierError::ConfigUnreadable {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        if let Ok(secret) = std::env::var(CLIENT_SECRET_ENV) {
            if !secret.trim().is_empty() {
                config.client_secret = secret;
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse a document, unwrapping a top-level `"sharepoint"` section if
    /// there is one. Does not validate.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let mut doc: serde_json::Value = serde_json::from_str(raw)?;
        let section = match doc.as_object_mut() {
            Some(map) if map.get("sharepoint").is_some_and(|v| v.is_object()) => {
                map.remove("sharepoint").unwrap_or_default()
            }
            _ => doc,
        };
        serde_json::from_value(section)
    }

    /// Check that every field the run depends on is present.
    pub fn validate(&self) -> Result<(), CourierError> {
        let required = [
            ("tenant_id", &self.tenant_id),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("site_hostname", &self.site_hostname),
            ("site_path", &self.site_path),
            ("document_library", &self.document_library),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, v)| v.trim().is_empty())
            .map(|(k, _)| *k)
            .collect();
        if !missing.is_empty() {
            return Err(CourierError::InvalidConfig(format!(
                "missing {} (the secret may also come from {CLIENT_SECRET_ENV})",
                missing.join(", ")
            )));
        }
        if self.site_hostname.contains("://") {
            return Err(CourierError::InvalidConfig(format!(
                "site_hostname must be a bare host, got '{}'",
                self.site_hostname
            )));
        }
        Ok(())
    }

    /// Site path in the `/sites/Name` form Graph expects after the host.
    pub fn normalized_site_path(&self) -> String {
        let p = self.site_path.trim().trim_end_matches('/');
        if p.starts_with('/') {
            p.to_string()
        } else {
            format!("/sites/{p}")
        }
    }
}

/// Settings for a distribution run.
///
/// Built via [`CourierConfig::builder()`] or [`CourierConfig::default()`].
///
/// # Example
/// ```rust
/// use doc_courier::CourierConfig;
///
/// let config = CourierConfig::builder()
///     .dry_run(true)
///     .create_missing(false)
///     .build()
///     .unwrap();
/// assert!(config.dry_run);
/// ```
#[derive(Clone)]
pub struct CourierConfig {
    /// Files smaller than this use a single PUT; files of this size or
    /// larger use a resumable session. Default: 4 MiB.
    pub simple_upload_limit: u64,

    /// Bytes per resumable-session chunk. Multiple of 320 KiB. Default: 5 MiB.
    pub chunk_size: u64,

    /// Timeout for listing and lookups, in seconds. Default: 30.
    pub read_timeout_secs: u64,

    /// Timeout for folder and session creation, in seconds. Default: 60.
    pub write_timeout_secs: u64,

    /// Timeout for single-request uploads, in seconds. Default: 120.
    pub upload_timeout_secs: u64,

    /// Timeout per session chunk, in seconds. Default: 180.
    pub chunk_timeout_secs: u64,

    /// Create absent base-path segments instead of failing. Default: false.
    pub create_missing: bool,

    /// Resolve and match everything but never mutate the remote tree.
    pub dry_run: bool,

    /// Optional per-row progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self {
            simple_upload_limit: 4 * MIB,
            chunk_size: 5 * MIB,
            read_timeout_secs: 30,
            write_timeout_secs: 60,
            upload_timeout_secs: 120,
            chunk_timeout_secs: 180,
            create_missing: false,
            dry_run: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for CourierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CourierConfig")
            .field("simple_upload_limit", &self.simple_upload_limit)
            .field("chunk_size", &self.chunk_size)
            .field("read_timeout_secs", &self.read_timeout_secs)
            .field("write_timeout_secs", &self.write_timeout_secs)
            .field("upload_timeout_secs", &self.upload_timeout_secs)
            .field("chunk_timeout_secs", &self.chunk_timeout_secs)
            .field("create_missing", &self.create_missing)
            .field("dry_run", &self.dry_run)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn CourierProgressCallback>"),
            )
            .finish()
    }
}

impl CourierConfig {
    /// Create a new builder for `CourierConfig`.
    pub fn builder() -> CourierConfigBuilder {
        CourierConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`CourierConfig`].
pub struct CourierConfigBuilder {
    config: CourierConfig,
}

impl CourierConfigBuilder {
    pub fn simple_upload_limit(mut self, bytes: u64) -> Self {
        self.config.simple_upload_limit = bytes;
        self
    }

    pub fn chunk_size(mut self, bytes: u64) -> Self {
        self.config.chunk_size = bytes;
        self
    }

    pub fn read_timeout_secs(mut self, secs: u64) -> Self {
        self.config.read_timeout_secs = secs.max(1);
        self
    }

    pub fn write_timeout_secs(mut self, secs: u64) -> Self {
        self.config.write_timeout_secs = secs.max(1);
        self
    }

    pub fn upload_timeout_secs(mut self, secs: u64) -> Self {
        self.config.upload_timeout_secs = secs.max(1);
        self
    }

    pub fn chunk_timeout_secs(mut self, secs: u64) -> Self {
        self.config.chunk_timeout_secs = secs.max(1);
        self
    }

    pub fn create_missing(mut self, v: bool) -> Self {
        self.config.create_missing = v;
        self
    }

    pub fn dry_run(mut self, v: bool) -> Self {
        self.config.dry_run = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<CourierConfig, CourierError> {
        let c = &self.config;
        if c.simple_upload_limit == 0 {
            return Err(CourierError::InvalidConfig(
                "simple upload limit must be > 0".into(),
            ));
        }
        if c.chunk_size == 0 || c.chunk_size % CHUNK_ALIGNMENT != 0 {
            return Err(CourierError::InvalidConfig(format!(
                "chunk size must be a positive multiple of {CHUNK_ALIGNMENT} bytes, got {}",
                c.chunk_size
            )));
        }
        Ok(self.config)
    }
}

// ── Extraction ───────────────────────────────────────────────────────────

/// What to do when two blocks share a certificate number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CollisionPolicy {
    /// Second and later crops get `_2`, `_3`, … appended. (default)
    #[default]
    Suffix,
    /// Every crop is written as `<number>`; the last occurrence wins.
    Overwrite,
}

/// Settings for the certificate extraction pipeline.
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Points added above a match so the label over the number is included.
    /// Default: 40.
    pub top_margin: f32,

    /// Points left free before the next match on the same page. Default: 10.
    pub gap_margin: f32,

    /// Raster crop resolution. Range: 72–600. Default: 200.
    pub dpi: u32,

    /// Default: [`CollisionPolicy::Suffix`].
    pub collision_policy: CollisionPolicy,

    /// Extension (without dot, case-insensitive) of files to scan. Default: `pdf`.
    pub pdf_extension: String,

    /// Password for encrypted batches.
    pub password: Option<String>,

    /// Explicit pdfium library path; otherwise `PDFIUM_LIB_PATH`, the working
    /// directory and the system library are tried in turn.
    pub pdfium_library_path: Option<PathBuf>,

    /// Optional per-PDF progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            top_margin: 40.0,
            gap_margin: 10.0,
            dpi: 200,
            collision_policy: CollisionPolicy::default(),
            pdf_extension: "pdf".to_string(),
            password: None,
            pdfium_library_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("top_margin", &self.top_margin)
            .field("gap_margin", &self.gap_margin)
            .field("dpi", &self.dpi)
            .field("collision_policy", &self.collision_policy)
            .field("pdf_extension", &self.pdf_extension)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn top_margin(mut self, points: f32) -> Self {
        self.config.top_margin = points;
        self
    }

    pub fn gap_margin(mut self, points: f32) -> Self {
        self.config.gap_margin = points;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.config.collision_policy = policy;
        self
    }

    pub fn pdf_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.pdf_extension = ext.into().trim_start_matches('.').to_string();
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, CourierError> {
        let c = &self.config;
        if !c.top_margin.is_finite() || c.top_margin < 0.0 {
            return Err(CourierError::InvalidConfig(format!(
                "top margin must be ≥ 0, got {}",
                c.top_margin
            )));
        }
        if !c.gap_margin.is_finite() || c.gap_margin < 0.0 {
            return Err(CourierError::InvalidConfig(format!(
                "gap margin must be ≥ 0, got {}",
                c.gap_margin
            )));
        }
        if c.pdf_extension.is_empty() {
            return Err(CourierError::InvalidConfig(
                "PDF extension must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
