//! [`RemoteTree`] over the Microsoft Graph drive API.
//!
//! A [`GraphClient`] is bound to one drive of one site. [`GraphClient::connect`]
//! performs the three setup calls (token, site, drive) and fails fatally if
//! any of them does; after that every call maps onto a single drive
//! endpoint, with children listings following `@odata.nextLink` until the
//! listing is exhausted.

use crate::config::{CourierConfig, TenantConfig};
use crate::error::{CourierError, RemoteError};
use crate::remote::auth::{acquire_token, AccessToken, TokenClaims};
use crate::remote::types::{ChunkRange, ChunkStatus, DriveItem, Page, UploadSession};
use crate::remote::RemoteTree;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Characters escaped inside a single path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b':')
    .add(b'\\');

const CHILD_FIELDS: &str = "id,name,folder,file,size,webUrl";

/// Percent-encode each `/`-separated segment of `path`, dropping empty ones.
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| utf8_percent_encode(s, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Debug, Clone, Deserialize)]
struct Site {
    id: String,
    #[serde(rename = "webUrl", default)]
    web_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Drive {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Clone, Copy)]
struct Timeouts {
    read: u64,
    write: u64,
    upload: u64,
    chunk: u64,
}

impl From<&CourierConfig> for Timeouts {
    fn from(c: &CourierConfig) -> Self {
        Self {
            read: c.read_timeout_secs,
            write: c.write_timeout_secs,
            upload: c.upload_timeout_secs,
            chunk: c.chunk_timeout_secs,
        }
    }
}

/// Authenticated client bound to one document library.
pub struct GraphClient {
    http: reqwest::Client,
    token: AccessToken,
    graph_base: String,
    site_id: String,
    drive_id: String,
    timeouts: Timeouts,
}

impl std::fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphClient")
            .field("graph_base", &self.graph_base)
            .field("site_id", &self.site_id)
            .field("drive_id", &self.drive_id)
            .finish()
    }
}

impl GraphClient {
    /// Acquire a token, resolve the site and pick the configured library.
    ///
    /// # Errors
    /// [`CourierError::AuthFailure`] when the token request fails,
    /// [`CourierError::SiteOrLibraryNotFound`] when the site or library is
    /// unknown.
    pub async fn connect(
        tenant: &TenantConfig,
        config: &CourierConfig,
    ) -> Result<Self, CourierError> {
        let (mut client, _) = Self::authenticate(tenant, config).await?;
        let site = client.site(tenant).await?;
        client.site_id = site.id;
        let drives = client.drives().await?;
        client.drive_id = pick_drive(&drives, &tenant.document_library)
            .map(|d| d.id.clone())
            .ok_or_else(|| library_not_found(tenant, &drives))?;
        info!(
            "Connected to library '{}' (drive {})",
            tenant.document_library, client.drive_id
        );
        Ok(client)
    }

    async fn authenticate(
        tenant: &TenantConfig,
        config: &CourierConfig,
    ) -> Result<(Self, AccessToken), CourierError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("doc-courier/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CourierError::Internal(format!("HTTP client: {e}")))?;
        let token = acquire_token(&http, tenant, config.read_timeout_secs).await?;
        let client = Self {
            http,
            token: token.clone(),
            graph_base: tenant.graph_base_url.trim_end_matches('/').to_string(),
            site_id: String::new(),
            drive_id: String::new(),
            timeouts: Timeouts::from(config),
        };
        Ok((client, token))
    }

    pub fn drive_id(&self) -> &str {
        &self.drive_id
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    fn drive_url(&self, rest: &str) -> String {
        format!("{}/drives/{}/{}", self.graph_base, self.drive_id, rest)
    }

    async fn site(&self, tenant: &TenantConfig) -> Result<Site, CourierError> {
        let site_path = tenant.normalized_site_path();
        let url = format!(
            "{}/sites/{}:/{}",
            self.graph_base,
            tenant.site_hostname.trim(),
            encode_path(&site_path)
        );
        debug!("Resolving site {url}");
        let target = format!("site {}{}", tenant.site_hostname, site_path);
        let response = self
            .send(self.http.get(&url).bearer_auth(self.token.secret()), &url, self.timeouts.read)
            .await
            .map_err(|e| CourierError::SiteOrLibraryNotFound {
                target: target.clone(),
                detail: e.to_string(),
            })?;
        decode(response, &url)
            .await
            .map_err(|e| CourierError::SiteOrLibraryNotFound {
                target,
                detail: e.to_string(),
            })
    }

    async fn drives(&self) -> Result<Vec<Drive>, CourierError> {
        let url = format!("{}/sites/{}/drives?$select=id,name", self.graph_base, self.site_id);
        self.get_paged(url)
            .await
            .map_err(|e| CourierError::SiteOrLibraryNotFound {
                target: "document libraries".into(),
                detail: e.to_string(),
            })
    }

    /// Authenticated GET of every page of a collection.
    async fn get_paged<T: DeserializeOwned>(&self, first: String) -> Result<Vec<T>, RemoteError> {
        let mut items = Vec::new();
        let mut next = Some(first);
        let mut pages = 0usize;
        while let Some(url) = next {
            let response = self
                .send(
                    self.http.get(&url).bearer_auth(self.token.secret()),
                    &url,
                    self.timeouts.read,
                )
                .await?;
            let page: Page<T> = decode(response, &url).await?;
            items.extend(page.value);
            next = page.next_link;
            pages += 1;
        }
        if pages > 1 {
            debug!("Collected {} item(s) over {pages} pages", items.len());
        }
        Ok(items)
    }

    /// Send and turn any non-success status into [`RemoteError::Status`].
    async fn send(
        &self,
        request: RequestBuilder,
        url: &str,
        secs: u64,
    ) -> Result<Response, RemoteError> {
        let response = request
            .timeout(Duration::from_secs(secs))
            .send()
            .await
            .map_err(|e| transport_error(e, url, secs))?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(status_error(response, url).await)
        }
    }
}

fn pick_drive<'a>(drives: &'a [Drive], wanted: &str) -> Option<&'a Drive> {
    let wanted = wanted.trim().to_lowercase();
    drives.iter().find(|d| d.name.trim().to_lowercase() == wanted)
}

fn library_not_found(tenant: &TenantConfig, drives: &[Drive]) -> CourierError {
    let names: Vec<&str> = drives.iter().map(|d| d.name.as_str()).collect();
    CourierError::SiteOrLibraryNotFound {
        target: format!("library '{}'", tenant.document_library),
        detail: format!("available libraries: {}", names.join(", ")),
    }
}

fn transport_error(e: reqwest::Error, url: &str, secs: u64) -> RemoteError {
    if e.is_timeout() {
        RemoteError::Timeout {
            url: url.to_string(),
            secs,
        }
    } else {
        RemoteError::Transport {
            url: url.to_string(),
            detail: e.to_string(),
        }
    }
}

async fn status_error(response: Response, url: &str) -> RemoteError {
    let status = response.status().as_u16();
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > 500 {
        let mut cut = 500;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    RemoteError::Status {
        url: url.to_string(),
        status,
        body,
    }
}

async fn decode<T: DeserializeOwned>(response: Response, url: &str) -> Result<T, RemoteError> {
    response.json::<T>().await.map_err(|e| RemoteError::Decode {
        url: url.to_string(),
        detail: e.to_string(),
    })
}

impl RemoteTree for GraphClient {
    async fn root(&self) -> Result<DriveItem, RemoteError> {
        let url = self.drive_url("root");
        let response = self
            .send(self.http.get(&url).bearer_auth(self.token.secret()), &url, self.timeouts.read)
            .await?;
        decode(response, &url).await
    }

    async fn list_children(&self, parent: &DriveItem) -> Result<Vec<DriveItem>, RemoteError> {
        let url = self.drive_url(&format!(
            "items/{}/children?$select={CHILD_FIELDS}",
            parent.id
        ));
        self.get_paged(url).await
    }

    async fn get_by_path(&self, path: &str) -> Result<DriveItem, RemoteError> {
        let encoded = encode_path(path);
        if encoded.is_empty() {
            return self.root().await;
        }
        let url = self.drive_url(&format!("root:/{encoded}"));
        let result = self
            .send(self.http.get(&url).bearer_auth(self.token.secret()), &url, self.timeouts.read)
            .await;
        match result {
            Ok(response) => decode(response, &url).await,
            Err(e) if e.is_not_found() => Err(RemoteError::NotFound {
                segment: path.trim_matches('/').to_string(),
                parent: "/".to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    async fn create_folder(
        &self,
        parent: &DriveItem,
        name: &str,
    ) -> Result<DriveItem, RemoteError> {
        let url = self.drive_url(&format!("items/{}/children", parent.id));
        let body = json!({
            "name": name,
            "folder": {},
            "@microsoft.graph.conflictBehavior": "fail",
        });
        let request = self
            .http
            .post(&url)
            .bearer_auth(self.token.secret())
            .json(&body);
        match self.send(request, &url, self.timeouts.write).await {
            Ok(response) => {
                info!("Created folder '{name}' under '{}'", parent.name);
                decode(response, &url).await
            }
            Err(RemoteError::Status { status: 409, .. }) => Err(RemoteError::CreationConflict {
                name: name.to_string(),
                parent: parent.name.clone(),
            }),
            Err(e) => Err(e),
        }
    }

    async fn upload_small(
        &self,
        folder: &DriveItem,
        name: &str,
        content: Vec<u8>,
    ) -> Result<DriveItem, RemoteError> {
        let url = self.drive_url(&format!(
            "items/{}:/{}:/content",
            folder.id,
            encode_path(name)
        ));
        let request = self
            .http
            .put(&url)
            .bearer_auth(self.token.secret())
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(content);
        let response = self.send(request, &url, self.timeouts.upload).await?;
        decode(response, &url).await
    }

    async fn create_upload_session(
        &self,
        folder: &DriveItem,
        name: &str,
    ) -> Result<UploadSession, RemoteError> {
        let url = self.drive_url(&format!(
            "items/{}:/{}:/createUploadSession",
            folder.id,
            encode_path(name)
        ));
        let body = json!({
            "item": {
                "@microsoft.graph.conflictBehavior": "replace",
                "name": name,
            }
        });
        let request = self
            .http
            .post(&url)
            .bearer_auth(self.token.secret())
            .json(&body);
        let response = self.send(request, &url, self.timeouts.write).await?;
        decode(response, &url).await
    }

    async fn upload_chunk(
        &self,
        session: &UploadSession,
        range: ChunkRange,
        content: Vec<u8>,
    ) -> Result<ChunkStatus, RemoteError> {
        let url = session.upload_url.as_str();
        // The session URL is pre-authorised; it must not carry the bearer token.
        let request = self
            .http
            .put(url)
            .header(reqwest::header::CONTENT_RANGE, range.header_value())
            .body(content);
        let response = self.send(request, url, self.timeouts.chunk).await?;
        match response.status() {
            StatusCode::ACCEPTED => Ok(ChunkStatus::Accepted),
            StatusCode::OK | StatusCode::CREATED => {
                Ok(ChunkStatus::Completed(decode(response, url).await?))
            }
            other => {
                warn!("Unexpected chunk status {other} for {}", range.header_value());
                Err(RemoteError::Status {
                    url: url.to_string(),
                    status: other.as_u16(),
                    body: String::new(),
                })
            }
        }
    }
}

// ── Connection check ─────────────────────────────────────────────────────

/// What `check` found out about the configured tenant.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionReport {
    /// `None` when the token is not a decodable JWT.
    pub claims: Option<TokenClaims>,
    pub site_id: String,
    pub site_web_url: Option<String>,
    /// Every library visible in the site.
    pub libraries: Vec<String>,
    pub library_found: bool,
    /// Lookup result for the configured base path; `None` when no base path
    /// is configured or the library is missing.
    pub base_path: Option<BasePathCheck>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BasePathCheck {
    pub path: String,
    pub found: bool,
    pub web_url: Option<String>,
    pub detail: Option<String>,
}

/// Authenticate, resolve the site, list its libraries and look up the base
/// path. Read-only.
///
/// A missing library or base path is reported, not raised; only token and
/// site failures are errors.
pub async fn check_connection(
    tenant: &TenantConfig,
    config: &CourierConfig,
) -> Result<ConnectionReport, CourierError> {
    let (mut client, token) = GraphClient::authenticate(tenant, config).await?;
    let claims = token.claims();
    match &claims {
        Some(c) => info!("Token roles: {:?}", c.roles),
        None => warn!("Token is not a JWT; claims unavailable"),
    }

    let site = client.site(tenant).await?;
    client.site_id = site.id.clone();
    let drives = client.drives().await?;
    let libraries: Vec<String> = drives.iter().map(|d| d.name.clone()).collect();

    let picked = pick_drive(&drives, &tenant.document_library).map(|d| d.id.clone());
    let library_found = picked.is_some();
    let base_path = match picked {
        Some(drive_id) if !tenant.base_path.trim().is_empty() => {
            client.drive_id = drive_id;
            let path = tenant.base_path.trim().to_string();
            Some(match client.get_by_path(&path).await {
                Ok(item) => BasePathCheck {
                    path,
                    found: true,
                    web_url: item.web_url,
                    detail: None,
                },
                Err(e) => BasePathCheck {
                    path,
                    found: false,
                    web_url: None,
                    detail: Some(e.to_string()),
                },
            })
        }
        _ => None,
    };

    Ok(ConnectionReport {
        claims,
        site_id: site.id,
        site_web_url: site.web_url,
        libraries,
        library_found,
        base_path,
    })
}
