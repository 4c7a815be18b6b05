//! HTTP adapter for the provisioning API.
//!
//! Metadata and archives come from two endpoints per kind:
//!
//! ```text
//! GET {url}/analysis/jres?os=..&arch=..   → [metadata, ...]   (empty = not found)
//! GET {url}/analysis/jres/{id}            → archive bytes
//! GET {url}/analysis/engine               → metadata          (404 = not found)
//! GET {url}/analysis/engine               → archive bytes     (Accept: octet-stream)
//! ```
//!
//! When the metadata carries a `downloadUrl` the archive is fetched from
//! there instead, without forwarding credentials.

use std::io::Read;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;

use crate::artifact::{ArtifactKind, ArtifactMetadata};
use crate::config::ProvisioningConfig;
use crate::platform::Platform;
use crate::resolver::{ProvisioningError, ProvisioningResult, ProvisioningServer};

const JSON: &str = "application/json";
const OCTET_STREAM: &str = "application/octet-stream";

/// Where an archive is downloaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DownloadLocation {
    /// A URL handed out by the server; no credentials are sent.
    Direct(String),
    /// The provisioning API itself; the bearer token is sent.
    Api(String),
}

/// [`ProvisioningServer`] backed by the provisioning REST API.
#[derive(Debug)]
pub struct HttpProvisioningServer {
    client: Client,
    base_url: String,
    token: Option<String>,
    supported: bool,
}

impl HttpProvisioningServer {
    /// Create an adapter for the server configured in `config`.
    pub fn new(config: &ProvisioningConfig) -> ProvisioningResult<Self> {
        let base_url = config
            .server_url
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string())
            .ok_or_else(|| ProvisioningError::Client("no server URL configured".to_string()))?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProvisioningError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
            supported: config.server_supports_provisioning(),
        })
    }

    /// The API base URL, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    /// GET `url` and return the body, or `None` on 404.
    fn get_json(
        &self,
        request: RequestBuilder,
        url: &str,
    ) -> ProvisioningResult<Option<Vec<u8>>> {
        let response = self
            .authorized(request)
            .header(ACCEPT, JSON)
            .send()
            .map_err(|e| request_failed(url, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ProvisioningError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .bytes()
            .map(|body| Some(body.to_vec()))
            .map_err(|e| request_failed(url, e))
    }
}

impl ProvisioningServer for HttpProvisioningServer {
    fn supports_provisioning(&self, _kind: ArtifactKind) -> bool {
        self.supported
    }

    fn fetch_metadata(
        &self,
        kind: ArtifactKind,
        platform: &Platform,
    ) -> ProvisioningResult<Option<ArtifactMetadata>> {
        match kind {
            ArtifactKind::Jre => {
                let url = format!("{}/analysis/jres", self.base_url);
                let mut query = Vec::new();
                if let Some(os) = &platform.os {
                    query.push(("os", os.as_str()));
                }
                if let Some(arch) = &platform.arch {
                    query.push(("arch", arch.as_str()));
                }
                tracing::debug!(url = %url, platform = %platform, "Fetching JRE metadata");

                let request = self.client.get(&url).query(&query);
                match self.get_json(request, &url)? {
                    Some(body) => parse_jre_list(&url, &body),
                    None => Ok(None),
                }
            }
            ArtifactKind::Engine => {
                let url = format!("{}/analysis/engine", self.base_url);
                tracing::debug!(url = %url, "Fetching engine metadata");

                match self.get_json(self.client.get(&url), &url)? {
                    Some(body) => parse_engine(&url, &body).map(Some),
                    None => Ok(None),
                }
            }
        }
    }

    fn download(
        &self,
        kind: ArtifactKind,
        metadata: &ArtifactMetadata,
    ) -> ProvisioningResult<Box<dyn Read + Send>> {
        let (url, request) = match download_location(&self.base_url, kind, metadata)? {
            DownloadLocation::Direct(url) => {
                let request = self.client.get(&url);
                (url, request)
            }
            DownloadLocation::Api(url) => {
                let request = self
                    .authorized(self.client.get(&url))
                    .header(ACCEPT, OCTET_STREAM);
                (url, request)
            }
        };
        tracing::debug!(url = %url, filename = %metadata.filename, "Requesting archive");

        let response = request.send().map_err(|e| request_failed(&url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProvisioningError::Status {
                url,
                status: status.as_u16(),
            });
        }
        Ok(Box::new(response))
    }
}

fn request_failed(url: &str, e: reqwest::Error) -> ProvisioningError {
    ProvisioningError::Request {
        url: url.to_string(),
        reason: e.to_string(),
    }
}

/// The JRE endpoint answers with a list; the first entry wins.
fn parse_jre_list(url: &str, body: &[u8]) -> ProvisioningResult<Option<ArtifactMetadata>> {
    let entries: Vec<ArtifactMetadata> =
        serde_json::from_slice(body).map_err(|e| ProvisioningError::Parse {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
    Ok(entries.into_iter().next())
}

fn parse_engine(url: &str, body: &[u8]) -> ProvisioningResult<ArtifactMetadata> {
    serde_json::from_slice(body).map_err(|e| ProvisioningError::Parse {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

fn download_location(
    base_url: &str,
    kind: ArtifactKind,
    metadata: &ArtifactMetadata,
) -> ProvisioningResult<DownloadLocation> {
    if let Some(url) = metadata.download_url.as_deref().filter(|url| !url.is_empty()) {
        return Ok(DownloadLocation::Direct(url.to_string()));
    }

    match kind {
        ArtifactKind::Jre => metadata
            .id
            .as_deref()
            .map(|id| DownloadLocation::Api(format!("{}/analysis/jres/{}", base_url, id)))
            .ok_or_else(|| ProvisioningError::NoDownloadLocation(metadata.filename.clone())),
        ArtifactKind::Engine => Ok(DownloadLocation::Api(format!(
            "{}/analysis/engine",
            base_url
        ))),
    }
}
