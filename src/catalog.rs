//! The Go release index (`https://go.dev/dl/?mode=json`).

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::HttpClient;

/// One published Go distribution.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Release {
    pub version: SmolStr,
    #[serde(default)]
    pub stable: bool,
    #[serde(default)]
    pub files: Vec<Artifact>,
}

/// A downloadable file of a [`Release`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Artifact {
    pub filename: SmolStr,
    #[serde(default)]
    pub os: SmolStr,
    #[serde(default)]
    pub arch: SmolStr,
    #[serde(default)]
    pub version: SmolStr,
    #[serde(default)]
    pub sha256: SmolStr,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub kind: ArtifactKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Archive,
    Installer,
    Source,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to reach the release index: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("release index responded with {status}")]
    HttpStatus { status: String },

    #[error("malformed release index: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Where to read the catalog from.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Base URL of the index, also sent as `Referer`.
    pub base_url: SmolStr,
    /// Ask for every release ever published, not only the current ones.
    pub include_all: bool,
}

impl Endpoint {
    pub fn new(base_url: &str) -> Self {
        Endpoint {
            base_url: base_url.into(),
            include_all: false,
        }
    }

    fn query(&self) -> Vec<(&'static str, &'static str)> {
        let mut query = vec![("mode", "json")];
        if self.include_all {
            query.push(("include", "all"));
        }
        query
    }

    /// Location of an artifact's file, next to the index itself.
    pub fn download_url(&self, artifact: &Artifact) -> String {
        if self.base_url.ends_with('/') {
            format!("{}{}", self.base_url, artifact.filename)
        } else {
            format!("{}/{}", self.base_url, artifact.filename)
        }
    }
}

/// Fetches the catalog, keeping the order the index lists releases in.
///
/// The index lists the newest release first; the order is not checked here.
pub async fn fetch(
    client: &HttpClient,
    endpoint: &Endpoint,
) -> Result<Vec<Release>, CatalogError> {
    log::debug!("Fetching releases from {}", endpoint.base_url);
    let response = client
        .get(&endpoint.base_url)
        .query(&endpoint.query())
        .header(reqwest::header::REFERER, endpoint.base_url.as_str())
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(CatalogError::HttpStatus {
            status: status.to_string(),
        });
    }

    let body = response.bytes().await?;
    let releases = parse(&body)?;
    log::debug!("Fetched {} releases", releases.len());
    Ok(releases)
}

pub fn parse(body: &[u8]) -> Result<Vec<Release>, serde_json::Error> {
    serde_json::from_slice(body)
}
