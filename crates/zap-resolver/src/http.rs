use std::error::Error as StdError;
use std::io::Read;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use tracing::debug;
use url::Url;

const USER_AGENT: &str = concat!("zap/", env!("CARGO_PKG_VERSION"));
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Whole-request deadline for documents. It also bounds read stalls, since a document body
/// is capped at [`MAX_DOCUMENT_BYTES`].
pub const METADATA_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);
pub const MAX_DOCUMENT_BYTES: u64 = 8 * 1024 * 1024;

/// Network knobs shared by every client the resolver builds.
#[derive(Debug, Clone, Copy)]
pub struct HttpSettings {
    pub online: bool,
    pub keep_proxies: bool,
    pub download_timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            online: true,
            keep_proxies: false,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("no network available while fetching {url}: {source}")]
    Offline {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("network access is disabled (ZAP_ONLINE=0); cannot fetch {url}")]
    Disabled { url: String },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("{url} exceeded the {limit} byte document limit")]
    TooLarge { url: String, limit: u64 },
    #[error("failed to read body of {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

impl HttpError {
    /// Missing-resource responses; callers searching several repositories move on.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status, .. } if *status == 404 || *status == 410)
    }

    /// Host unresolvable, unreachable, or network disabled by configuration.
    #[must_use]
    pub fn is_offline(&self) -> bool {
        matches!(self, Self::Offline { .. } | Self::Disabled { .. })
    }
}

/// Blocking HTTP client with the timeouts of one request profile.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    online: bool,
}

impl HttpClient {
    /// Profile for small documents: snapshot metadata, descriptors, checksums.
    ///
    /// # Errors
    /// Returns an error when the TLS backend cannot be initialised.
    pub fn metadata(settings: &HttpSettings) -> reqwest::Result<Self> {
        Self::build(settings, METADATA_TIMEOUT)
    }

    /// Profile for artifact bodies.
    ///
    /// # Errors
    /// Returns an error when the TLS backend cannot be initialised.
    pub fn download(settings: &HttpSettings) -> reqwest::Result<Self> {
        Self::build(settings, settings.download_timeout)
    }

    fn build(settings: &HttpSettings, timeout: Duration) -> reqwest::Result<Self> {
        let builder = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout);
        let builder = if settings.keep_proxies {
            builder
        } else {
            builder.no_proxy()
        };
        Ok(Self {
            client: builder.build()?,
            online: settings.online,
        })
    }

    /// Issues a GET and fails on any status at or above 400.
    ///
    /// # Errors
    /// Returns an [`HttpError`] classified as offline, transport, or status failure.
    pub fn open(&self, url: &Url) -> Result<Response, HttpError> {
        if !self.online {
            return Err(HttpError::Disabled {
                url: url.to_string(),
            });
        }
        debug!(%url, "GET");
        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|err| classify(url, err))?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(HttpError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        if status != StatusCode::OK {
            debug!(%url, status = status.as_u16(), "non-200 success status");
        }
        Ok(response)
    }

    /// Fetches a bounded text document. Bodies that are not UTF-8 are decoded as Latin-1
    /// when their XML declaration says so, and lossily otherwise.
    ///
    /// # Errors
    /// Returns an [`HttpError`] when the request fails or the body is too large.
    pub fn get_text(&self, url: &Url) -> Result<String, HttpError> {
        let response = self.open(url)?;
        let mut body = Vec::new();
        response
            .take(MAX_DOCUMENT_BYTES + 1)
            .read_to_end(&mut body)
            .map_err(|source| HttpError::Body {
                url: url.to_string(),
                source,
            })?;
        if body.len() as u64 > MAX_DOCUMENT_BYTES {
            return Err(HttpError::TooLarge {
                url: url.to_string(),
                limit: MAX_DOCUMENT_BYTES,
            });
        }
        Ok(decode_document(body))
    }
}

fn decode_document(body: Vec<u8>) -> String {
    let body = match String::from_utf8(body) {
        Ok(text) => return text,
        Err(err) => err.into_bytes(),
    };
    if declares_latin1(&body) {
        body.iter().copied().map(char::from).collect()
    } else {
        debug!("document is not valid UTF-8; decoding lossily");
        String::from_utf8_lossy(&body).into_owned()
    }
}

fn declares_latin1(body: &[u8]) -> bool {
    if !body.starts_with(b"<?xml") {
        return false;
    }
    let end = body
        .windows(2)
        .position(|pair| pair == b"?>")
        .unwrap_or(body.len());
    let declaration = String::from_utf8_lossy(&body[..end]).to_ascii_lowercase();
    ["iso-8859-1", "latin1", "latin-1"]
        .iter()
        .any(|name| declaration.contains(name))
}

fn classify(url: &Url, err: reqwest::Error) -> HttpError {
    let url = url.to_string();
    if err.is_connect() && is_unresolved_host(&err) {
        HttpError::Offline { url, source: err }
    } else {
        HttpError::Transport { url, source: err }
    }
}

fn is_unresolved_host(err: &reqwest::Error) -> bool {
    const MARKERS: &[&str] = &[
        "dns error",
        "failed to lookup address",
        "name or service not known",
        "no such host",
        "nodename nor servname",
        "temporary failure in name resolution",
        "network is unreachable",
    ];
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(source) = current {
        let message = source.to_string().to_ascii_lowercase();
        if MARKERS.iter().any(|marker| message.contains(marker)) {
            return true;
        }
        current = source.source();
    }
    false
}
