//! Authenticated request surface against the backend API.
//!
//! The workflow code only sees the [`Transport`] trait; [`HttpTransport`] is
//! the production implementation over reqwest. Tests drive the workflow with
//! a scripted implementation instead of a live server.

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;

/// How the request URL's trailing separator is handled for one call.
///
/// The backend is inconsistent here: some endpoints fail to authenticate
/// without the trailing slash, others reject the request when it is present.
/// It stays a per-call flag for that reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailingSlash {
    Keep,
    Strip,
}

/// A multipart dataset submission, kept transport-agnostic so the workflow
/// can be exercised without a live HTTP stack.
#[derive(Debug, Clone)]
pub struct UploadForm {
    pub fields: Vec<(String, String)>,
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Request interface the provisioning workflow runs against.
///
/// Implementations perform one authenticated round-trip and either return the
/// parsed JSON body or fail with [`Error::Transport`]. Nothing at this layer
/// retries.
pub trait Transport {
    fn get_json(
        &self,
        endpoint: &str,
        slash: TrailingSlash,
    ) -> impl Future<Output = Result<Value>> + Send;

    fn post_json(
        &self,
        endpoint: &str,
        slash: TrailingSlash,
        body: &Value,
    ) -> impl Future<Output = Result<Value>> + Send;

    fn post_multipart(
        &self,
        endpoint: &str,
        slash: TrailingSlash,
        form: UploadForm,
    ) -> impl Future<Output = Result<Value>> + Send;
}

/// Deserialize a transport response into its expected shape.
pub(crate) fn decode<T: DeserializeOwned>(endpoint: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|err| Error::Transport {
        method: "GET".to_string(),
        url: endpoint.to_string(),
        message: format!("unexpected response shape: {err}"),
    })
}

/// Production transport: reqwest client plus the opaque session cookie.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    host: String,
    api_root: String,
    cookie: String,
}

impl HttpTransport {
    pub fn new(
        config: &ClientConfig,
        api_root: impl Into<String>,
        cookie: impl Into<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|err| Error::Transport {
                method: "INIT".to_string(),
                url: config.host.clone(),
                message: err.to_string(),
            })?;
        Ok(Self {
            http,
            host: config.host.trim_end_matches('/').to_string(),
            api_root: api_root.into(),
            cookie: cookie.into(),
        })
    }

    fn url(&self, endpoint: &str, slash: TrailingSlash) -> String {
        let mut url = self.host.clone();
        for segment in [self.api_root.as_str(), endpoint] {
            let segment = segment.trim_matches('/');
            if !segment.is_empty() {
                url.push('/');
                url.push_str(segment);
            }
        }
        if slash == TrailingSlash::Keep {
            url.push('/');
        }
        url
    }

    async fn dispatch(
        &self,
        method: &str,
        url: String,
        request: reqwest::RequestBuilder,
    ) -> Result<Value> {
        let response = request
            .header(reqwest::header::COOKIE, self.cookie.as_str())
            .send()
            .await
            .map_err(|err| Error::Transport {
                method: method.to_string(),
                url: url.clone(),
                message: err.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(Error::Transport {
                method: method.to_string(),
                url,
                message: format!("status {status}: {body}"),
            });
        }
        serde_json::from_str(&body).map_err(|err| Error::Transport {
            method: method.to_string(),
            url,
            message: format!("invalid JSON body: {err}"),
        })
    }
}

impl Transport for HttpTransport {
    async fn get_json(&self, endpoint: &str, slash: TrailingSlash) -> Result<Value> {
        let url = self.url(endpoint, slash);
        // Intermediaries cache these polls aggressively; pair the no-cache
        // header with a timestamp query param to force a fresh read.
        let stamp = time::OffsetDateTime::now_utc()
            .unix_timestamp_nanos()
            .to_string();
        let request = self
            .http
            .get(&url)
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .query(&[("_ts", stamp.as_str())]);
        self.dispatch("GET", url, request).await
    }

    async fn post_json(&self, endpoint: &str, slash: TrailingSlash, body: &Value) -> Result<Value> {
        let url = self.url(endpoint, slash);
        let request = self.http.post(&url).json(body);
        self.dispatch("POST", url, request).await
    }

    async fn post_multipart(
        &self,
        endpoint: &str,
        slash: TrailingSlash,
        form: UploadForm,
    ) -> Result<Value> {
        let url = self.url(endpoint, slash);
        let mut multipart = reqwest::multipart::Form::new();
        for (name, value) in form.fields {
            multipart = multipart.text(name, value);
        }
        let part = reqwest::multipart::Part::bytes(form.bytes)
            .file_name(form.file_name)
            .mime_str(&form.mime)
            .map_err(|err| Error::Precondition(format!("invalid upload mime type: {err}")))?;
        multipart = multipart.part("file", part);

        let request = self.http.post(&url).multipart(multipart);
        self.dispatch("POST", url, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> HttpTransport {
        let config = ClientConfig {
            host: "https://strata.example.com/".to_string(),
            ..ClientConfig::default()
        };
        HttpTransport::new(&config, "/api/proxy/", "sessionid=abc").unwrap()
    }

    #[test]
    fn url_keeps_trailing_slash_by_default() {
        assert_eq!(
            transport().url("/synthesis/landscape/", TrailingSlash::Keep),
            "https://strata.example.com/api/proxy/synthesis/landscape/"
        );
    }

    #[test]
    fn url_strips_trailing_slash_when_asked() {
        assert_eq!(
            transport().url("synthesis/landscape/abc/select-umap/p1", TrailingSlash::Strip),
            "https://strata.example.com/api/proxy/synthesis/landscape/abc/select-umap/p1"
        );
    }

    #[test]
    fn url_tolerates_empty_api_root() {
        let config = ClientConfig {
            host: "http://localhost:8000".to_string(),
            ..ClientConfig::default()
        };
        let transport = HttpTransport::new(&config, "", "c=1").unwrap();
        assert_eq!(
            transport.url("api/getSpaces", TrailingSlash::Keep),
            "http://localhost:8000/api/getSpaces/"
        );
    }
}
