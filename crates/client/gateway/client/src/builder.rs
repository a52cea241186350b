use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client, StatusCode,
};
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::NodeError;

/// Client for the remote chain node's HTTP API.
#[derive(Debug, Clone)]
pub struct NodeProvider {
    pub(crate) client: Client,
    pub(crate) base_url: Url,
    pub(crate) headers: HeaderMap,
}

impl NodeProvider {
    pub fn new(base_url: Url) -> Self {
        Self { client: Client::new(), base_url, headers: HeaderMap::new() }
    }

    pub fn new_with_headers(base_url: Url, headers: &[(HeaderName, HeaderValue)]) -> Self {
        let headers = headers.iter().cloned().collect();
        Self { client: Client::new(), base_url, headers }
    }

    pub fn add_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    pub(crate) fn url(&self, segments: &[&str]) -> Result<Url, NodeError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| NodeError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, NodeError> {
        let response = self.client.get(url.clone()).headers(self.headers.clone()).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(NodeError::NotFound(url.path().to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NodeError::Status { status, body });
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
