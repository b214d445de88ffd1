//! Asynchronous client for the slate sniffer capture API.
//!
//! The viewer and the command line tools talk to the capture backend only
//! through this crate. It owns the wire model (schemas, raw messages, capture
//! status) and the typed decoding of message values.

pub mod api;
pub mod model;

use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::Value as Json;
use thiserror::Error;
use tracing::trace;

pub use api::{InMemorySniffer, SnifferApi};
pub use model::{
    CaptureStatus, DecodeError, Field, FieldType, InjectRequest, ParseValueError, RawMessage,
    Row, ServiceInfo, Value,
};

#[derive(Clone)]
pub struct SnifferClient {
    http: Client,
    base_url: Url,
}

#[derive(Debug, Error)]
pub enum SnifferError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status: {status} body={body}")]
    UnexpectedStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("invalid backend url '{0}'")]
    InvalidUrl(String),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl SnifferClient {
    pub fn new(base_url: &str) -> Result<Self, SnifferError> {
        let parsed =
            Url::parse(base_url).map_err(|_| SnifferError::InvalidUrl(base_url.to_string()))?;
        if parsed.cannot_be_a_base() {
            return Err(SnifferError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            http: Client::new(),
            base_url: parsed,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn check(res: Response) -> Result<Response, SnifferError> {
        if res.status().is_success() {
            Ok(res)
        } else {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            Err(SnifferError::UnexpectedStatus { status, body })
        }
    }

    async fn get_json<T>(&self, url: Url) -> Result<T, SnifferError>
    where
        T: DeserializeOwned,
    {
        trace!(target = "sniffer_sdk::http", %url, "GET");
        let res = self.http.get(url).send().await?;
        Ok(Self::check(res).await?.json::<T>().await?)
    }

    pub async fn list_services(&self) -> Result<Vec<ServiceInfo>, SnifferError> {
        self.get_json(self.endpoint(&["services"])).await
    }

    pub async fn get_schema(&self, service: &str) -> Result<Vec<Field>, SnifferError> {
        self.get_json(self.endpoint(&["services", service, "schema"]))
            .await
    }

    pub async fn get_messages(
        &self,
        service: &str,
        last_id: Option<u64>,
    ) -> Result<Vec<RawMessage>, SnifferError> {
        let mut url = self.endpoint(&["services", service, "messages"]);
        if let Some(last_id) = last_id {
            url.query_pairs_mut()
                .append_pair("last_id", &last_id.to_string());
        }
        self.get_json(url).await
    }

    pub async fn get_status(&self) -> Result<bool, SnifferError> {
        let status: CaptureStatus = self.get_json(self.endpoint(&["status"])).await?;
        Ok(status.status)
    }

    pub async fn set_status(&self, requested: bool) -> Result<bool, SnifferError> {
        let url = self.endpoint(&["status"]);
        trace!(target = "sniffer_sdk::http", %url, requested, "POST status");
        let res = self
            .http
            .post(url)
            .json(&CaptureStatus { status: requested })
            .send()
            .await?;
        let status: CaptureStatus = Self::check(res).await?.json().await?;
        Ok(status.status)
    }

    pub async fn inject(&self, service: &str, message: Vec<Json>) -> Result<(), SnifferError> {
        let url = self.endpoint(&["inject"]);
        trace!(target = "sniffer_sdk::http", %url, service, "POST inject");
        let res = self
            .http
            .post(url)
            .json(&InjectRequest {
                service: service.to_string(),
                message,
            })
            .send()
            .await?;
        Self::check(res).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SnifferApi for SnifferClient {
    async fn list_services(&self) -> Result<Vec<ServiceInfo>, SnifferError> {
        SnifferClient::list_services(self).await
    }

    async fn get_schema(&self, service: &str) -> Result<Vec<Field>, SnifferError> {
        SnifferClient::get_schema(self, service).await
    }

    async fn get_messages(
        &self,
        service: &str,
        last_id: Option<u64>,
    ) -> Result<Vec<RawMessage>, SnifferError> {
        SnifferClient::get_messages(self, service, last_id).await
    }

    async fn get_status(&self) -> Result<bool, SnifferError> {
        SnifferClient::get_status(self).await
    }

    async fn set_status(&self, requested: bool) -> Result<bool, SnifferError> {
        SnifferClient::set_status(self, requested).await
    }

    async fn inject(&self, service: &str, message: Vec<Json>) -> Result<(), SnifferError> {
        SnifferClient::inject(self, service, message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_extend_base_path() {
        let client = SnifferClient::new("http://127.0.0.1:5000").unwrap();
        assert_eq!(
            client.endpoint(&["services", "a b", "schema"]).as_str(),
            "http://127.0.0.1:5000/services/a%20b/schema"
        );

        let nested = SnifferClient::new("http://sniffer.local/api/").unwrap();
        assert_eq!(
            nested.endpoint(&["status"]).as_str(),
            "http://sniffer.local/api/status"
        );
    }

    #[test]
    fn rejects_non_base_urls() {
        assert!(matches!(
            SnifferClient::new("mailto:ops@example.com"),
            Err(SnifferError::InvalidUrl(_))
        ));
        assert!(matches!(
            SnifferClient::new("not a url"),
            Err(SnifferError::InvalidUrl(_))
        ));
    }
}
