//! JSON-over-HTTP client for the node API.
//!
//! Every response is an envelope `{"status": .., "data": .., "msg": ..}`.
//! `success` yields `data`, `fail` yields the node's `msg`, anything else is an
//! unrecognized shape. Requests are issued one at a time and never retried.

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("http error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("response is not json: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("node returned fail: {0}")]
    Fail(String),
    #[error("unrecognized response: {0}")]
    UnexpectedShape(String),
    #[error("malformed data: {0}")]
    Malformed(#[source] serde_json::Error),
}

impl RpcError {
    pub fn is_transport(&self) -> bool {
        matches!(self, RpcError::Transport(_) | RpcError::InvalidJson(_))
    }
}

#[derive(Clone, Debug)]
pub struct NodeRpc {
    base: Url,
    client: Client,
}

impl NodeRpc {
    /// `base` like "http://127.0.0.1:9889". No timeout is configured, the
    /// HTTP stack defaults apply.
    pub fn new(base: &str) -> anyhow::Result<Self> {
        let mut base = Url::parse(base)?;

        // we need a trailing slash, if not present we append it
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self { base, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// POSTs `body` to `path` and returns the envelope's `data`.
    pub async fn request<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Value, RpcError> {
        let url = self
            .base
            .join(path.trim_start_matches('/'))
            .map_err(|err| RpcError::UnexpectedShape(format!("bad path {path}: {err}")))?;
        tracing::debug!("POST {}", url);

        let text = self
            .client
            .post(url)
            .json(body)
            .send()
            .await?
            .text()
            .await?;
        let response: Value = serde_json::from_str(&text).map_err(RpcError::InvalidJson)?;
        open_envelope(response)
    }

    /// Same as [`NodeRpc::request`] with `data` decoded into `T`.
    pub async fn request_as<B, T>(&self, path: &str, body: &B) -> Result<T, RpcError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let data = self.request(path, body).await?;
        serde_json::from_value(data).map_err(RpcError::Malformed)
    }
}

fn open_envelope(mut response: Value) -> Result<Value, RpcError> {
    let status = response
        .get("status")
        .and_then(Value::as_str)
        .map(str::to_string);
    match status.as_deref() {
        Some("success") => Ok(response
            .get_mut("data")
            .map(Value::take)
            .unwrap_or(Value::Null)),
        Some("fail") => {
            let msg = response
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Err(RpcError::Fail(msg.to_string()))
        }
        _ => Err(RpcError::UnexpectedShape(response.to_string())),
    }
}
