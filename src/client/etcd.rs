use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::error;
use tracing::info;

use super::KvStore;
use super::Session;
use crate::constants::ETCD_AUTHENTICATE_PATH;
use crate::constants::ETCD_DELETE_RANGE_PATH;
use crate::constants::ETCD_PUT_PATH;
use crate::constants::ETCD_RANGE_PATH;
use crate::EtcdConfig;
use crate::RemoteError;
use crate::Result;
use crate::Snapshot;

#[derive(Debug, Serialize)]
pub(super) struct RangeRequest {
    pub(super) key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) range_end: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RangeResponse {
    #[serde(default)]
    pub(super) kvs: Vec<KeyValue>,
}

#[derive(Debug, Deserialize)]
pub(super) struct KeyValue {
    pub(super) key: String,
    // etcd omits empty values
    #[serde(default)]
    pub(super) value: String,
}

#[derive(Debug, Serialize)]
pub(super) struct PutRequest {
    pub(super) key: String,
    pub(super) value: String,
}

#[derive(Debug, Serialize)]
pub(super) struct DeleteRangeRequest {
    pub(super) key: String,
}

#[derive(Debug, Serialize)]
pub(super) struct AuthenticateRequest<'a> {
    pub(super) name: &'a str,
    pub(super) password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct AuthenticateResponse {
    pub(super) token: String,
}

/// etcd v3 client speaking the JSON gateway (`/v3/kv/*`, `/v3/auth/*`)
///
/// Keys and values travel base64 encoded. Once [`authenticate`](KvStore::authenticate)
/// succeeds, the session token is attached to every following request.
pub struct EtcdClient {
    http: reqwest::Client,
    base_url: String,
    token: ArcSwapOption<String>,
}

impl EtcdClient {
    /// Builds the HTTP client without contacting the store
    pub fn new(config: &EtcdConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            token: ArcSwapOption::empty(),
        })
    }

    /// Builds the client and performs the authentication handshake when a user is configured
    pub async fn connect(config: &EtcdConfig) -> Result<Self> {
        let client = Self::new(config)?;
        if config.requires_auth() {
            client.authenticate(&config.user, &config.password).await?;
        }
        Ok(client)
    }

    async fn call<Req, Resp>(
        &self,
        operation: &'static str,
        path: &str,
        body: &Req,
    ) -> Result<Resp>
    where
        Req: Serialize + ?Sized + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.post(&url).json(body);
        if let Some(token) = self.token.load_full() {
            request = request.header(header::AUTHORIZATION, token.as_str());
        }

        let response = request.send().await.map_err(|e| {
            error!("[:EtcdClient:{}] send failed: {:?}", operation, e);
            RemoteError::Unavailable {
                operation,
                reason: e.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("[:EtcdClient:{}] status: {}, body: {}", operation, status, body);
            return Err(RemoteError::Unavailable {
                operation,
                reason: format!("HTTP {}: {}", status, body),
            }
            .into());
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| RemoteError::Protocol(format!("{}: {}", operation, e)).into())
    }
}

#[async_trait]
impl KvStore for EtcdClient {
    async fn get(
        &self,
        key: &str,
    ) -> Result<Option<String>> {
        let request = RangeRequest {
            key: encode(key.as_bytes()),
            range_end: None,
        };
        let response: RangeResponse = self.call("get", ETCD_RANGE_PATH, &request).await?;
        debug!("[:EtcdClient:get] key: {}, found: {}", key, response.kvs.len());

        match response.kvs.into_iter().next() {
            Some(kv) => Ok(Some(decode(&kv.value)?)),
            None => Ok(None),
        }
    }

    async fn get_keys_with_prefix(
        &self,
        prefix: &str,
    ) -> Result<Snapshot> {
        let request = RangeRequest {
            key: encode(prefix.as_bytes()),
            range_end: Some(encode(&prefix_range_end(prefix.as_bytes()))),
        };
        let response: RangeResponse = self.call("range", ETCD_RANGE_PATH, &request).await?;
        debug!("[:EtcdClient:range] prefix: {}, found: {}", prefix, response.kvs.len());

        response
            .kvs
            .into_iter()
            .map(|kv| Ok((decode(&kv.key)?, decode(&kv.value)?)))
            .collect()
    }

    async fn put(
        &self,
        key: &str,
        value: &str,
    ) -> Result<()> {
        let request = PutRequest {
            key: encode(key.as_bytes()),
            value: encode(value.as_bytes()),
        };
        let _: serde_json::Value = self.call("put", ETCD_PUT_PATH, &request).await?;
        debug!("[:EtcdClient:put] key: {}", key);
        Ok(())
    }

    async fn delete(
        &self,
        key: &str,
    ) -> Result<()> {
        let request = DeleteRangeRequest {
            key: encode(key.as_bytes()),
        };
        let _: serde_json::Value = self.call("delete", ETCD_DELETE_RANGE_PATH, &request).await?;
        debug!("[:EtcdClient:delete] key: {}", key);
        Ok(())
    }

    async fn authenticate(
        &self,
        user: &str,
        password: &str,
    ) -> Result<Session> {
        let request = AuthenticateRequest { name: user, password };
        let response: AuthenticateResponse = self.call("authenticate", ETCD_AUTHENTICATE_PATH, &request).await?;
        self.token.store(Some(Arc::new(response.token.clone())));
        info!("authenticated against {} as {}", self.base_url, user);

        Ok(Session { token: response.token })
    }
}

fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

fn decode(text: &str) -> Result<String> {
    let bytes = STANDARD
        .decode(text)
        .map_err(|e| RemoteError::Protocol(format!("invalid base64: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| RemoteError::Protocol(format!("invalid utf-8: {}", e)).into())
}

/// Smallest key greater than every key starting with `prefix`
///
/// An empty or all-`0xff` prefix yields `\0`, which etcd reads as "to the end of the keyspace".
pub(super) fn prefix_range_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xff {
            end.push(last + 1);
            return end;
        }
    }
    vec![0]
}
