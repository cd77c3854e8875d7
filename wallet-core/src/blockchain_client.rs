/// HTTP clients for the node REST API and the wallet backend.
///
/// Both clients share the same request plumbing: a reqwest client with the
/// configured timeout, an optional API token header and uniform mapping of
/// non-success responses into `WalletError::HttpStatus`.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::api::types::{ApiErrorBody, SubmitResponse};
use crate::api::{
    AccountInformation, AssetDetail, CurrencyValue, MarketApi, NodeApi, NodeStatus,
    TransactionParams,
};
use crate::blockchain::Address;
use crate::config_store::NetworkConfig;
use crate::errors::{WalletError, WalletResult};

const NODE_TOKEN_HEADER: &str = "X-Algo-API-Token";
const MOBILE_TOKEN_HEADER: &str = "X-API-Key";

#[derive(Debug, Clone)]
struct RestClient {
    client: Client,
    base_url: String,
    token_header: &'static str,
    token: Option<String>,
}

impl RestClient {
    fn new(
        base_url: &str,
        timeout: Duration,
        token_header: &'static str,
        token: Option<String>,
    ) -> WalletResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            WalletError::NetworkError(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token_header,
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(self.token_header, token),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> WalletResult<T> {
        let url = self.url(path);
        log::debug!("GET {}", url);
        let response = self.authorize(self.client.get(&url)).send().await?;
        let response = check_status(response).await?;
        response.json().await.map_err(|e| {
            WalletError::InvalidResponse(format!("Failed to parse response from {}: {}", url, e))
        })
    }

    async fn post_bytes(&self, path: &str, body: &[u8]) -> WalletResult<Response> {
        let url = self.url(path);
        log::debug!("POST {} ({} bytes)", url, body.len());
        let request = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/x-binary")
            .body(body.to_vec());
        let response = self.authorize(request).send().await?;
        check_status(response).await
    }
}

async fn check_status(response: Response) -> WalletResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(WalletError::HttpStatus {
        code: status.as_u16(),
        message: error_message(status, &body),
    })
}

fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.message.or(parsed.detail))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        })
}

/// Client for the node's `/v2` REST API.
#[derive(Debug, Clone)]
pub struct AlgodClient {
    rest: RestClient,
}

impl AlgodClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> WalletResult<Self> {
        Ok(Self {
            rest: RestClient::new(base_url, timeout, NODE_TOKEN_HEADER, token)?,
        })
    }

    pub fn from_config(config: &NetworkConfig) -> WalletResult<Self> {
        Self::new(
            &config.node_endpoint,
            config.api_token.clone(),
            Duration::from_secs(config.request_timeout_secs.max(1)),
        )
    }
}

#[async_trait]
impl NodeApi for AlgodClient {
    async fn transaction_params(&self) -> WalletResult<TransactionParams> {
        self.rest.get_json("v2/transactions/params").await
    }

    async fn account_information(&self, address: &Address) -> WalletResult<AccountInformation> {
        self.rest
            .get_json(&format!("v2/accounts/{}", address.as_string()))
            .await
    }

    async fn submit_transaction(&self, signed: &[u8]) -> WalletResult<String> {
        let response = match self.rest.post_bytes("v2/transactions", signed).await {
            Ok(response) => response,
            Err(WalletError::HttpStatus { code, message }) if (400..500).contains(&code) => {
                return Err(WalletError::SubmitRejected(message));
            }
            Err(e) => return Err(e),
        };
        let submitted: SubmitResponse = response
            .json()
            .await
            .map_err(|e| WalletError::InvalidResponse(format!("Invalid submit response: {}", e)))?;
        Ok(submitted.tx_id)
    }

    async fn status(&self) -> WalletResult<NodeStatus> {
        self.rest.get_json("v2/status").await
    }

    async fn wait_for_block_after(&self, round: u64) -> WalletResult<NodeStatus> {
        self.rest
            .get_json(&format!("v2/status/wait-for-block-after/{}", round))
            .await
    }
}

/// Client for the wallet backend serving prices and asset metadata.
#[derive(Debug, Clone)]
pub struct MobileApiClient {
    rest: RestClient,
}

impl MobileApiClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> WalletResult<Self> {
        Ok(Self {
            rest: RestClient::new(base_url, timeout, MOBILE_TOKEN_HEADER, token)?,
        })
    }

    pub fn from_config(config: &NetworkConfig) -> WalletResult<Self> {
        Self::new(
            &config.mobile_api_endpoint,
            config.api_token.clone(),
            Duration::from_secs(config.request_timeout_secs.max(1)),
        )
    }
}

#[async_trait]
impl MarketApi for MobileApiClient {
    async fn currency_value(&self, currency_id: &str) -> WalletResult<CurrencyValue> {
        self.rest
            .get_json(&format!("v1/currencies/{}/", currency_id))
            .await
    }

    async fn asset_detail(&self, asset_id: u64) -> WalletResult<AssetDetail> {
        self.rest.get_json(&format!("v1/assets/{}/", asset_id)).await
    }
}
