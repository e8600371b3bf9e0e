//! JSON-over-HTTP adapter for the daemon's state services.

use crate::daemon::{
    ChannelStateReply, ChannelStateRequest, ChannelStateService, FreeCallStateRequest,
    FreeCallStateService,
};
use crate::types::DaemonError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ethers::types::{Address, H256, U256};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const CHANNEL_STATE_PATH: &str = "channel-state";
pub const FREE_CALL_STATE_PATH: &str = "free-call-state";

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ChannelStateBody {
    pub channel_id: U256,
    pub current_block: u64,
    pub signature: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ChannelStateWire {
    pub current_nonce: U256,
    pub current_signed_amount: U256,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct FreeCallStateBody {
    pub user_id: String,
    pub user_address: Address,
    pub token_for_free_call: String,
    pub token_expiry_date_block: u64,
    pub org_id: String,
    pub service_id: String,
    pub payment_group_id: H256,
    pub current_block: u64,
    pub signature: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct FreeCallStateWire {
    pub free_calls_available: i64,
}

/// Client for a daemon exposing its state services as JSON endpoints.
#[derive(Clone, Debug)]
pub struct DaemonClient {
    http: reqwest::Client,
    endpoint: String,
}

impl DaemonClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, DaemonError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, DaemonError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.endpoint, path);
        debug!(url = %url, "daemon request");
        let response = self.http.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DaemonError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<R>().await?)
    }
}

#[async_trait]
impl ChannelStateService for DaemonClient {
    async fn get_channel_state(
        &self,
        request: &ChannelStateRequest,
    ) -> Result<ChannelStateReply, DaemonError> {
        let body = ChannelStateBody {
            channel_id: request.channel_id,
            current_block: request.current_block,
            signature: STANDARD.encode(request.signature.to_vec()),
        };
        let reply: ChannelStateWire = self.post(CHANNEL_STATE_PATH, &body).await?;
        Ok(ChannelStateReply {
            current_nonce: reply.current_nonce,
            current_signed_amount: reply.current_signed_amount,
        })
    }
}

#[async_trait]
impl FreeCallStateService for DaemonClient {
    async fn get_free_calls_available(
        &self,
        request: &FreeCallStateRequest,
    ) -> Result<i64, DaemonError> {
        let body = FreeCallStateBody {
            user_id: request.token.dapp_user_id.clone(),
            user_address: request.signer,
            token_for_free_call: STANDARD.encode(&request.token.token),
            token_expiry_date_block: request.token.expiration_block,
            org_id: request.org_id.clone(),
            service_id: request.service_id.clone(),
            payment_group_id: request.payment_group_id,
            current_block: request.current_block,
            signature: STANDARD.encode(request.signature.to_vec()),
        };
        let reply: FreeCallStateWire = self.post(FREE_CALL_STATE_PATH, &body).await?;
        Ok(reply.free_calls_available)
    }
}
