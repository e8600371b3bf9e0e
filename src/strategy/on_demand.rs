use crate::config::PaymentConfig;
use crate::daemon::{reconcile, ChannelStateRequest, ChannelStateService};
use crate::state::{ChannelLifecycleManager, ChannelRequest, Ledger};
use crate::strategy::{CallContext, PaymentStrategy};
use crate::types::{
    ChannelPayment, ChannelSpend, Payment, PaymentChannel, PaymentError, INVALID_PAYMENT,
};
use crate::utils::crypto::SigningHelper;
use async_trait::async_trait;
use ethers::types::Address;
use std::sync::Arc;
use tracing::debug;

/// Pays from a payment channel, opening, funding or extending it on demand.
pub struct OnDemandChannelStrategy {
    lifecycle: ChannelLifecycleManager,
    daemon: Arc<dyn ChannelStateService>,
    signer: Arc<SigningHelper>,
    config: PaymentConfig,
}

impl OnDemandChannelStrategy {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        daemon: Arc<dyn ChannelStateService>,
        signer: Arc<SigningHelper>,
        config: PaymentConfig,
    ) -> Self {
        Self {
            lifecycle: ChannelLifecycleManager::new(ledger),
            daemon,
            signer,
            config,
        }
    }

    pub fn lifecycle(&self) -> &ChannelLifecycleManager {
        &self.lifecycle
    }

    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }

    /// Spend already authorized on `channel`, according to the daemon.
    async fn channel_spend(
        &self,
        channel: &PaymentChannel,
        block: u64,
    ) -> Result<ChannelSpend, PaymentError> {
        let request = ChannelStateRequest {
            channel_id: channel.channel_id,
            current_block: block,
            signature: self.signer.sign_channel_state_request(
                self.config.mpe_contract_address,
                channel.channel_id,
                block,
            )?,
        };
        let reply = self
            .daemon
            .get_channel_state(&request)
            .await
            .map_err(PaymentError::ChannelState)?;
        let spend = reconcile(channel, &reply);

        self.lifecycle
            .registry()
            .record_nonce(
                self.signer.address(),
                channel.group_id,
                channel.channel_id,
                spend.nonce,
            )
            .await;
        Ok(spend)
    }
}

#[async_trait]
impl PaymentStrategy for OnDemandChannelStrategy {
    async fn decide(&self, ctx: &CallContext) -> Result<Payment, PaymentError> {
        let Some(endpoint_group) = ctx.resolve_endpoint_group() else {
            debug!(group = %ctx.endpoint_group, "endpoint group not found, return invalid payment");
            return Ok(INVALID_PAYMENT);
        };
        let Some(price) = endpoint_group.price_for(&ctx.method) else {
            debug!(method = %ctx.method, "no price for method, return invalid payment");
            return Ok(INVALID_PAYMENT);
        };
        let Some(payment_group) = ctx.metadata.payment_group(&endpoint_group.payment_group_id)
        else {
            debug!(
                group = ?endpoint_group.payment_group_id,
                "payment group not found, return invalid payment"
            );
            return Ok(INVALID_PAYMENT);
        };

        let owner = self.signer.address();
        let group_id = payment_group.group_id;
        let margin = self
            .config
            .expiration_threshold
            .unwrap_or(payment_group.expiration_threshold);

        let block = self.lifecycle.block_number().await?;
        let candidate = self.lifecycle.current_candidate(owner, group_id).await?;
        let mut spend = match &candidate {
            Some(channel) => self.channel_spend(channel, block).await?,
            None => ChannelSpend::default(),
        };

        let mut request = ChannelRequest {
            owner,
            group: payment_group,
            value: spend.spent.saturating_add(price),
            expiration_margin: margin,
        };
        let mut channel = self.lifecycle.ensure_channel(&request).await?;

        if candidate.as_ref().map(|c| c.channel_id) != Some(channel.channel_id) {
            spend = self.channel_spend(&channel, block).await?;
            let needed = spend.spent.saturating_add(price);
            if needed > channel.value {
                debug!(
                    channel_id = %channel.channel_id,
                    needed = %needed,
                    value = %channel.value,
                    "selected channel changed, ensuring funds again"
                );
                request.value = needed;
                channel = self.lifecycle.ensure_channel(&request).await?;
            }
        }

        let amount = spend.spent.saturating_add(price);
        let signature = self.signer.sign_channel_payment(
            self.config.mpe_contract_address,
            channel.channel_id,
            amount,
            spend.nonce,
        )?;
        debug!(
            channel_id = %channel.channel_id,
            amount = %amount,
            nonce = %spend.nonce,
            "return channel payment"
        );

        Ok(Payment::Channel(ChannelPayment {
            channel_id: channel.channel_id,
            amount,
            nonce: spend.nonce,
            signature,
        }))
    }

    async fn shutdown(&self) {
        self.lifecycle.registry().clear().await;
    }
}
