//! Open, reuse, top up or extend the caller's payment channel.
//!
//! For one (signer, payment group) pair the read-decide-mutate sequence runs
//! under the registry lock, so concurrent calls never open two channels or
//! apply conflicting top-ups. Channel state returned to callers is always
//! re-read from the ledger after a mutation.

use crate::state::{channel::ChannelRegistry, ledger::Ledger};
use crate::types::{LedgerError, PaymentChannel, PaymentError, PaymentGroup};
use ethers::types::{Address, H256, U256};
use std::{future::Future, sync::Arc};
use tracing::{debug, info, warn};

/// Minimum funding and lifetime a call needs from a channel.
#[derive(Clone, Debug)]
pub struct ChannelRequest {
    pub owner: Address,
    pub group: PaymentGroup,
    pub value: U256,
    pub expiration_margin: u64,
}

/// Ledger mutation needed to make an existing channel usable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelAction {
    Reuse,
    AddFunds(U256),
    Extend(u64),
    ExtendAndAddFunds { blocks: u64, value: U256 },
}

/// Decide how to bring `channel` up to `required_value` and `min_expiration`.
pub fn plan(channel: &PaymentChannel, required_value: U256, min_expiration: u64) -> ChannelAction {
    let needed_value = required_value.saturating_sub(channel.value);
    let needed_blocks = min_expiration.saturating_sub(channel.expiration);

    match (needed_value.is_zero(), needed_blocks == 0) {
        (true, true) => ChannelAction::Reuse,
        (false, true) => ChannelAction::AddFunds(needed_value),
        (true, false) => ChannelAction::Extend(needed_blocks),
        (false, false) => ChannelAction::ExtendAndAddFunds {
            blocks: needed_blocks,
            value: needed_value,
        },
    }
}

/// Most recently extended channel, highest id on ties.
pub fn select_candidate(channels: &[PaymentChannel]) -> Option<&PaymentChannel> {
    channels.iter().max_by(|a, b| {
        a.expiration
            .cmp(&b.expiration)
            .then(a.channel_id.cmp(&b.channel_id))
    })
}

#[derive(Clone)]
pub struct ChannelLifecycleManager {
    registry: ChannelRegistry,
}

impl ChannelLifecycleManager {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self::with_registry(ChannelRegistry::new(ledger))
    }

    pub fn with_registry(registry: ChannelRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    pub async fn block_number(&self) -> Result<u64, PaymentError> {
        self.registry
            .ledger()
            .block_number()
            .await
            .map_err(PaymentError::BlockNumber)
    }

    /// Unlocked read of the channel [`ensure_channel`](Self::ensure_channel)
    /// would start from.
    pub async fn current_candidate(
        &self,
        owner: Address,
        group_id: H256,
    ) -> Result<Option<PaymentChannel>, PaymentError> {
        let channels = self
            .registry
            .refresh(owner, group_id)
            .await
            .map_err(PaymentError::ChannelLookup)?;
        Ok(select_candidate(&channels).cloned())
    }

    /// Return a channel satisfying `request`, mutating the ledger as little
    /// as possible.
    pub async fn ensure_channel(
        &self,
        request: &ChannelRequest,
    ) -> Result<PaymentChannel, PaymentError> {
        let owner = request.owner;
        let group_id = request.group.group_id;
        let _guard = self.registry.lock(owner, group_id).await;

        let block = self.block_number().await?;
        let min_expiration = block.saturating_add(request.expiration_margin);
        let channels = self
            .registry
            .refresh(owner, group_id)
            .await
            .map_err(PaymentError::ChannelLookup)?;

        let Some(candidate) = select_candidate(&channels) else {
            info!(
                owner = ?owner,
                group = ?group_id,
                value = %request.value,
                expiration = min_expiration,
                "opening payment channel"
            );
            let channel_id = self
                .mutate(owner, group_id, async {
                    self.registry
                        .ledger()
                        .open_channel(&request.group, owner, request.value, min_expiration)
                        .await
                })
                .await?;
            return self.reread(owner, group_id, channel_id).await;
        };

        let channel_id = candidate.channel_id;
        let ledger = self.registry.ledger();
        match plan(candidate, request.value, min_expiration) {
            ChannelAction::Reuse => {
                debug!(
                    channel_id = %channel_id,
                    blocks_remaining = candidate.blocks_remaining(block),
                    "reusing payment channel"
                );
                return Ok(candidate.clone());
            }
            ChannelAction::AddFunds(value) => {
                info!(channel_id = %channel_id, value = %value, "adding funds to payment channel");
                self.mutate(owner, group_id, ledger.add_funds(channel_id, value))
                    .await?;
            }
            ChannelAction::Extend(blocks) => {
                info!(channel_id = %channel_id, blocks, "extending payment channel");
                self.mutate(owner, group_id, ledger.extend(channel_id, blocks))
                    .await?;
            }
            ChannelAction::ExtendAndAddFunds { blocks, value } => {
                info!(
                    channel_id = %channel_id,
                    blocks,
                    value = %value,
                    "extending and adding funds to payment channel"
                );
                self.mutate(
                    owner,
                    group_id,
                    ledger.extend_and_add_funds(channel_id, blocks, value),
                )
                .await?;
            }
        }

        self.reread(owner, group_id, channel_id).await
    }

    async fn mutate<T, F>(&self, owner: Address, group_id: H256, mutation: F) -> Result<T, PaymentError>
    where
        F: Future<Output = Result<T, LedgerError>>,
    {
        match mutation.await {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(owner = ?owner, group = ?group_id, error = %e, "payment channel mutation failed");
                self.registry.invalidate(owner, group_id).await;
                Err(PaymentError::ChannelMutation(e))
            }
        }
    }

    async fn reread(
        &self,
        owner: Address,
        group_id: H256,
        channel_id: U256,
    ) -> Result<PaymentChannel, PaymentError> {
        let channels = self
            .registry
            .refresh(owner, group_id)
            .await
            .map_err(PaymentError::ChannelLookup)?;
        channels
            .into_iter()
            .find(|c| c.channel_id == channel_id)
            .ok_or(PaymentError::ChannelLookup(LedgerError::ChannelNotFound(
                channel_id,
            )))
    }
}
