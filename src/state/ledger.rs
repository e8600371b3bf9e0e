use crate::types::{LedgerError, PaymentChannel, PaymentGroup};
use async_trait::async_trait;
use ethers::types::{Address, H256, U256};

/// Ledger reads and escrow mutations.
///
/// Mutations report only whether the transaction was submitted; callers must
/// re-read channel state afterwards instead of trusting the return value.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn block_number(&self) -> Result<u64, LedgerError>;

    /// Open a channel from `owner` to `group`, expiring at block `expiration`.
    async fn open_channel(
        &self,
        group: &PaymentGroup,
        owner: Address,
        value: U256,
        expiration: u64,
    ) -> Result<U256, LedgerError>;

    async fn add_funds(&self, channel_id: U256, value: U256) -> Result<(), LedgerError>;

    /// Push the expiration of `channel_id` back by `blocks`.
    async fn extend(&self, channel_id: U256, blocks: u64) -> Result<(), LedgerError>;

    /// Add funds and extend in a single transaction.
    async fn extend_and_add_funds(
        &self,
        channel_id: U256,
        blocks: u64,
        value: U256,
    ) -> Result<(), LedgerError>;

    /// Channels in `group_id` that `owner` may sign for.
    async fn list_channels(
        &self,
        owner: Address,
        group_id: H256,
    ) -> Result<Vec<PaymentChannel>, LedgerError>;
}
