use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

/// On-chain escrow between a caller and a recipient payment group.
///
/// The ledger assigns `channel_id`. `signer` is the address authorized to
/// sign spend approvals and may differ from `sender`, who funded the channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentChannel {
    pub channel_id: U256,
    pub sender: Address,
    pub signer: Address,
    pub recipient: Address,
    pub group_id: H256,
    pub value: U256,
    pub nonce: U256,
    pub expiration: u64,
}

impl PaymentChannel {
    /// Whether `owner` may authorize spends from this channel.
    pub fn is_accessible_by(&self, owner: Address) -> bool {
        self.sender == owner || self.signer == owner
    }

    /// Blocks left before expiration, zero once expired.
    pub fn blocks_remaining(&self, current_block: u64) -> u64 {
        self.expiration.saturating_sub(current_block)
    }
}

/// Spend already authorized on a channel at its current nonce.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelSpend {
    pub nonce: U256,
    pub spent: U256,
}
