use ethers::types::{Address, Signature, H256, U256};
use serde::{Deserialize, Serialize};

/// Authorization attached to a single outbound call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payment {
    Channel(ChannelPayment),
    FreeCall(FreeCallPayment),
    /// No valid authorization could be constructed; the call must not be made.
    Invalid,
}

pub const INVALID_PAYMENT: Payment = Payment::Invalid;

impl Payment {
    pub fn is_valid(&self) -> bool {
        !matches!(self, Payment::Invalid)
    }
}

/// Spend approval for a payment channel.
///
/// `amount` is the cumulative spend authorized on the channel at `nonce`,
/// not the price of this call alone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPayment {
    pub channel_id: U256,
    pub amount: U256,
    pub nonce: U256,
    pub signature: Signature,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeCallPayment {
    pub signer: Address,
    pub token: FreeCallAuthToken,
    pub org_id: String,
    pub service_id: String,
    pub payment_group_id: H256,
    pub current_block: u64,
    pub signature: Signature,
}

/// Token issued by the free-call signer binding a DApp user to `signer`.
///
/// Issued externally and only forwarded by this crate. `token` holds the
/// issuer's signature bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeCallAuthToken {
    pub dapp_user_id: String,
    pub signer: Address,
    pub expiration_block: u64,
    pub token: Vec<u8>,
}

impl FreeCallAuthToken {
    pub fn is_expired(&self, current_block: u64) -> bool {
        current_block > self.expiration_block
    }
}
