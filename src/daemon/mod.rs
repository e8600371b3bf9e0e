//! Remote service daemon: per-channel spend bookkeeping and free-call quotas.

pub mod http;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod quota;

use crate::types::{ChannelSpend, DaemonError, FreeCallAuthToken, PaymentChannel};
use async_trait::async_trait;
use ethers::types::{Address, Signature, H256, U256};
use tracing::warn;

pub use http::DaemonClient;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockDaemon;
pub use quota::{FreeCallQuery, FreeCallQuotaOracle};

/// Signed request for the daemon's view of a channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelStateRequest {
    pub channel_id: U256,
    pub current_block: u64,
    pub signature: Signature,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelStateReply {
    pub current_nonce: U256,
    pub current_signed_amount: U256,
}

/// Signed request for the free calls left under a token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FreeCallStateRequest {
    pub signer: Address,
    pub token: FreeCallAuthToken,
    pub org_id: String,
    pub service_id: String,
    pub payment_group_id: H256,
    pub current_block: u64,
    pub signature: Signature,
}

#[async_trait]
pub trait ChannelStateService: Send + Sync {
    async fn get_channel_state(
        &self,
        request: &ChannelStateRequest,
    ) -> Result<ChannelStateReply, DaemonError>;
}

#[async_trait]
pub trait FreeCallStateService: Send + Sync {
    async fn get_free_calls_available(
        &self,
        request: &FreeCallStateRequest,
    ) -> Result<i64, DaemonError>;
}

/// Merge the ledger's and the daemon's view of a channel's spend.
///
/// The daemon is authoritative for the nonce it accepts and the amount it
/// has seen signed at that nonce. A daemon behind the ledger has not seen the
/// latest claim yet, so nothing is spent at the ledger nonce.
pub fn reconcile(channel: &PaymentChannel, reply: &ChannelStateReply) -> ChannelSpend {
    if reply.current_nonce >= channel.nonce {
        ChannelSpend {
            nonce: reply.current_nonce,
            spent: reply.current_signed_amount,
        }
    } else {
        warn!(
            channel_id = %channel.channel_id,
            ledger_nonce = %channel.nonce,
            daemon_nonce = %reply.current_nonce,
            "daemon channel state is behind the ledger"
        );
        ChannelSpend {
            nonce: channel.nonce,
            spent: U256::zero(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(nonce: u64) -> PaymentChannel {
        PaymentChannel {
            channel_id: U256::from(3),
            sender: Address::zero(),
            signer: Address::zero(),
            recipient: Address::zero(),
            group_id: H256::zero(),
            value: U256::from(100),
            nonce: U256::from(nonce),
            expiration: 10,
        }
    }

    #[test]
    fn test_reconcile_trusts_daemon_when_current() {
        let reply = ChannelStateReply {
            current_nonce: U256::from(2),
            current_signed_amount: U256::from(40),
        };

        assert_eq!(
            reconcile(&channel(2), &reply),
            ChannelSpend {
                nonce: U256::from(2),
                spent: U256::from(40)
            }
        );
        assert_eq!(reconcile(&channel(1), &reply).spent, U256::from(40));
    }

    #[test]
    fn test_reconcile_lagging_daemon_resets_spend() {
        let reply = ChannelStateReply {
            current_nonce: U256::from(1),
            current_signed_amount: U256::from(40),
        };

        assert_eq!(
            reconcile(&channel(2), &reply),
            ChannelSpend {
                nonce: U256::from(2),
                spent: U256::zero()
            }
        );
    }
}
