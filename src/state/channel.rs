use crate::state::ledger::Ledger;
use crate::types::{LedgerError, PaymentChannel};
use ethers::types::{Address, H256, U256};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

type ChannelKey = (Address, H256);

/// Local view of the caller's channels, keyed by (signer, payment group).
///
/// The cache is a hint only: the ledger stays authoritative and
/// [`ChannelRegistry::refresh`] is the only way entries are replaced. The
/// registry also owns the per-key locks that serialize channel mutations.
/// It lives as long as the client that created it and is emptied on shutdown.
#[derive(Clone)]
pub struct ChannelRegistry {
    channels: Arc<RwLock<HashMap<ChannelKey, Vec<PaymentChannel>>>>,
    locks: Arc<Mutex<HashMap<ChannelKey, Arc<Mutex<()>>>>>,
    ledger: Arc<dyn Ledger>,
}

impl ChannelRegistry {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            locks: Arc::new(Mutex::new(HashMap::new())),
            ledger,
        }
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    /// Acquire the mutation lock for (`owner`, `group_id`).
    ///
    /// Waiters are served in FIFO order. Dropping the guard, including by
    /// dropping a cancelled future that holds it, releases the lock.
    pub async fn lock(&self, owner: Address, group_id: H256) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry((owner, group_id)).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Read the channels from the ledger and replace the cached entry.
    ///
    /// On failure the cache is left untouched.
    pub async fn refresh(
        &self,
        owner: Address,
        group_id: H256,
    ) -> Result<Vec<PaymentChannel>, LedgerError> {
        let channels = self.ledger.list_channels(owner, group_id).await?;
        debug!(owner = ?owner, group = ?group_id, count = channels.len(), "refreshed channels");
        self.channels
            .write()
            .await
            .insert((owner, group_id), channels.clone());
        Ok(channels)
    }

    pub async fn cached(&self, owner: Address, group_id: H256) -> Vec<PaymentChannel> {
        self.channels
            .read()
            .await
            .get(&(owner, group_id))
            .cloned()
            .unwrap_or_default()
    }

    /// Record a nonce reported by the daemon for a cached channel.
    pub async fn record_nonce(&self, owner: Address, group_id: H256, channel_id: U256, nonce: U256) {
        let mut channels = self.channels.write().await;
        if let Some(channel) = channels
            .get_mut(&(owner, group_id))
            .and_then(|list| list.iter_mut().find(|c| c.channel_id == channel_id))
        {
            if nonce > channel.nonce {
                channel.nonce = nonce;
            }
        }
    }

    pub async fn invalidate(&self, owner: Address, group_id: H256) {
        self.channels.write().await.remove(&(owner, group_id));
    }

    /// Drop every cached channel and every lock nobody holds or awaits.
    pub async fn clear(&self) {
        self.channels.write().await.clear();
        self.locks
            .lock()
            .await
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}
