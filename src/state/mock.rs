//! In-memory ledger for tests and local runs.

use crate::state::ledger::Ledger;
use crate::types::{LedgerError, PaymentChannel, PaymentGroup};
use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Mock ledger keeping channels in memory.
///
/// Counts every mutation so tests can assert exactly which ledger
/// transactions a decision produced.
pub struct MockLedger {
    channels: RwLock<BTreeMap<U256, PaymentChannel>>,
    block: AtomicU64,
    next_channel_id: AtomicU64,
    opened: AtomicUsize,
    funded: AtomicUsize,
    extended: AtomicUsize,
    extended_and_funded: AtomicUsize,
    fail_queries: AtomicBool,
    fail_mutations: AtomicBool,
}

impl MockLedger {
    pub fn new(block: u64) -> Self {
        Self {
            channels: RwLock::new(BTreeMap::new()),
            block: AtomicU64::new(block),
            next_channel_id: AtomicU64::new(0),
            opened: AtomicUsize::new(0),
            funded: AtomicUsize::new(0),
            extended: AtomicUsize::new(0),
            extended_and_funded: AtomicUsize::new(0),
            fail_queries: AtomicBool::new(false),
            fail_mutations: AtomicBool::new(false),
        }
    }

    pub fn advance_blocks(&self, blocks: u64) {
        self.block.fetch_add(blocks, Ordering::SeqCst);
    }

    /// Make reads fail with a transport error until reset.
    pub fn set_fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Make mutations fail with a rejection until reset.
    pub fn set_fail_mutations(&self, fail: bool) {
        self.fail_mutations.store(fail, Ordering::SeqCst);
    }

    /// Insert a channel directly, bypassing mutation counters.
    pub async fn seed_channel(
        &self,
        group: &PaymentGroup,
        owner: Address,
        value: U256,
        expiration: u64,
    ) -> U256 {
        let channel_id = U256::from(self.next_channel_id.fetch_add(1, Ordering::SeqCst));
        self.channels.write().await.insert(
            channel_id,
            PaymentChannel {
                channel_id,
                sender: owner,
                signer: owner,
                recipient: group.payment_address,
                group_id: group.group_id,
                value,
                nonce: U256::zero(),
                expiration,
            },
        );
        channel_id
    }

    pub async fn channel(&self, channel_id: U256) -> Option<PaymentChannel> {
        self.channels.read().await.get(&channel_id).cloned()
    }

    pub async fn channel_count(&self, owner: Address, group_id: H256) -> usize {
        self.channels
            .read()
            .await
            .values()
            .filter(|c| c.group_id == group_id && c.is_accessible_by(owner))
            .count()
    }

    /// Bump the on-chain nonce, as a recipient claim would.
    pub async fn bump_nonce(&self, channel_id: U256) -> Result<(), LedgerError> {
        let mut channels = self.channels.write().await;
        let channel = channels
            .get_mut(&channel_id)
            .ok_or(LedgerError::ChannelNotFound(channel_id))?;
        channel.nonce += U256::one();
        Ok(())
    }

    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn add_funds_count(&self) -> usize {
        self.funded.load(Ordering::SeqCst)
    }

    pub fn extend_count(&self) -> usize {
        self.extended.load(Ordering::SeqCst)
    }

    pub fn extend_and_add_funds_count(&self) -> usize {
        self.extended_and_funded.load(Ordering::SeqCst)
    }

    pub fn mutation_count(&self) -> usize {
        self.open_count()
            + self.add_funds_count()
            + self.extend_count()
            + self.extend_and_add_funds_count()
    }

    fn check_query(&self) -> Result<(), LedgerError> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(LedgerError::Transport("mock ledger unreachable".to_string()));
        }
        Ok(())
    }

    fn check_mutation(&self) -> Result<(), LedgerError> {
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(LedgerError::Rejected("mock ledger rejected transaction".to_string()));
        }
        Ok(())
    }

    async fn update<F>(&self, channel_id: U256, apply: F) -> Result<(), LedgerError>
    where
        F: FnOnce(&mut PaymentChannel),
    {
        self.check_mutation()?;
        // Let competing tasks interleave with the submission.
        tokio::task::yield_now().await;
        let mut channels = self.channels.write().await;
        let channel = channels
            .get_mut(&channel_id)
            .ok_or(LedgerError::ChannelNotFound(channel_id))?;
        apply(channel);
        Ok(())
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new(1)
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn block_number(&self) -> Result<u64, LedgerError> {
        self.check_query()?;
        Ok(self.block.load(Ordering::SeqCst))
    }

    async fn open_channel(
        &self,
        group: &PaymentGroup,
        owner: Address,
        value: U256,
        expiration: u64,
    ) -> Result<U256, LedgerError> {
        self.check_mutation()?;
        tokio::task::yield_now().await;
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(self.seed_channel(group, owner, value, expiration).await)
    }

    async fn add_funds(&self, channel_id: U256, value: U256) -> Result<(), LedgerError> {
        self.update(channel_id, |channel| channel.value += value).await?;
        self.funded.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn extend(&self, channel_id: U256, blocks: u64) -> Result<(), LedgerError> {
        self.update(channel_id, |channel| channel.expiration += blocks)
            .await?;
        self.extended.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn extend_and_add_funds(
        &self,
        channel_id: U256,
        blocks: u64,
        value: U256,
    ) -> Result<(), LedgerError> {
        self.update(channel_id, |channel| {
            channel.expiration += blocks;
            channel.value += value;
        })
        .await?;
        self.extended_and_funded.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list_channels(
        &self,
        owner: Address,
        group_id: H256,
    ) -> Result<Vec<PaymentChannel>, LedgerError> {
        self.check_query()?;
        tokio::task::yield_now().await;
        Ok(self
            .channels
            .read()
            .await
            .values()
            .filter(|c| c.group_id == group_id && c.is_accessible_by(owner))
            .cloned()
            .collect())
    }
}
