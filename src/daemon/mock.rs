//! In-memory daemon bookkeeping for tests and local runs.

use crate::daemon::{
    ChannelStateReply, ChannelStateRequest, ChannelStateService, FreeCallStateRequest,
    FreeCallStateService,
};
use crate::types::{ChannelPayment, DaemonError};
use async_trait::async_trait;
use ethers::types::U256;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use tokio::sync::RwLock;

pub struct MockDaemon {
    channels: RwLock<HashMap<U256, ChannelStateReply>>,
    free_calls: AtomicI64,
    channel_state_requests: AtomicUsize,
    free_call_requests: AtomicUsize,
    unavailable: AtomicBool,
}

impl MockDaemon {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            free_calls: AtomicI64::new(0),
            channel_state_requests: AtomicUsize::new(0),
            free_call_requests: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn with_free_calls(free_calls: i64) -> Self {
        let daemon = Self::new();
        daemon.free_calls.store(free_calls, Ordering::SeqCst);
        daemon
    }

    pub fn set_free_calls(&self, free_calls: i64) {
        self.free_calls.store(free_calls, Ordering::SeqCst);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn set_channel_state(&self, channel_id: U256, nonce: U256, signed_amount: U256) {
        self.channels.write().await.insert(
            channel_id,
            ChannelStateReply {
                current_nonce: nonce,
                current_signed_amount: signed_amount,
            },
        );
    }

    /// Record a payment as accepted, as the daemon does once a call succeeds.
    pub async fn accept_payment(&self, payment: &ChannelPayment) {
        self.set_channel_state(payment.channel_id, payment.nonce, payment.amount)
            .await;
    }

    pub fn channel_state_requests(&self) -> usize {
        self.channel_state_requests.load(Ordering::SeqCst)
    }

    pub fn free_call_requests(&self) -> usize {
        self.free_call_requests.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), DaemonError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DaemonError::Transport("mock daemon unavailable".to_string()));
        }
        Ok(())
    }
}

impl Default for MockDaemon {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelStateService for MockDaemon {
    async fn get_channel_state(
        &self,
        request: &ChannelStateRequest,
    ) -> Result<ChannelStateReply, DaemonError> {
        self.channel_state_requests.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self
            .channels
            .read()
            .await
            .get(&request.channel_id)
            .copied()
            .unwrap_or_default())
    }
}

#[async_trait]
impl FreeCallStateService for MockDaemon {
    async fn get_free_calls_available(
        &self,
        _request: &FreeCallStateRequest,
    ) -> Result<i64, DaemonError> {
        self.free_call_requests.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.free_calls.load(Ordering::SeqCst))
    }
}
