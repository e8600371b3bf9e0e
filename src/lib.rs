//! Client-side payments for metered remote services.
//!
//! Each outbound call is authorized either by a signed claim against an
//! escrow payment channel or by a signed free-call token. Channels are
//! opened, funded and extended on demand through a [`state::Ledger`], with
//! mutations for one (signer, payment group) pair serialized by the
//! [`state::ChannelRegistry`].

pub mod client;
pub mod config;
pub mod daemon;
pub mod middleware;
pub mod state;
pub mod strategy;
pub mod types;
pub mod utils;

pub use client::{CallFailureClassifier, CallStatus, FailureCategory, ServiceClient};
pub use config::{ClientConfig, ConfigError, PaymentConfig};
pub use daemon::{DaemonClient, FreeCallQuotaOracle};
pub use state::{ChannelLifecycleManager, ChannelRegistry, Ledger};
pub use strategy::{
    CallContext, DefaultPaymentStrategy, FreeCallStrategy, OnDemandChannelStrategy,
    PaymentStrategy,
};
pub use types::{
    CallError, ChannelPayment, FreeCallAuthToken, FreeCallPayment, Payment, PaymentChannel,
    PaymentError, INVALID_PAYMENT,
};
pub use utils::SigningHelper;
