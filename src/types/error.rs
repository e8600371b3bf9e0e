use crate::client::classify::{CallStatus, FailureCategory};
use ethers::types::U256;
use thiserror::Error;

/// Failure reported by the ledger collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Ledger transport error: {0}")]
    Transport(String),
    #[error("Ledger rejected transaction: {0}")]
    Rejected(String),
    #[error("Payment channel {0} not found")]
    ChannelNotFound(U256),
}

/// Failure reported by the remote service daemon.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DaemonError {
    #[error("Daemon transport error: {0}")]
    Transport(String),
    #[error("Daemon returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Malformed daemon reply: {0}")]
    Decode(String),
}

impl DaemonError {
    /// Whether repeating the same request may succeed. Rejections and
    /// malformed replies will not change on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            DaemonError::Transport(_) => true,
            DaemonError::Status { status, .. } => {
                matches!(status, 408 | 429) || (500..600).contains(status)
            }
            DaemonError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for DaemonError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            DaemonError::Decode(error.to_string())
        } else {
            DaemonError::Transport(error.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum SigningError {
    #[error("Invalid private key: {0}")]
    InvalidKey(String),
    #[error("Signing failed: {0}")]
    Wallet(#[from] ethers::signers::WalletError),
    #[error("Signature recovery failed: {0}")]
    Recovery(#[from] ethers::types::SignatureError),
    #[error("Payload cannot be encoded: {0}")]
    Encoding(String),
}

/// Errors surfaced at the payment strategy boundary.
///
/// Business declines are not errors; strategies return
/// [`INVALID_PAYMENT`](crate::types::INVALID_PAYMENT) for those.
#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Failed to read current block number: {0}")]
    BlockNumber(#[source] LedgerError),
    #[error("Payment channel lookup failed: {0}")]
    ChannelLookup(#[source] LedgerError),
    #[error("Payment channel mutation failed: {0}")]
    ChannelMutation(#[source] LedgerError),
    #[error("Payment channel state request failed: {0}")]
    ChannelState(#[source] DaemonError),
    #[error("Free call quota lookup failed: {0}")]
    QuotaLookup(#[source] DaemonError),
    #[error("Free call token rejected: {0}")]
    InvalidFreeCallToken(String),
    #[error(transparent)]
    Signing(#[from] SigningError),
}

impl PaymentError {
    /// Whether the caller may run `decide` again after this failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::BlockNumber(_) | PaymentError::ChannelLookup(_) => true,
            PaymentError::ChannelState(e) | PaymentError::QuotaLookup(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Malformed or incomplete payment metadata on a call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error("Missing payment metadata: {0}")]
    Missing(&'static str),
    #[error("Malformed payment metadata {name}: {reason}")]
    Malformed { name: &'static str, reason: String },
    #[error("Unknown payment type: {0}")]
    UnknownPaymentType(String),
    #[error("Invalid payment cannot be attached to a call")]
    InvalidPayment,
}

#[derive(Error, Debug)]
pub enum CallError {
    #[error(transparent)]
    Payment(#[from] PaymentError),
    #[error("No payment could be authorized for this call")]
    PaymentDeclined,
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("Remote call failed with {status:?}: {message}")]
    Remote {
        status: CallStatus,
        category: FailureCategory,
        message: String,
    },
    #[error("Call cancelled")]
    Cancelled,
}

impl CallError {
    /// Whether the caller may decide a payment again and repeat the call.
    pub fn is_retryable(&self) -> bool {
        match self {
            CallError::Payment(e) => e.is_retryable(),
            CallError::Remote { category, .. } => category.is_transient(),
            _ => false,
        }
    }

    /// Text suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            CallError::Remote {
                category, message, ..
            } => category.user_message(message),
            other => other.to_string(),
        }
    }
}
