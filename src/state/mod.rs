pub mod channel;
pub mod ledger;
pub mod lifecycle;
#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use channel::ChannelRegistry;
pub use ledger::Ledger;
pub use lifecycle::{ChannelAction, ChannelLifecycleManager, ChannelRequest};
#[cfg(any(test, feature = "mock"))]
pub use mock::MockLedger;
