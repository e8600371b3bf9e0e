pub mod channel;
pub mod error;
pub mod metadata;
pub mod payment;

pub use channel::{ChannelSpend, PaymentChannel};
pub use error::{CallError, DaemonError, LedgerError, MetadataError, PaymentError, SigningError};
pub use metadata::{
    EndpointGroup, MetadataProvider, PaymentGroup, PriceModel, PricingEntry,
    StaticMetadataProvider,
};
pub use payment::{ChannelPayment, FreeCallAuthToken, FreeCallPayment, Payment, INVALID_PAYMENT};
