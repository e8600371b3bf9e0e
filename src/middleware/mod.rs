pub mod payment;

pub use payment::{parse_payment_metadata, payment_metadata};
