pub mod crypto;

pub use crypto::{recover_signer, recover_token_issuer, FreeCallFields, SigningHelper, U256Ext};
