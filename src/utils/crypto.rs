//! Deterministic message construction and signing.
//!
//! Every signed payload is a fixed-order concatenation of big-endian field
//! encodings. The payload is hashed with keccak-256 and that digest is signed
//! as an EIP-191 personal message, so identical inputs always produce
//! byte-identical payloads and signatures.

use crate::types::{FreeCallAuthToken, SigningError};
use ethers::{
    signers::{LocalWallet, Signer},
    types::{Address, RecoveryMessage, Signature, H256, U256},
    utils::{hash_message, keccak256},
};

const CHANNEL_STATE_PREFIX: &[u8] = b"__get_channel_state";
const CLAIM_PREFIX: &[u8] = b"__MPE_claim_message";
const FREE_CALL_PREFIX: &[u8] = b"__prefix_free_attempt";
const FREE_CALL_TOKEN_PREFIX: &[u8] = b"__free_call_auth_token";

pub trait U256Ext {
    fn to_be_bytes_vec(&self) -> Vec<u8>;
}

impl U256Ext for U256 {
    fn to_be_bytes_vec(&self) -> Vec<u8> {
        let mut bytes = [0u8; 32];
        self.to_big_endian(&mut bytes);
        bytes.to_vec()
    }
}

pub fn create_channel_state_message(contract: Address, channel_id: U256, block: u64) -> Vec<u8> {
    let mut message = Vec::new();
    message.extend_from_slice(CHANNEL_STATE_PREFIX);
    message.extend_from_slice(contract.as_bytes());
    message.extend_from_slice(&channel_id.to_be_bytes_vec());
    message.extend_from_slice(&U256::from(block).to_be_bytes_vec());
    message
}

pub fn create_claim_message(
    contract: Address,
    channel_id: U256,
    amount: U256,
    nonce: U256,
) -> Vec<u8> {
    let mut message = Vec::new();
    message.extend_from_slice(CLAIM_PREFIX);
    message.extend_from_slice(contract.as_bytes());
    message.extend_from_slice(&channel_id.to_be_bytes_vec());
    message.extend_from_slice(&amount.to_be_bytes_vec());
    message.extend_from_slice(&nonce.to_be_bytes_vec());
    message
}

/// Fields covered by a free-call signature.
#[derive(Clone, Copy, Debug)]
pub struct FreeCallFields<'a> {
    pub signer: Address,
    pub token: &'a FreeCallAuthToken,
    pub org_id: &'a str,
    pub service_id: &'a str,
    pub payment_group_id: H256,
    pub current_block: u64,
}

pub fn create_free_call_message(fields: &FreeCallFields<'_>) -> Vec<u8> {
    let mut message = Vec::new();
    message.extend_from_slice(FREE_CALL_PREFIX);
    message.extend_from_slice(fields.signer.as_bytes());
    message.extend_from_slice(fields.token.dapp_user_id.as_bytes());
    message.extend_from_slice(&fields.token.token);
    message.extend_from_slice(fields.org_id.as_bytes());
    message.extend_from_slice(fields.service_id.as_bytes());
    message.extend_from_slice(fields.payment_group_id.as_bytes());
    message.extend_from_slice(&U256::from(fields.current_block).to_be_bytes_vec());
    message
}

/// Message the free-call signer signs when issuing a token.
pub fn create_free_call_token_message(
    dapp_user_id: &str,
    signer: Address,
    expiration_block: u64,
) -> Vec<u8> {
    let mut message = Vec::new();
    message.extend_from_slice(FREE_CALL_TOKEN_PREFIX);
    message.extend_from_slice(dapp_user_id.as_bytes());
    message.extend_from_slice(signer.as_bytes());
    message.extend_from_slice(&U256::from(expiration_block).to_be_bytes_vec());
    message
}

/// Recover the address that signed `message` with [`SigningHelper::sign`].
pub fn recover_signer(message: &[u8], signature: &Signature) -> Result<Address, SigningError> {
    let digest = keccak256(message);
    Ok(signature.recover(RecoveryMessage::Data(digest.to_vec()))?)
}

/// Recover the issuer of a free-call token from its embedded signature.
pub fn recover_token_issuer(token: &FreeCallAuthToken) -> Result<Address, SigningError> {
    let signature = Signature::try_from(token.token.as_slice())?;
    let message =
        create_free_call_token_message(&token.dapp_user_id, token.signer, token.expiration_block);
    recover_signer(&message, &signature)
}

/// Caller's signing identity. Signing is stateless and needs no locking.
#[derive(Clone, Debug)]
pub struct SigningHelper {
    wallet: LocalWallet,
}

impl SigningHelper {
    pub fn new(wallet: LocalWallet) -> Self {
        Self { wallet }
    }

    /// Parse a hex private key, with or without `0x`.
    pub fn from_private_key(key: &str) -> Result<Self, SigningError> {
        let bytes = hex::decode(key.trim_start_matches("0x"))
            .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        let wallet =
            LocalWallet::from_bytes(&bytes).map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        Ok(Self::new(wallet))
    }

    /// Parse a private key written as a decimal integer.
    pub fn from_decimal_key(key: &str) -> Result<Self, SigningError> {
        let scalar = U256::from_dec_str(key).map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        let wallet = LocalWallet::from_bytes(&scalar.to_be_bytes_vec())
            .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        Ok(Self::new(wallet))
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub fn sign(&self, message: &[u8]) -> Result<Signature, SigningError> {
        let digest = hash_message(keccak256(message));
        Ok(self.wallet.sign_hash(digest)?)
    }

    pub fn sign_channel_state_request(
        &self,
        contract: Address,
        channel_id: U256,
        block: u64,
    ) -> Result<Signature, SigningError> {
        self.sign(&create_channel_state_message(contract, channel_id, block))
    }

    pub fn sign_channel_payment(
        &self,
        contract: Address,
        channel_id: U256,
        amount: U256,
        nonce: U256,
    ) -> Result<Signature, SigningError> {
        self.sign(&create_claim_message(contract, channel_id, amount, nonce))
    }

    pub fn sign_free_call(&self, fields: &FreeCallFields<'_>) -> Result<Signature, SigningError> {
        if fields.token.token.is_empty() {
            return Err(SigningError::Encoding("free call token is empty".to_string()));
        }
        self.sign(&create_free_call_message(fields))
    }
}
