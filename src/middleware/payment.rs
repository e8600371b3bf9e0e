use crate::types::{
    ChannelPayment, FreeCallAuthToken, FreeCallPayment, MetadataError, Payment,
};
use crate::utils::crypto::U256Ext;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ethers::types::{Address, Signature, H256, U256};
use std::str::FromStr;

pub const PAYMENT_TYPE: &str = "snet-payment-type";
pub const CHANNEL_ID: &str = "snet-payment-channel-id-bin";
pub const CHANNEL_AMOUNT: &str = "snet-payment-channel-amount-bin";
pub const CHANNEL_NONCE: &str = "snet-payment-channel-nonce-bin";
pub const SIGNATURE: &str = "snet-payment-channel-signature-bin";
pub const FREE_CALL_USER_ID: &str = "snet-free-call-user-id";
pub const FREE_CALL_USER_ADDRESS: &str = "snet-free-call-user-address";
pub const FREE_CALL_AUTH_TOKEN: &str = "snet-free-call-auth-token-bin";
pub const FREE_CALL_TOKEN_EXPIRY: &str = "snet-free-call-token-expiry-block";
pub const ORGANIZATION_ID: &str = "snet-organization-id";
pub const SERVICE_ID: &str = "snet-service-id";
pub const PAYMENT_GROUP_ID: &str = "snet-payment-group-id-bin";
pub const CURRENT_BLOCK: &str = "snet-current-block-number";

pub const ESCROW_PAYMENT: &str = "escrow";
pub const FREE_CALL_PAYMENT: &str = "free-call";

/// Metadata entries that authorize a call. Binary values are base64 encoded.
pub fn payment_metadata(payment: &Payment) -> Result<Vec<(&'static str, String)>, MetadataError> {
    match payment {
        Payment::Channel(p) => Ok(vec![
            (PAYMENT_TYPE, ESCROW_PAYMENT.to_string()),
            (CHANNEL_ID, STANDARD.encode(p.channel_id.to_be_bytes_vec())),
            (CHANNEL_AMOUNT, STANDARD.encode(p.amount.to_be_bytes_vec())),
            (CHANNEL_NONCE, STANDARD.encode(p.nonce.to_be_bytes_vec())),
            (SIGNATURE, STANDARD.encode(p.signature.to_vec())),
        ]),
        Payment::FreeCall(p) => Ok(vec![
            (PAYMENT_TYPE, FREE_CALL_PAYMENT.to_string()),
            (FREE_CALL_USER_ID, p.token.dapp_user_id.clone()),
            (FREE_CALL_USER_ADDRESS, format!("{:?}", p.signer)),
            (FREE_CALL_AUTH_TOKEN, STANDARD.encode(&p.token.token)),
            (FREE_CALL_TOKEN_EXPIRY, p.token.expiration_block.to_string()),
            (ORGANIZATION_ID, p.org_id.clone()),
            (SERVICE_ID, p.service_id.clone()),
            (PAYMENT_GROUP_ID, STANDARD.encode(p.payment_group_id.as_bytes())),
            (CURRENT_BLOCK, p.current_block.to_string()),
            (SIGNATURE, STANDARD.encode(p.signature.to_vec())),
        ]),
        Payment::Invalid => Err(MetadataError::InvalidPayment),
    }
}

/// Rebuilds a payment from call metadata, looking entries up by name.
pub fn parse_payment_metadata<F>(lookup: F) -> Result<Payment, MetadataError>
where
    F: Fn(&str) -> Option<String>,
{
    let payment_type = required(&lookup, PAYMENT_TYPE)?;
    match payment_type.as_str() {
        ESCROW_PAYMENT => Ok(Payment::Channel(ChannelPayment {
            channel_id: u256_entry(&lookup, CHANNEL_ID)?,
            amount: u256_entry(&lookup, CHANNEL_AMOUNT)?,
            nonce: u256_entry(&lookup, CHANNEL_NONCE)?,
            signature: signature_entry(&lookup)?,
        })),
        FREE_CALL_PAYMENT => {
            let signer = required(&lookup, FREE_CALL_USER_ADDRESS)?;
            let signer =
                Address::from_str(&signer).map_err(|e| malformed(FREE_CALL_USER_ADDRESS, e))?;
            let group_id = binary_entry(&lookup, PAYMENT_GROUP_ID)?;
            if group_id.len() != 32 {
                return Err(malformed(PAYMENT_GROUP_ID, "expected 32 bytes"));
            }

            Ok(Payment::FreeCall(FreeCallPayment {
                signer,
                token: FreeCallAuthToken {
                    dapp_user_id: required(&lookup, FREE_CALL_USER_ID)?,
                    signer,
                    expiration_block: u64_entry(&lookup, FREE_CALL_TOKEN_EXPIRY)?,
                    token: binary_entry(&lookup, FREE_CALL_AUTH_TOKEN)?,
                },
                org_id: required(&lookup, ORGANIZATION_ID)?,
                service_id: required(&lookup, SERVICE_ID)?,
                payment_group_id: H256::from_slice(&group_id),
                current_block: u64_entry(&lookup, CURRENT_BLOCK)?,
                signature: signature_entry(&lookup)?,
            }))
        }
        other => Err(MetadataError::UnknownPaymentType(other.to_string())),
    }
}

fn malformed(name: &'static str, reason: impl ToString) -> MetadataError {
    MetadataError::Malformed {
        name,
        reason: reason.to_string(),
    }
}

fn required<F>(lookup: &F, name: &'static str) -> Result<String, MetadataError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).ok_or(MetadataError::Missing(name))
}

fn binary_entry<F>(lookup: &F, name: &'static str) -> Result<Vec<u8>, MetadataError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = required(lookup, name)?;
    STANDARD.decode(value).map_err(|e| malformed(name, e))
}

fn u256_entry<F>(lookup: &F, name: &'static str) -> Result<U256, MetadataError>
where
    F: Fn(&str) -> Option<String>,
{
    let bytes = binary_entry(lookup, name)?;
    if bytes.len() > 32 {
        return Err(malformed(name, "value wider than 32 bytes"));
    }
    Ok(U256::from_big_endian(&bytes))
}

fn u64_entry<F>(lookup: &F, name: &'static str) -> Result<u64, MetadataError>
where
    F: Fn(&str) -> Option<String>,
{
    required(lookup, name)?
        .parse::<u64>()
        .map_err(|e| malformed(name, e))
}

fn signature_entry<F>(lookup: &F) -> Result<Signature, MetadataError>
where
    F: Fn(&str) -> Option<String>,
{
    let bytes = binary_entry(lookup, SIGNATURE)?;
    Signature::try_from(bytes.as_slice()).map_err(|e| malformed(SIGNATURE, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::crypto::{
        create_claim_message, create_free_call_message, create_free_call_token_message,
        recover_signer, FreeCallFields, SigningHelper,
    };
    use axum::{
        body::Body,
        http::{HeaderMap, Request, StatusCode},
        middleware::{self, Next},
        response::Response,
        routing::post,
        Router,
    };
    use ethers::signers::LocalWallet;
    use std::collections::HashMap;
    use tower::util::ServiceExt;

    fn random_signer() -> SigningHelper {
        SigningHelper::new(LocalWallet::new(&mut rand::thread_rng()))
    }

    fn as_map(entries: Vec<(&'static str, String)>) -> HashMap<String, String> {
        entries
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }

    #[test]
    fn test_channel_payment_metadata_parses_back() {
        let signer = random_signer();
        let contract = Address::random();
        let signature = signer
            .sign_channel_payment(contract, 42.into(), 150.into(), 3.into())
            .unwrap();
        let payment = Payment::Channel(ChannelPayment {
            channel_id: 42.into(),
            amount: 150.into(),
            nonce: 3.into(),
            signature,
        });

        let headers = as_map(payment_metadata(&payment).unwrap());
        assert_eq!(headers[PAYMENT_TYPE], "escrow");
        assert_eq!(STANDARD.decode(&headers[CHANNEL_ID]).unwrap().len(), 32);
        assert_eq!(STANDARD.decode(&headers[SIGNATURE]).unwrap().len(), 65);

        let parsed = parse_payment_metadata(|name| headers.get(name).cloned()).unwrap();
        assert_eq!(parsed, payment);

        let Payment::Channel(p) = parsed else {
            panic!("expected channel payment");
        };
        let message = create_claim_message(contract, p.channel_id, p.amount, p.nonce);
        assert_eq!(recover_signer(&message, &p.signature).unwrap(), signer.address());
    }

    #[test]
    fn test_free_call_metadata_parses_back() {
        let signer = random_signer();
        let issuer = random_signer();
        let token_message = create_free_call_token_message("user@example.com", signer.address(), 900);
        let token = FreeCallAuthToken {
            dapp_user_id: "user@example.com".to_string(),
            signer: signer.address(),
            expiration_block: 900,
            token: issuer.sign(&token_message).unwrap().to_vec(),
        };
        let fields = FreeCallFields {
            signer: signer.address(),
            token: &token,
            org_id: "org",
            service_id: "service",
            payment_group_id: H256::repeat_byte(9),
            current_block: 120,
        };
        let payment = Payment::FreeCall(FreeCallPayment {
            signer: signer.address(),
            token: token.clone(),
            org_id: "org".to_string(),
            service_id: "service".to_string(),
            payment_group_id: H256::repeat_byte(9),
            current_block: 120,
            signature: signer.sign_free_call(&fields).unwrap(),
        });

        let headers = as_map(payment_metadata(&payment).unwrap());
        assert_eq!(headers[PAYMENT_TYPE], "free-call");
        assert_eq!(headers[CURRENT_BLOCK], "120");

        let parsed = parse_payment_metadata(|name| headers.get(name).cloned()).unwrap();
        assert_eq!(parsed, payment);

        let Payment::FreeCall(p) = parsed else {
            panic!("expected free call payment");
        };
        let message = create_free_call_message(&FreeCallFields {
            signer: p.signer,
            token: &p.token,
            org_id: &p.org_id,
            service_id: &p.service_id,
            payment_group_id: p.payment_group_id,
            current_block: p.current_block,
        });
        assert_eq!(recover_signer(&message, &p.signature).unwrap(), signer.address());
    }

    #[test]
    fn test_invalid_payment_cannot_be_encoded() {
        assert_eq!(
            payment_metadata(&Payment::Invalid),
            Err(MetadataError::InvalidPayment)
        );
    }

    #[test]
    fn test_missing_and_malformed_entries() {
        assert_eq!(
            parse_payment_metadata(|_| None),
            Err(MetadataError::Missing(PAYMENT_TYPE))
        );
        assert_eq!(
            parse_payment_metadata(|name| (name == PAYMENT_TYPE).then(|| "prepaid".to_string())),
            Err(MetadataError::UnknownPaymentType("prepaid".to_string()))
        );

        let mut headers = HashMap::new();
        headers.insert(PAYMENT_TYPE.to_string(), "escrow".to_string());
        headers.insert(CHANNEL_ID.to_string(), "not base64!".to_string());
        assert!(matches!(
            parse_payment_metadata(|name| headers.get(name).cloned()),
            Err(MetadataError::Malformed { name: CHANNEL_ID, .. })
        ));

        headers.insert(CHANNEL_ID.to_string(), STANDARD.encode([1u8; 32]));
        assert_eq!(
            parse_payment_metadata(|name| headers.get(name).cloned()),
            Err(MetadataError::Missing(CHANNEL_AMOUNT))
        );

        headers.insert(CHANNEL_AMOUNT.to_string(), STANDARD.encode([1u8; 33]));
        assert!(matches!(
            parse_payment_metadata(|name| headers.get(name).cloned()),
            Err(MetadataError::Malformed { name: CHANNEL_AMOUNT, .. })
        ));
    }

    fn header_lookup(headers: &HeaderMap) -> impl Fn(&str) -> Option<String> + '_ {
        |name| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        }
    }

    async fn payment_gate(request: Request<Body>, next: Next) -> Result<Response, StatusCode> {
        let payment = parse_payment_metadata(header_lookup(request.headers()));
        match payment {
            Ok(Payment::Invalid) | Err(_) => Err(StatusCode::PAYMENT_REQUIRED),
            Ok(_) => Ok(next.run(request).await),
        }
    }

    fn gated_service() -> Router {
        Router::new()
            .route("/call", post(|| async { "ok" }))
            .layer(middleware::from_fn(payment_gate))
    }

    #[tokio::test]
    async fn test_gate_reads_attached_metadata() {
        let signer = random_signer();
        let payment = Payment::Channel(ChannelPayment {
            channel_id: 7.into(),
            amount: 20.into(),
            nonce: 0.into(),
            signature: signer
                .sign_channel_payment(Address::random(), 7.into(), 20.into(), 0.into())
                .unwrap(),
        });

        let mut request = Request::builder().method("POST").uri("/call");
        for (name, value) in payment_metadata(&payment).unwrap() {
            request = request.header(name, value);
        }
        let response = gated_service()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bare = Request::builder()
            .method("POST")
            .uri("/call")
            .body(Body::empty())
            .unwrap();
        let response = gated_service().oneshot(bare).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    }
}
