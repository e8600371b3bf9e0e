use crate::daemon::{FreeCallStateRequest, FreeCallStateService};
use crate::types::{EndpointGroup, FreeCallAuthToken, PaymentError};
use crate::utils::crypto::{recover_token_issuer, FreeCallFields, SigningHelper};
use std::sync::Arc;
use tracing::debug;

/// Call-site details a free-call quota lookup is bound to.
#[derive(Clone, Copy, Debug)]
pub struct FreeCallQuery<'a> {
    pub org_id: &'a str,
    pub service_id: &'a str,
    pub endpoint_group: &'a EndpointGroup,
    pub current_block: u64,
}

/// Checks a free-call token locally, then asks the daemon how many free
/// calls remain under it.
#[derive(Clone)]
pub struct FreeCallQuotaOracle {
    service: Arc<dyn FreeCallStateService>,
}

impl FreeCallQuotaOracle {
    pub fn new(service: Arc<dyn FreeCallStateService>) -> Self {
        Self { service }
    }

    pub async fn free_calls_available(
        &self,
        signer: &SigningHelper,
        token: &FreeCallAuthToken,
        query: &FreeCallQuery<'_>,
    ) -> Result<i64, PaymentError> {
        if token.signer != signer.address() {
            return Err(PaymentError::InvalidFreeCallToken(format!(
                "token is bound to {:?}, caller is {:?}",
                token.signer,
                signer.address()
            )));
        }

        if let Some(expected) = query.endpoint_group.free_call_signer_address {
            let issuer = recover_token_issuer(token)
                .map_err(|e| PaymentError::InvalidFreeCallToken(e.to_string()))?;
            if issuer != expected {
                return Err(PaymentError::InvalidFreeCallToken(format!(
                    "token issued by {:?}, expected {:?}",
                    issuer, expected
                )));
            }
        }

        if token.is_expired(query.current_block) {
            debug!(
                expiration = token.expiration_block,
                block = query.current_block,
                "free call token expired"
            );
            return Ok(0);
        }

        let fields = FreeCallFields {
            signer: signer.address(),
            token,
            org_id: query.org_id,
            service_id: query.service_id,
            payment_group_id: query.endpoint_group.payment_group_id,
            current_block: query.current_block,
        };
        let request = FreeCallStateRequest {
            signer: signer.address(),
            token: token.clone(),
            org_id: query.org_id.to_string(),
            service_id: query.service_id.to_string(),
            payment_group_id: query.endpoint_group.payment_group_id,
            current_block: query.current_block,
            signature: signer.sign_free_call(&fields)?,
        };

        self.service
            .get_free_calls_available(&request)
            .await
            .map_err(PaymentError::QuotaLookup)
    }
}
