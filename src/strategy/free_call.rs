use crate::daemon::{FreeCallQuery, FreeCallQuotaOracle};
use crate::state::Ledger;
use crate::strategy::{CallContext, PaymentStrategy};
use crate::types::{FreeCallAuthToken, FreeCallPayment, Payment, PaymentError, INVALID_PAYMENT};
use crate::utils::crypto::{FreeCallFields, SigningHelper};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Pays with free calls granted to the caller's DApp identity.
///
/// The token proves that the DApp user owns the signer address; the signer
/// key then signs each free call itself.
pub struct FreeCallStrategy {
    ledger: Arc<dyn Ledger>,
    signer: Arc<SigningHelper>,
    token: FreeCallAuthToken,
    oracle: FreeCallQuotaOracle,
}

impl FreeCallStrategy {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        signer: Arc<SigningHelper>,
        token: FreeCallAuthToken,
        oracle: FreeCallQuotaOracle,
    ) -> Self {
        Self {
            ledger,
            signer,
            token,
            oracle,
        }
    }
}

#[async_trait]
impl PaymentStrategy for FreeCallStrategy {
    async fn decide(&self, ctx: &CallContext) -> Result<Payment, PaymentError> {
        debug!(group = %ctx.endpoint_group, "current endpoint group name");
        let Some(endpoint_group) = ctx.resolve_endpoint_group() else {
            debug!(service_id = %ctx.service_id, "endpoint group not found, return invalid payment");
            return Ok(INVALID_PAYMENT);
        };

        if endpoint_group.free_calls == 0 {
            debug!(
                service_id = %ctx.service_id,
                "free calls are not configured, return invalid payment"
            );
            return Ok(INVALID_PAYMENT);
        }

        let current_block = self
            .ledger
            .block_number()
            .await
            .map_err(PaymentError::BlockNumber)?;
        let query = FreeCallQuery {
            org_id: &ctx.org_id,
            service_id: &ctx.service_id,
            endpoint_group: &endpoint_group,
            current_block,
        };
        let available = self
            .oracle
            .free_calls_available(&self.signer, &self.token, &query)
            .await?;
        if available <= 0 {
            debug!(
                service_id = %ctx.service_id,
                "no free calls available, return invalid payment"
            );
            return Ok(INVALID_PAYMENT);
        }

        let fields = FreeCallFields {
            signer: self.signer.address(),
            token: &self.token,
            org_id: &ctx.org_id,
            service_id: &ctx.service_id,
            payment_group_id: endpoint_group.payment_group_id,
            current_block,
        };
        let signature = self.signer.sign_free_call(&fields)?;
        debug!(
            service_id = %ctx.service_id,
            available,
            "return free call payment"
        );

        Ok(Payment::FreeCall(FreeCallPayment {
            signer: self.signer.address(),
            token: self.token.clone(),
            org_id: ctx.org_id.clone(),
            service_id: ctx.service_id.clone(),
            payment_group_id: endpoint_group.payment_group_id,
            current_block,
            signature,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::MockDaemon;
    use crate::state::MockLedger;
    use crate::types::{EndpointGroup, StaticMetadataProvider};
    use crate::utils::crypto::{
        create_free_call_message, create_free_call_token_message, recover_signer,
    };
    use ethers::signers::LocalWallet;
    use ethers::types::H256;

    const BLOCK: u64 = 77;

    struct Fixture {
        daemon: Arc<MockDaemon>,
        signer: Arc<SigningHelper>,
        strategy: FreeCallStrategy,
        ctx: CallContext,
    }

    fn setup(free_calls_configured: u64, free_calls_left: i64) -> Fixture {
        let daemon = Arc::new(MockDaemon::with_free_calls(free_calls_left));
        let signer = Arc::new(SigningHelper::new(LocalWallet::new(&mut rand::thread_rng())));
        let issuer = SigningHelper::new(LocalWallet::new(&mut rand::thread_rng()));
        let message = create_free_call_token_message("user@example.com", signer.address(), 1_000);
        let token = FreeCallAuthToken {
            dapp_user_id: "user@example.com".to_string(),
            signer: signer.address(),
            expiration_block: 1_000,
            token: issuer.sign(&message).unwrap().to_vec(),
        };
        let metadata = StaticMetadataProvider::new().with_endpoint_group(EndpointGroup {
            group_name: "default_group".to_string(),
            endpoints: Vec::new(),
            pricing: Vec::new(),
            free_calls: free_calls_configured,
            free_call_signer_address: Some(issuer.address()),
            payment_group_id: H256::repeat_byte(5),
        });
        let strategy = FreeCallStrategy::new(
            Arc::new(MockLedger::new(BLOCK)),
            signer.clone(),
            token,
            FreeCallQuotaOracle::new(daemon.clone()),
        );
        let ctx = CallContext::new("org", "service", "default_group", Arc::new(metadata));

        Fixture {
            daemon,
            signer,
            strategy,
            ctx,
        }
    }

    #[tokio::test]
    async fn test_unconfigured_free_calls_skip_quota_lookup() {
        let f = setup(0, 10);

        assert_eq!(f.strategy.decide(&f.ctx).await.unwrap(), INVALID_PAYMENT);
        assert_eq!(f.daemon.free_call_requests(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_quota_declines() {
        for left in [0, -3] {
            let f = setup(5, left);

            assert_eq!(f.strategy.decide(&f.ctx).await.unwrap(), INVALID_PAYMENT);
            assert_eq!(f.daemon.free_call_requests(), 1);
        }
    }

    #[tokio::test]
    async fn test_available_quota_builds_signed_payment() {
        let f = setup(5, 2);

        let payment = match f.strategy.decide(&f.ctx).await.unwrap() {
            Payment::FreeCall(payment) => payment,
            other => panic!("expected free call payment, got {:?}", other),
        };

        assert_eq!(payment.signer, f.signer.address());
        assert_eq!(payment.org_id, "org");
        assert_eq!(payment.service_id, "service");
        assert_eq!(payment.payment_group_id, H256::repeat_byte(5));
        assert_eq!(payment.current_block, BLOCK);

        let message = create_free_call_message(&FreeCallFields {
            signer: payment.signer,
            token: &payment.token,
            org_id: &payment.org_id,
            service_id: &payment.service_id,
            payment_group_id: payment.payment_group_id,
            current_block: payment.current_block,
        });
        assert_eq!(
            recover_signer(&message, &payment.signature).unwrap(),
            f.signer.address()
        );
    }

    #[tokio::test]
    async fn test_missing_endpoint_group_declines() {
        let f = setup(5, 2);
        let ctx = CallContext {
            endpoint_group: "unknown".to_string(),
            ..f.ctx.clone()
        };

        assert_eq!(f.strategy.decide(&ctx).await.unwrap(), INVALID_PAYMENT);
        assert_eq!(f.daemon.free_call_requests(), 0);
    }
}
