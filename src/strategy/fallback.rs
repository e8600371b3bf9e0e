use crate::strategy::{CallContext, PaymentStrategy};
use crate::types::{Payment, PaymentError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Uses free calls while they last, then pays from a channel.
pub struct DefaultPaymentStrategy {
    free_call: Arc<dyn PaymentStrategy>,
    paid: Arc<dyn PaymentStrategy>,
}

impl DefaultPaymentStrategy {
    pub fn new(free_call: Arc<dyn PaymentStrategy>, paid: Arc<dyn PaymentStrategy>) -> Self {
        Self { free_call, paid }
    }
}

#[async_trait]
impl PaymentStrategy for DefaultPaymentStrategy {
    async fn decide(&self, ctx: &CallContext) -> Result<Payment, PaymentError> {
        let payment = self.free_call.decide(ctx).await?;
        if payment.is_valid() {
            return Ok(payment);
        }
        debug!(service_id = %ctx.service_id, "free call unavailable, falling back to channel payment");
        self.paid.decide(ctx).await
    }

    async fn shutdown(&self) {
        self.free_call.shutdown().await;
        self.paid.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LedgerError, StaticMetadataProvider, INVALID_PAYMENT};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        payment: Payment,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(payment: Payment) -> Arc<Self> {
            Arc::new(Self {
                payment,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PaymentStrategy for Fixed {
        async fn decide(&self, _ctx: &CallContext) -> Result<Payment, PaymentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.payment.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl PaymentStrategy for Failing {
        async fn decide(&self, _ctx: &CallContext) -> Result<Payment, PaymentError> {
            Err(PaymentError::ChannelMutation(LedgerError::Rejected(
                "nonce too low".to_string(),
            )))
        }
    }

    fn ctx() -> CallContext {
        CallContext::new("org", "service", "default_group", Arc::new(StaticMetadataProvider::new()))
    }

    fn sample_payment() -> Payment {
        Payment::Channel(crate::types::ChannelPayment {
            channel_id: 1.into(),
            amount: 10.into(),
            nonce: 0.into(),
            signature: ethers::types::Signature {
                r: 1.into(),
                s: 1.into(),
                v: 27,
            },
        })
    }

    #[tokio::test]
    async fn test_valid_free_call_skips_channel() {
        let free = Fixed::new(sample_payment());
        let paid = Fixed::new(INVALID_PAYMENT);
        let strategy = DefaultPaymentStrategy::new(free.clone(), paid.clone());

        assert_eq!(strategy.decide(&ctx()).await.unwrap(), sample_payment());
        assert_eq!(paid.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_declined_free_call_falls_back() {
        let free = Fixed::new(INVALID_PAYMENT);
        let paid = Fixed::new(sample_payment());
        let strategy = DefaultPaymentStrategy::new(free.clone(), paid.clone());

        assert_eq!(strategy.decide(&ctx()).await.unwrap(), sample_payment());
        assert_eq!(free.calls.load(Ordering::SeqCst), 1);
        assert_eq!(paid.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_free_call_error_is_not_masked() {
        let paid = Fixed::new(sample_payment());
        let strategy = DefaultPaymentStrategy::new(Arc::new(Failing), paid.clone());

        assert!(matches!(
            strategy.decide(&ctx()).await,
            Err(PaymentError::ChannelMutation(_))
        ));
        assert_eq!(paid.calls.load(Ordering::SeqCst), 0);
    }
}
