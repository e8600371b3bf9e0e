//! Outbound service calls: decide a payment, attach it, dispatch, classify.

pub mod classify;

use crate::config::{ClientConfig, ConfigError};
use crate::middleware::payment_metadata;
use crate::strategy::{CallContext, PaymentStrategy};
use crate::types::{CallError, MetadataProvider};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub use classify::{classify, CallFailureClassifier, CallStatus, FailureCategory};

pub const GRPC_STATUS: &str = "grpc-status";
pub const GRPC_MESSAGE: &str = "grpc-message";

/// Client for one service, paying for each call through its strategy.
///
/// The client owns the strategy's lifetime: [`ServiceClient::shutdown`]
/// cancels in-flight calls and releases the strategy's channel state.
pub struct ServiceClient {
    http: reqwest::Client,
    endpoint: String,
    context: CallContext,
    strategy: Arc<dyn PaymentStrategy>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ServiceClient {
    pub fn new(
        config: ClientConfig,
        metadata: Arc<dyn MetadataProvider>,
        strategy: Arc<dyn PaymentStrategy>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            context: CallContext::new(
                config.org_id,
                config.service_id,
                config.endpoint_group,
                metadata,
            ),
            strategy,
            shutdown_tx,
            shutdown_rx,
        })
    }

    pub fn context(&self) -> &CallContext {
        &self.context
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Pay for and perform `method`, returning the raw response body.
    pub async fn call(&self, method: &str, body: Vec<u8>) -> Result<Vec<u8>, CallError> {
        let mut shutdown = self.shutdown_rx.clone();
        if *shutdown.borrow() {
            return Err(CallError::Cancelled);
        }

        tokio::select! {
            result = self.dispatch(method, body) => result,
            _ = shutdown.changed() => {
                info!(method, "call cancelled by client shutdown");
                Err(CallError::Cancelled)
            }
        }
    }

    /// Cancel in-flight calls and tear down the strategy's state.
    pub async fn shutdown(&self) {
        if self.shutdown_tx.send_replace(true) {
            return;
        }
        info!(service_id = %self.context.service_id, "shutting down service client");
        self.strategy.shutdown().await;
    }

    async fn dispatch(&self, method: &str, body: Vec<u8>) -> Result<Vec<u8>, CallError> {
        let ctx = self.context.for_method(method);
        let payment = self.strategy.decide(&ctx).await?;
        if !payment.is_valid() {
            debug!(method, "no payment authorized, call not attempted");
            return Err(CallError::PaymentDeclined);
        }

        let url = format!("{}/{}", self.endpoint, method);
        let mut request = self.http.post(&url).body(body);
        for (name, value) in payment_metadata(&payment)? {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(transport_failure)?;
        let http_status = response.status();
        let grpc_status = response
            .headers()
            .get(GRPC_STATUS)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<i32>().ok())
            .map(CallStatus::from_code);
        let status = grpc_status.unwrap_or_else(|| CallStatus::from(http_status));

        if status == CallStatus::Ok {
            let bytes = response.bytes().await.map_err(transport_failure)?;
            return Ok(bytes.to_vec());
        }

        let grpc_message = response
            .headers()
            .get(GRPC_MESSAGE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let message = match grpc_message {
            Some(message) => message,
            None => response.text().await.unwrap_or_default(),
        };
        let category = classify(status);
        warn!(
            method,
            status = %status,
            grpc_code = status.code(),
            http_status = http_status.as_u16(),
            category = ?category,
            retryable = category.is_transient(),
            "service call failed"
        );

        Err(CallError::Remote {
            status,
            category,
            message,
        })
    }
}

fn transport_failure(error: reqwest::Error) -> CallError {
    let status = if error.is_timeout() {
        CallStatus::DeadlineExceeded
    } else if error.is_connect() {
        CallStatus::Unavailable
    } else {
        CallStatus::Unknown
    };
    warn!(
        status = %status,
        grpc_code = status.code(),
        error = %error,
        "service call transport failure"
    );

    CallError::Remote {
        status,
        category: classify(status),
        message: error.to_string(),
    }
}
