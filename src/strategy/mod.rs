//! Per-call payment decisions.
//!
//! A [`PaymentStrategy`] turns a [`CallContext`] into a signed [`Payment`].
//! "Cannot pay" business outcomes (no free calls left, nothing configured)
//! come back as [`INVALID_PAYMENT`](crate::types::INVALID_PAYMENT); errors
//! are reserved for infrastructure and signing failures.

pub mod fallback;
pub mod free_call;
pub mod on_demand;

use crate::types::{EndpointGroup, MetadataProvider, Payment, PaymentError};
use async_trait::async_trait;
use std::{fmt, sync::Arc};

pub use fallback::DefaultPaymentStrategy;
pub use free_call::FreeCallStrategy;
pub use on_demand::OnDemandChannelStrategy;

/// Service and method an outbound call is made against.
#[derive(Clone)]
pub struct CallContext {
    pub org_id: String,
    pub service_id: String,
    pub endpoint_group: String,
    pub method: String,
    pub metadata: Arc<dyn MetadataProvider>,
}

impl CallContext {
    pub fn new(
        org_id: impl Into<String>,
        service_id: impl Into<String>,
        endpoint_group: impl Into<String>,
        metadata: Arc<dyn MetadataProvider>,
    ) -> Self {
        Self {
            org_id: org_id.into(),
            service_id: service_id.into(),
            endpoint_group: endpoint_group.into(),
            method: String::new(),
            metadata,
        }
    }

    pub fn for_method(&self, method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            ..self.clone()
        }
    }

    pub fn resolve_endpoint_group(&self) -> Option<EndpointGroup> {
        self.metadata.endpoint_group(&self.endpoint_group)
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("org_id", &self.org_id)
            .field("service_id", &self.service_id)
            .field("endpoint_group", &self.endpoint_group)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait PaymentStrategy: Send + Sync {
    async fn decide(&self, ctx: &CallContext) -> Result<Payment, PaymentError>;

    /// Release state owned by the strategy when its client shuts down.
    async fn shutdown(&self) {}
}
