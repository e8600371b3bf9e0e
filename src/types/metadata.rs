use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceModel {
    FixedPrice,
    FixedPricePerMethod { method: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingEntry {
    pub price_model: PriceModel,
    pub price_in_cogs: U256,
}

/// Set of endpoints that settle against one payment group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointGroup {
    pub group_name: String,
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub pricing: Vec<PricingEntry>,
    #[serde(default)]
    pub free_calls: u64,
    #[serde(default)]
    pub free_call_signer_address: Option<Address>,
    pub payment_group_id: H256,
}

impl EndpointGroup {
    /// Price of one call to `method`: a per-method entry wins over the fixed price.
    pub fn price_for(&self, method: &str) -> Option<U256> {
        let per_method = self.pricing.iter().find(|entry| {
            matches!(&entry.price_model, PriceModel::FixedPricePerMethod { method: m } if m == method)
        });
        per_method
            .or_else(|| {
                self.pricing
                    .iter()
                    .find(|entry| entry.price_model == PriceModel::FixedPrice)
            })
            .map(|entry| entry.price_in_cogs)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentGroup {
    pub group_id: H256,
    pub payment_address: Address,
    pub expiration_threshold: u64,
}

/// Read-only service and organization metadata.
pub trait MetadataProvider: Send + Sync {
    fn endpoint_group(&self, name: &str) -> Option<EndpointGroup>;
    fn payment_group(&self, group_id: &H256) -> Option<PaymentGroup>;
}

/// Metadata held in memory, e.g. loaded once from a JSON document.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StaticMetadataProvider {
    #[serde(default)]
    endpoint_groups: HashMap<String, EndpointGroup>,
    #[serde(default)]
    payment_groups: HashMap<H256, PaymentGroup>,
}

impl StaticMetadataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint_group(mut self, group: EndpointGroup) -> Self {
        self.endpoint_groups.insert(group.group_name.clone(), group);
        self
    }

    pub fn with_payment_group(mut self, group: PaymentGroup) -> Self {
        self.payment_groups.insert(group.group_id, group);
        self
    }
}

impl MetadataProvider for StaticMetadataProvider {
    fn endpoint_group(&self, name: &str) -> Option<EndpointGroup> {
        self.endpoint_groups.get(name).cloned()
    }

    fn payment_group(&self, group_id: &H256) -> Option<PaymentGroup> {
        self.payment_groups.get(group_id).cloned()
    }
}
