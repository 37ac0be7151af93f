//! ListPricesHandler - Query handler for the purchasable membership tiers.

use std::sync::Arc;

use crate::domain::membership::MembershipError;
use crate::ports::{PaymentGateway, Price};

/// Query to list the membership tiers on offer.
#[derive(Debug, Clone, Default)]
pub struct ListPricesQuery;

/// Prices that map to a membership tier, in gateway order.
#[derive(Debug, Clone)]
pub struct ListPricesResult {
    pub prices: Vec<Price>,
}

/// Handler for listing prices.
///
/// Prices without a lookup key belong to other products on the gateway
/// account and are left out.
pub struct ListPricesHandler {
    gateway: Arc<dyn PaymentGateway>,
}

impl ListPricesHandler {
    pub fn new(gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { gateway }
    }

    pub async fn handle(&self, _query: ListPricesQuery) -> Result<ListPricesResult, MembershipError> {
        let prices = self
            .gateway
            .list_prices()
            .await?
            .into_iter()
            .filter(Price::is_membership_tier)
            .collect();

        Ok(ListPricesResult { prices })
    }
}
