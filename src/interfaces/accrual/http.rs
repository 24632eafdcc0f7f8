use super::wire::AccrualBody;
use crate::domain::checksum::OrderNumber;
use crate::domain::money::Points;
use crate::domain::order::OrderStatus;
use crate::domain::ports::{AccrualClient, AccrualResponse};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

/// Queries the accrual service over HTTP.
///
/// Every request is bounded by the client timeout; expiry surfaces as
/// [`AccrualResponse::TransportError`] like any other network failure.
#[derive(Clone)]
pub struct HttpAccrualClient {
    client: Client,
    base_url: String,
}

impl HttpAccrualClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(LedgerError::Config(
                "accrual service address not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    fn order_url(&self, number: &OrderNumber) -> String {
        format!("{}/api/orders/{}", self.base_url, number)
    }
}

fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[async_trait]
impl AccrualClient for HttpAccrualClient {
    async fn fetch(&self, number: &OrderNumber) -> AccrualResponse {
        let response = match self.client.get(self.order_url(number)).send().await {
            Ok(response) => response,
            Err(e) => return AccrualResponse::TransportError(e.to_string()),
        };

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NO_CONTENT => return AccrualResponse::NotFound,
            StatusCode::TOO_MANY_REQUESTS => {
                return AccrualResponse::RateLimited {
                    retry_after: retry_after(&response),
                };
            }
            status => {
                return AccrualResponse::TransportError(format!(
                    "unexpected status {status} for order {number}"
                ));
            }
        }

        let body: AccrualBody = match response.json().await {
            Ok(body) => body,
            Err(e) => return AccrualResponse::TransportError(format!("bad response body: {e}")),
        };

        if body.order != number.as_str() {
            warn!(
                requested = %number,
                returned = %body.order,
                "Accrual service answered for a different order"
            );
            return AccrualResponse::TransportError(format!(
                "response names order {} instead of {number}",
                body.order
            ));
        }

        let status = OrderStatus::from(body.status);
        let amount = match status {
            OrderStatus::Processed => body.accrual.unwrap_or(Points::ZERO),
            _ => Points::ZERO,
        };
        if amount < Points::ZERO {
            return AccrualResponse::TransportError(format!(
                "negative accrual {amount} for order {number}"
            ));
        }

        debug!(order = %number, %status, %amount, "Accrual status received");
        AccrualResponse::Resolved { status, amount }
    }
}
