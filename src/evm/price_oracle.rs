//! HTTP client for the upstream price oracle: `GET {base}/simple/price
//! ?ids={priceID}&vs_currencies=usd`.
//!
//! The base URL is injectable so tests can point it at a local server
//! (see DESIGN.md for the rationale).

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{FetchError, TransportError};
use crate::types::PriceId;

const T_PRICE: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct UsdPrice {
    usd: f64,
}

/// A thin `reqwest`-backed client for the price oracle.
#[derive(Debug, Clone)]
pub struct PriceOracleClient {
    http: reqwest::Client,
    base_url: url::Url,
}

impl PriceOracleClient {
    pub fn new(base_url: url::Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    /// Fetch the USD price for `price_id`.
    pub async fn fetch_price(&self, price_id: &PriceId) -> Result<f64, FetchError> {
        let mut url = self.base_url.clone();
        url.set_path(&format!("{}/simple/price", self.base_url.path().trim_end_matches('/')));
        url.query_pairs_mut()
            .append_pair("ids", price_id)
            .append_pair("vs_currencies", "usd");

        let send = self.http.get(url.clone()).send();
        let response = tokio::time::timeout(T_PRICE, send)
            .await
            .map_err(|_| {
                FetchError::Transport(TransportError::Timeout {
                    url: url.clone(),
                    elapsed_ms: T_PRICE.as_millis() as u64,
                })
            })?
            .map_err(|e| {
                FetchError::Transport(TransportError::Dial {
                    url: url.clone(),
                    reason: e.to_string(),
                })
            })?;

        if !response.status().is_success() {
            return Err(FetchError::Transport(TransportError::Http {
                url,
                status: response.status().as_u16(),
            }));
        }

        let body: HashMap<String, UsdPrice> = response.json().await.map_err(|e| {
            tracing::debug!(error = %e, "price oracle response did not match expected shape");
            FetchError::Transport(TransportError::Http {
                url: url.clone(),
                status: 0,
            })
        })?;

        body.get(price_id)
            .map(|p| p.usd)
            .ok_or_else(|| {
                FetchError::Protocol(crate::error::ProtocolError::UnexpectedResult {
                    method: "simple/price",
                    detail: format!("no entry for {price_id} in oracle response"),
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetch_price_parses_oracle_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/simple/price"))
            .and(query_param("ids", "ethereum"))
            .and(query_param("vs_currencies", "usd"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ethereum": {"usd": 2500.75}
            })))
            .mount(&server)
            .await;

        let client = PriceOracleClient::new(server.uri().parse().unwrap());
        let price = client.fetch_price(&"ethereum".to_string()).await.unwrap();
        assert_eq!(price, 2500.75);
    }

    #[tokio::test]
    async fn fetch_price_missing_id_is_a_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/simple/price"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let client = PriceOracleClient::new(server.uri().parse().unwrap());
        let err = client.fetch_price(&"ethereum".to_string()).await.unwrap_err();
        assert!(matches!(err, FetchError::Protocol(_)));
    }

    #[tokio::test]
    async fn fetch_price_propagates_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/simple/price"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = PriceOracleClient::new(server.uri().parse().unwrap());
        let err = client.fetch_price(&"ethereum".to_string()).await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::Transport(TransportError::Http { status: 503, .. })
        ));
    }
}
