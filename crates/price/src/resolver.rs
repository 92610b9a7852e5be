//! Price resolution with ordered fallback.

use std::time::Duration;

use reqwest::Client;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::provider::QuoteProvider;

/// Resolves one price snapshot per ingestion batch.
///
/// Providers are tried in order with a per-provider timeout; the first
/// finite, strictly positive quote wins. When every source fails the
/// configured fallback is returned - degraded pricing is logged, never
/// surfaced as an error.
pub struct PriceResolver {
    client: Client,
    providers: Vec<Box<dyn QuoteProvider>>,
    fallback_price: f64,
    provider_timeout: Duration,
}

impl PriceResolver {
    pub fn new(
        providers: Vec<Box<dyn QuoteProvider>>,
        fallback_price: f64,
        provider_timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(provider_timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            providers,
            fallback_price,
            provider_timeout,
        }
    }

    /// Resolve the current price. Never fails.
    pub async fn resolve(&self) -> f64 {
        for provider in &self.providers {
            match timeout(self.provider_timeout, provider.fetch(&self.client)).await {
                Err(_) => {
                    warn!(provider = provider.name(), "quote timed out");
                }
                Ok(Err(e)) => {
                    warn!(provider = provider.name(), error = %e, "quote failed");
                }
                Ok(Ok(price)) if price.is_finite() && price > 0.0 => {
                    debug!(provider = provider.name(), price, "quote resolved");
                    return price;
                }
                Ok(Ok(price)) => {
                    warn!(provider = provider.name(), price, "rejecting non-positive quote");
                }
            }
        }
        warn!(
            fallback = self.fallback_price,
            "all quote providers failed, using fallback price"
        );
        self.fallback_price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PriceError;

    struct StaticProvider {
        name: &'static str,
        result: Result<f64, ()>,
    }

    #[async_trait::async_trait]
    impl QuoteProvider for StaticProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self, _client: &Client) -> Result<f64, PriceError> {
            match self.result {
                Ok(p) => Ok(p),
                Err(()) => Err(PriceError::MissingQuote),
            }
        }
    }

    struct HangingProvider;

    #[async_trait::async_trait]
    impl QuoteProvider for HangingProvider {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn fetch(&self, _client: &Client) -> Result<f64, PriceError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(1.0)
        }
    }

    fn resolver(providers: Vec<Box<dyn QuoteProvider>>) -> PriceResolver {
        PriceResolver::new(providers, 0.002, Duration::from_millis(50))
    }

    #[tokio::test]
    async fn first_healthy_provider_wins() {
        let r = resolver(vec![
            Box::new(StaticProvider {
                name: "a",
                result: Err(()),
            }),
            Box::new(StaticProvider {
                name: "b",
                result: Ok(1.5),
            }),
            Box::new(StaticProvider {
                name: "c",
                result: Ok(9.9),
            }),
        ]);
        assert_eq!(r.resolve().await, 1.5);
    }

    #[tokio::test]
    async fn fallback_when_all_fail() {
        let r = resolver(vec![
            Box::new(StaticProvider {
                name: "a",
                result: Err(()),
            }),
            Box::new(StaticProvider {
                name: "b",
                result: Err(()),
            }),
        ]);
        assert_eq!(r.resolve().await, 0.002);
    }

    #[tokio::test]
    async fn fallback_with_no_providers() {
        let r = resolver(vec![]);
        assert_eq!(r.resolve().await, 0.002);
    }

    #[tokio::test]
    async fn non_positive_quote_falls_through() {
        let r = resolver(vec![
            Box::new(StaticProvider {
                name: "a",
                result: Ok(-1.0),
            }),
            Box::new(StaticProvider {
                name: "b",
                result: Ok(2.0),
            }),
        ]);
        assert_eq!(r.resolve().await, 2.0);
    }

    #[tokio::test]
    async fn timeout_falls_through() {
        let r = resolver(vec![
            Box::new(HangingProvider),
            Box::new(StaticProvider {
                name: "b",
                result: Ok(0.8),
            }),
        ]);
        assert_eq!(r.resolve().await, 0.8);
    }
}
