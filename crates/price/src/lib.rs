//! Refvest Price
//!
//! Resolves the reward token's USD price from an ordered list of quote
//! providers, falling back to a configured constant when every provider
//! fails. Resolution never errors: an unpriced batch must still credit.

pub mod provider;
pub mod resolver;

pub use provider::{DexScreenerProvider, JupiterProvider, QuoteProvider};
pub use resolver::PriceResolver;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PriceError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("no quote for the reward token in the response")]
    MissingQuote,
    #[error("quote is not a positive number: {0}")]
    InvalidQuote(f64),
}
