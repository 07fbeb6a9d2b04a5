pub mod provider;
pub mod rest;
pub mod retry;

pub use provider::CandlestickProvider;
pub use rest::{RestClient, RestResponse};
pub use retry::{backoff_delay, request_with_retries, RetryConfig};

// Venue adapters classify HTTP statuses without depending on reqwest directly.
pub use reqwest::StatusCode;
