pub mod adapter;
pub mod types;

pub use adapter::{CoinbaseAdapter, COINBASE_BASE_URL};
