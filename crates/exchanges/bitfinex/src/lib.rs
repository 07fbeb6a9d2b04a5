pub mod adapter;
pub mod types;

pub use adapter::{BitfinexAdapter, BITFINEX_BASE_URL};
