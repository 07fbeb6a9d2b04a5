pub mod adapter;
pub mod types;

pub use adapter::{BinanceAdapter, BINANCE_SPOT_BASE_URL, BINANCE_USDM_FUTURES_BASE_URL};
