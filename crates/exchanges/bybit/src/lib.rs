pub mod adapter;
pub mod types;

pub use adapter::{BybitAdapter, BYBIT_BASE_URL};
