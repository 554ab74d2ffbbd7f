pub mod cryptocompare;
pub mod market_data;

pub use cryptocompare::CryptoCompareClient;
pub use market_data::MarketDataSource;
