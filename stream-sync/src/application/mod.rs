pub mod cache;
pub mod config;
pub mod registry;
pub mod stream_client;
pub mod sync;

pub use cache::{AggregateTradeCache, OrderBookCache, TradeCache, TradeWindowCache};
pub use config::{ConnectionConfig, MarketDataConfig};
pub use registry::{Callback, SubscriptionId, SubscriptionRegistry, callback};
pub use stream_client::StreamClient;
pub use sync::{DepthSynchronizer, TradeWindow};
