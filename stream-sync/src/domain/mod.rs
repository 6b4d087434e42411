pub mod error;
pub mod events;
pub mod stream_name;
pub mod sync_status;
pub mod traits;

pub use error::{CallbackError, DecodeError, SubscribeError};
pub use events::{
    AggregateTradeEvent, CandlestickEvent, DepthUpdateEvent, OutOfSync, StreamEvent, TradeEvent,
};
pub use sync_status::SyncStatus;
pub use traits::{DepthFetcher, EventDecoder, FetchError, MessageSink, TradeFetcher};
