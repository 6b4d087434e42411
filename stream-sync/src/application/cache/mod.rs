pub mod order_book_cache;
pub mod trade_cache;

pub use order_book_cache::OrderBookCache;
pub use trade_cache::{
    AggregateTradeCache, AggregateTrades, TradeCache, TradeKind, TradeWindowCache, Trades,
};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use super::registry::{Callback, SubscriptionId, callback};
use crate::domain::CallbackError;

/// What a facade holds while subscribed
struct ActiveSubscription {
    symbol: String,
    stream: String,
    id: SubscriptionId,
    worker: CancellationToken,
}

/// Client callback feeding a facade's worker queue.
///
/// The dispatcher stays non-blocking: a full queue is reported as a
/// callback failure, a closed one as cancellation.
fn queue_callback<E>(tx: mpsc::Sender<E>) -> Callback<E>
where
    E: Clone + Send + Sync + 'static,
{
    callback(move |event: &E| match tx.try_send(event.clone()) {
        Ok(()) => Ok(()),
        Err(TrySendError::Full(_)) => Err(CallbackError::Failed("cache event queue full".into())),
        Err(TrySendError::Closed(_)) => Err(CallbackError::Cancelled),
    })
}
