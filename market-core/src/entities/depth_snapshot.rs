use super::PriceLevel;
use serde::{Deserialize, Serialize};

/// Point-in-time order book depth fetched from the snapshot source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthSnapshot {
    pub symbol: String,
    pub last_update_id: u64,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}
