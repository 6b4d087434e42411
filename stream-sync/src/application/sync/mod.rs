pub mod depth;
pub mod trade_window;

pub use depth::{DeltaOutcome, DepthSynchronizer, ReplayError};
pub use trade_window::{Continuity, TradeWindow, TradeWindowSync};
