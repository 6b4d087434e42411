/// Configuration shared by the cache facades
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketDataConfig {
    /// Depth levels requested from the snapshot source for diff-stream books
    pub snapshot_depth: u32,
    /// Maximum depth updates to buffer while waiting for a snapshot
    pub max_buffer_size: usize,
    /// Capacity of each facade's event queue and notification channels
    pub event_channel_capacity: usize,
}

impl MarketDataConfig {
    pub fn new() -> Self {
        MarketDataConfig {
            snapshot_depth: 1000,
            max_buffer_size: 1000,
            event_channel_capacity: 4096,
        }
    }

    pub fn with_snapshot_depth(mut self, depth: u32) -> Self {
        self.snapshot_depth = depth;
        self
    }

    pub fn with_max_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = size;
        self
    }

    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Endpoints of the venue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub rest_url: String,
    pub ws_url: String,
    pub api_key: String,
}

impl ConnectionConfig {
    pub fn new(rest_url: String, ws_url: String, api_key: String) -> Self {
        ConnectionConfig {
            rest_url,
            ws_url,
            api_key,
        }
    }
}
