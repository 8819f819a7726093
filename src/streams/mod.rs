//! Price stream sources

mod feed;

pub use feed::{spawn_simulated_feed, FeedEvent, SimFeedConfig};
