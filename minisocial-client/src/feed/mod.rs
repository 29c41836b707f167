//! Post interactions and the live feed.

mod actions;
mod live;

pub use actions::{Action, ActionError, FeedActions};
pub use live::{FeedState, LiveFeed};
