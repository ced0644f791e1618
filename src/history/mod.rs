/// Per-unit reading history with a fixed-capacity rolling buffer
pub mod ring;
pub mod store;

pub use ring::{ReadingRing, HISTORY_CAPACITY};
pub use store::HistoryStore;
