pub mod history;

pub use history::{history_text, HistoryBars};
