pub mod action;
pub mod sink;

pub use action::{Action, NotifyLevel};
pub use sink::{DisplaySink, RecordingSink, SinkEvent};
