pub mod alert;
pub mod cursor;
pub mod event;
pub mod outage;
pub mod reader;

pub use cursor::{Cursor, PositionStore, EVENT_SOURCE};
pub use event::{EventBatch, NormalizedEvent, StatusEvent, StreamEvent};
pub use outage::OutageSignals;
pub use reader::{
    FetchOutcome, ReaderPacing, ReaderState, StreamError, StreamExit, StreamHandle, StreamReader,
};
