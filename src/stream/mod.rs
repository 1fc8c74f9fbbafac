pub mod event;
pub mod channel;

pub use event::ProgressEvent;
pub use channel::{progress_channel, ProgressSender, ProgressStream, DEFAULT_CAPACITY};
