pub mod sqlite;

pub use sqlite::{RunRecord, Storage};
