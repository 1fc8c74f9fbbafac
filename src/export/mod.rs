pub mod csv;

pub use self::csv::{from_csv, to_csv, CSV_HEADER};
