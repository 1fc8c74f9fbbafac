pub mod repo;
pub mod issue;
pub mod estimation;

pub use repo::*;
pub use issue::*;
pub use estimation::*;
