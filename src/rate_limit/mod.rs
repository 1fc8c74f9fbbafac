pub mod window;
pub mod limiter;

pub use window::{Window, WindowKind, WindowPolicy};
pub use limiter::{Admission, Denial, Quota, RateLimitConfig, RateLimiter};
