mod codec;
mod rate_limiter;
mod session_service_impl;

pub use codec::*;
pub use rate_limiter::*;
pub use session_service_impl::*;
