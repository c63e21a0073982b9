mod identity_provider;
mod session_service;
mod token_codec;

pub use identity_provider::*;
pub use session_service::*;
pub use token_codec::*;
