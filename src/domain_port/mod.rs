// store

mod rate_counter_store;
mod token_family_store;

pub use rate_counter_store::*;
pub use token_family_store::*;
