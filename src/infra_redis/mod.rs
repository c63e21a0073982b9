mod rate_counter_store_redis;
mod token_family_store_redis;

pub use rate_counter_store_redis::*;
pub use token_family_store_redis::*;
