// in-process adapters

mod rate_counter_store_memory;
mod token_family_store_memory;

pub use rate_counter_store_memory::*;
pub use token_family_store_memory::*;
