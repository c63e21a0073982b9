mod token_family_store_mysql;

pub use token_family_store_mysql::*;
