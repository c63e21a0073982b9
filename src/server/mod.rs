mod reaper;
mod server;

pub use reaper::*;
pub use server::*;
