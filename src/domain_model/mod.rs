mod challenge;
mod family;
mod rate;
mod subject;

pub use challenge::*;
pub use family::*;
pub use rate::*;
pub use subject::*;
