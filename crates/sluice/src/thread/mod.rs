mod pool;
mod results;
mod signal;
mod worker;

pub use pool::*;
pub use results::*;
