mod pool;
mod stream;
mod worker;

pub use pool::*;
pub use stream::*;
