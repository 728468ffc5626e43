pub mod candle;
pub mod clock;
pub mod signals;

pub use candle::*;
pub use clock::*;
pub use signals::*;
