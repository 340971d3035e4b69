//! Path pricers, one per instrument family.

mod average_price;
mod barrier;
mod european;
mod lookback;

pub use average_price::AveragePricePathPricer;
pub use barrier::BarrierPathPricer;
pub use european::EuropeanPathPricer;
pub use lookback::LookbackPathPricer;
