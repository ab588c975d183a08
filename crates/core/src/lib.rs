#![forbid(unsafe_code)]

pub mod evaluator;
pub mod model;
pub mod time;

pub use evaluator::evaluate;
pub use time::Clock;
