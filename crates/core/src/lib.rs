#![forbid(unsafe_code)]

pub mod aggregator;
pub mod answer;
pub mod due;
pub mod error;
pub mod model;
pub mod progress;
pub mod scheduler;
pub mod time;

pub use error::Error;
pub use time::Clock;
