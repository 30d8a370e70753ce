pub mod stats;

pub use stats::{StatsHelper, MAD_SCALE};
