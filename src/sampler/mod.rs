//! Spot termination sampling
//!
//! One metadata request per scrape, translated into gauge values.

mod termination;
mod transport;

#[cfg(test)]
mod mock;

pub use termination::*;
pub use transport::*;
