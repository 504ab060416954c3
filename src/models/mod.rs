pub mod expectation;
pub mod outcome;
pub mod state;

pub use expectation::*;
pub use outcome::*;
pub use state::*;
