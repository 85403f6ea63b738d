//! Domain models for medication review.

mod interaction;
mod patient;
mod profile;
mod resolution;
mod review;

pub use interaction::*;
pub use patient::*;
pub use profile::*;
pub use resolution::*;
pub use review::*;
