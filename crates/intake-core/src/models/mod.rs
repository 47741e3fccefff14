//! Domain types shared between stores, the scheduler, and the service layer.

mod availability;
mod intake;
mod order;

pub use availability::*;
pub use intake::*;
pub use order::*;
