//! Service wiring.

mod container;

pub use container::{Container, Providers};
