//! Redirect handling: the pluggable strategy and the bounded loop that
//! applies it.

mod driver;
mod strategy;

pub use driver::RedirectDriver;
pub use strategy::{DefaultRedirectStrategy, RedirectStrategy};
