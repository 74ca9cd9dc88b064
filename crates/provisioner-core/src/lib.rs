#![doc = include_str!("../README.md")]

mod address;
mod config;
mod dispatch;
mod error;
mod generator;
mod lifecycle;
mod pool;
mod round;
mod service;
mod store;
mod types;

#[cfg(test)]
mod test_support;

pub use crate::address::*;
pub use crate::config::*;
pub use crate::dispatch::*;
pub use crate::error::*;
pub use crate::generator::*;
pub use crate::lifecycle::*;
pub use crate::pool::*;
pub use crate::round::*;
pub use crate::service::*;
pub use crate::store::*;
pub use crate::types::*;
