//! Off-chain access to the dice program.
//!
//! A [`ProviderConfig`] names the cluster and the paying wallet; it is built
//! once (from literals or from the Anchor provider environment variables) and
//! handed to [`DiceClient`], which sends one transaction per call and returns
//! its signature.

pub mod client;
pub mod config;
pub mod error;

pub use client::DiceClient;
pub use config::ProviderConfig;
pub use error::{ClientError, Result};
