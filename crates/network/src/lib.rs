// crates/network/src/lib.rs
//! HTTP plumbing for the sync engine
//!
//! Provides the REST-backed remote store and the connectivity probe that
//! drives the sync engine's network monitor.

mod client;
mod connectivity;
mod error;
mod rest;

pub use client::{parse_url, Client, ClientConfig};
pub use connectivity::{
    ConnectivityChecker, ConnectivityProbe, DEFAULT_PROBE_INTERVAL, DEFAULT_PROBE_URLS,
};
pub use error::{NetworkError, NetworkResult};
pub use rest::{kind_for_status, RestConfig, RestRemoteStore};
