//! Service discovery using mDNS/DNS-SD
//!
//! Advertises the bridge on the local network so controllers can find it
//! and tell whether it still accepts pair-setup

pub mod mdns;

pub use mdns::HapAdvertiser;
