//! Controller pairings, bridge identity, and the unauthenticated-access gate

pub mod gate;
pub mod identity;
pub mod pairing;

pub use gate::AuthGate;
pub use identity::BridgeIdentity;
pub use pairing::{PairingRecord, PairingStore, SqlitePairingStore};
