#![deny(missing_docs)]
#![doc = "Shared primitives for the camp experiment campaign engine: structured errors, canonical serde, stable hashing and seed derivation."]

pub mod errors;
pub mod hash;
pub mod provenance;
pub mod rng;
/// Canonical JSON and YAML helpers.
pub mod serde;

pub use errors::{CampError, ErrorInfo};
pub use hash::{bytes_hash_string, stable_hash_string};
pub use provenance::{Provenance, SchemaVersion};
pub use rng::{derive_substream_seed, SeedPolicy};
