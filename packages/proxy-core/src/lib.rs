//! Capability record model and pure capability algebra for the authorizing
//! file proxy.
//!
//! This crate has no I/O dependencies: every type and function here is a
//! plain data structure or a pure function over one. The service crate
//! (`proxy-server`) owns the key store, the HTTP surface, and the proxy
//! engine; this crate owns the rules those layers enforce.
//!
//! - **Types** ([`types`]): `KeyRecord`, `Endpoint`, `InitiateExpire`
//! - **Method** ([`method`]): the WebDAV-ish `Method` enum and its wire mapping
//! - **Algebra** ([`algebra`]): path containment, MIME inclusion, dominance,
//!   child validation, and descendant enumeration
//! - **Expiry** ([`expiry`]): the lazy expiry-clock policy
//! - **Mime** ([`mime`]): the fixed allow-list checked against `PutTypes`
//! - **Keygen** ([`keygen`]): random key-secret generation
//! - **Error** ([`error`]): `CoreError`, the rejection type for algebra ops

pub mod algebra;
pub mod error;
pub mod expiry;
pub mod keygen;
pub mod method;
pub mod mime;
pub mod types;

pub use error::CoreError;
pub use method::Method;
pub use types::{Endpoint, InitiateExpire, KeyRecord};
