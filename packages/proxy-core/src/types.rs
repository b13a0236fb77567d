//! Capability record model: `KeyRecord`, `Endpoint`, and the client-facing
//! declaration types accepted by `/addKey`.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Policy governing when a key's expiry clock starts ticking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitiateExpire {
    Creation,
    Get,
    Put,
    Mkcol,
    Never,
}

impl InitiateExpire {
    /// `Never` is represented in storage by the maximum 64-bit signed delta.
    pub const NEVER_DELTA: i64 = i64::MAX;

    /// The wire/column spelling used by JSON bodies and the `initiate_expire`
    /// scalar column (`database.BuildDB`'s schema stores this as text).
    pub fn as_str(self) -> &'static str {
        match self {
            InitiateExpire::Creation => "Creation",
            InitiateExpire::Get => "Get",
            InitiateExpire::Put => "Put",
            InitiateExpire::Mkcol => "Mkcol",
            InitiateExpire::Never => "Never",
        }
    }

    pub fn from_str_name(raw: &str) -> Option<Self> {
        Some(match raw {
            "Creation" => InitiateExpire::Creation,
            "Get" => InitiateExpire::Get,
            "Put" => InitiateExpire::Put,
            "Mkcol" => InitiateExpire::Mkcol,
            "Never" => InitiateExpire::Never,
            _ => return None,
        })
    }
}

/// A named access context inside a key: an upstream path prefix bound to
/// method permissions, usage counters with maxima, a body-size cap, and a
/// MIME allow-list.
///
/// Twelve permission flags are carried here, matching the record this type
/// is modeled on: `Copy, Del, Get, Head, Lock, Mkcol, Options, Post,
/// Propfind, Put, Trace, Unlock`. There is no `Move` flag — `Method::Move`
/// is a routable method with no corresponding permission field, so it is
/// never permitted (see `proxy_core::algebra::permission_flag`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub path: String,

    #[serde(default)]
    pub copy: bool,
    #[serde(default)]
    pub del: bool,
    #[serde(default)]
    pub get: bool,
    #[serde(default)]
    pub head: bool,
    #[serde(default)]
    pub lock: bool,
    #[serde(default)]
    pub mkcol: bool,
    #[serde(default)]
    pub options: bool,
    #[serde(default)]
    pub post: bool,
    #[serde(default)]
    pub propfind: bool,
    #[serde(default)]
    pub put: bool,
    #[serde(default)]
    pub trace: bool,
    #[serde(default)]
    pub unlock: bool,

    pub get_count: i64,
    pub max_get: i64,
    pub put_count: i64,
    pub max_put: i64,
    pub mkcol_count: i64,
    pub max_mkcol: i64,

    pub max_put_size: i64,
    pub put_types: BTreeSet<String>,
}

impl Endpoint {
    /// The `{"any"}` sentinel meaning "unrestricted MIME".
    pub fn is_any_type(&self) -> bool {
        self.put_types.len() == 1 && self.put_types.contains("any")
    }
}

/// The full stored record under one opaque secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub key_value: String,
    pub can_create_child: bool,
    pub endpoints: BTreeMap<String, Endpoint>,
    pub initiate_expire: InitiateExpire,
    pub expire_delta: i64,
    pub expire_started: bool,
    pub expire_start_time: i64,
}

impl KeyRecord {
    /// Whether the key is expired at `now` (milliseconds since the epoch).
    ///
    /// See [`crate::expiry`] for the policy this wraps.
    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        crate::expiry::is_expired(self.expire_started, self.expire_start_time, self.expire_delta, now_millis)
    }
}

/// The client-declared shape of an endpoint in a `/addKey` request body.
///
/// Paths here are relative: the first path segment names a parent endpoint,
/// and the remainder is joined onto that endpoint's absolute path by
/// [`crate::algebra::validate_child`]. Unset numeric/MIME fields fall back to
/// effectively-unlimited defaults, matching the permissive defaults of the
/// system this type mirrors.
#[derive(Debug, Clone, Deserialize)]
pub struct ChildEndpointDeclaration {
    #[serde(rename = "Path")]
    pub path: String,

    #[serde(rename = "Copy", default)]
    pub copy: bool,
    #[serde(rename = "Del", default)]
    pub del: bool,
    #[serde(rename = "Get", default)]
    pub get: bool,
    #[serde(rename = "Head", default)]
    pub head: bool,
    #[serde(rename = "Lock", default)]
    pub lock: bool,
    #[serde(rename = "Mkcol", default)]
    pub mkcol: bool,
    #[serde(rename = "Options", default)]
    pub options: bool,
    #[serde(rename = "Post", default)]
    pub post: bool,
    #[serde(rename = "Propfind", default)]
    pub propfind: bool,
    #[serde(rename = "Put", default)]
    pub put: bool,
    #[serde(rename = "Trace", default)]
    pub trace: bool,
    #[serde(rename = "Unlock", default)]
    pub unlock: bool,

    #[serde(rename = "MaxGet")]
    pub max_get: Option<i64>,
    #[serde(rename = "MaxPut")]
    pub max_put: Option<i64>,
    #[serde(rename = "MaxMkcol")]
    pub max_mkcol: Option<i64>,
    #[serde(rename = "MaxPutSize")]
    pub max_put_size: Option<i64>,
    #[serde(rename = "PutTypes")]
    pub put_types: Option<BTreeSet<String>>,
}

/// The client-declared shape of a whole `/addKey` request body.
#[derive(Debug, Clone, Deserialize)]
pub struct ChildKeyDeclaration {
    #[serde(rename = "CanCreateChild", default)]
    pub can_create_child: bool,
    #[serde(rename = "Endpoints")]
    pub endpoints: BTreeMap<String, ChildEndpointDeclaration>,
    #[serde(rename = "InitiateExpire", default = "default_initiate_expire")]
    pub initiate_expire: InitiateExpire,
    #[serde(rename = "ExpireDelta", default = "default_expire_delta")]
    pub expire_delta: i64,
}

fn default_initiate_expire() -> InitiateExpire {
    InitiateExpire::Creation
}

/// One hour, in milliseconds — the default lifetime when a declaration omits
/// `ExpireDelta`.
fn default_expire_delta() -> i64 {
    3_600_000
}
