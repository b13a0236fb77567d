//! The WebDAV-ish method set and its wire-contract mapping.

use std::fmt;

/// A method routable through `/files/*`.
///
/// `Del` is the internal spelling of the permission checked for an inbound
/// HTTP `DELETE` — the wire name and the field name diverge on purpose and
/// callers must not "fix" it (see the module docs on [`crate::types::Endpoint`]).
///
/// `Move` is dispatched like any other method but has no corresponding
/// permission flag on [`crate::types::Endpoint`]; [`crate::algebra::permission_flag`]
/// always returns `None` for it, so a Move request is never permitted. This
/// mirrors the record this type is modeled on, which never carries a `Move`
/// field either — preserved here rather than silently given a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Copy,
    Del,
    Get,
    Head,
    Lock,
    Mkcol,
    Move,
    Options,
    Post,
    Propfind,
    Put,
    Trace,
    Unlock,
}

impl Method {
    /// The HTTP method name as it appears on the wire.
    pub fn as_http_method(self) -> &'static str {
        match self {
            Method::Copy => "COPY",
            Method::Del => "DELETE",
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Lock => "LOCK",
            Method::Mkcol => "MKCOL",
            Method::Move => "MOVE",
            Method::Options => "OPTIONS",
            Method::Post => "POST",
            Method::Propfind => "PROPFIND",
            Method::Put => "PUT",
            Method::Trace => "TRACE",
            Method::Unlock => "UNLOCK",
        }
    }

    /// Parses the HTTP method name on an inbound request. Case-insensitive.
    /// `DELETE` maps to [`Method::Del`] — the one wire/field spelling split.
    pub fn from_http_method(raw: &str) -> Option<Self> {
        Some(match raw.to_ascii_uppercase().as_str() {
            "COPY" => Method::Copy,
            "DELETE" => Method::Del,
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "LOCK" => Method::Lock,
            "MKCOL" => Method::Mkcol,
            "MOVE" => Method::Move,
            "OPTIONS" => Method::Options,
            "POST" => Method::Post,
            "PROPFIND" => Method::Propfind,
            "PUT" => Method::Put,
            "TRACE" => Method::Trace,
            "UNLOCK" => Method::Unlock,
            _ => return None,
        })
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_http_method())
    }
}
