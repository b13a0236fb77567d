//! The fixed MIME allow-list validated against a declared `PutTypes` set at
//! child-creation time. Every value other than the `"any"` sentinel must be a
//! member of this list.

/// MIME types a child endpoint may declare in `PutTypes`, beyond the `"any"`
/// sentinel. Mirrors the allow-list the system this crate is modeled on
/// checks `PutTypes` entries against when a child key is minted.
pub const KNOWN_MIME_TYPES: &[&str] = &[
    "text/plain",
    "text/html",
    "text/css",
    "text/csv",
    "application/json",
    "application/xml",
    "application/pdf",
    "application/zip",
    "application/octet-stream",
    "image/png",
    "image/jpeg",
    "image/gif",
    "image/webp",
    "image/svg+xml",
    "audio/mpeg",
    "audio/wav",
    "video/mp4",
    "video/webm",
];

/// `true` if `candidate` is either the `"any"` sentinel or a member of
/// [`KNOWN_MIME_TYPES`].
pub fn is_known_or_any(candidate: &str) -> bool {
    candidate == "any" || KNOWN_MIME_TYPES.contains(&candidate)
}
