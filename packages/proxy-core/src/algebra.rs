//! Pure functions over capability record snapshots: path-prefix containment,
//! MIME-set inclusion, point-wise dominance, child-key validation, and
//! descendant enumeration.
//!
//! Nothing here touches a clock or a store; callers pass in `now_millis` and
//! record snapshots explicitly, which is what makes every function in this
//! module directly unit-testable without mocks.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::CoreError;
use crate::expiry;
use crate::keygen;
use crate::method::Method;
use crate::mime;
use crate::types::{ChildKeyDeclaration, Endpoint, KeyRecord};

const DEFAULT_MAX_COUNT: i64 = 2_147_483_647;
const DEFAULT_MAX_PUT_SIZE: i64 = i64::MAX;

fn default_put_types() -> BTreeSet<String> {
    BTreeSet::from(["any".to_string()])
}

fn is_any_set(types: &BTreeSet<String>) -> bool {
    types.len() == 1 && types.contains("any")
}

/// `(suffix, bool)`: is `parent` a path prefix of `child`?
///
/// The `parent == "/"` case is special-cased to return the full `child`
/// string as the suffix rather than stripping the leading slash — this
/// matches the record this algebra is modeled on exactly and is load-bearing
/// for descendant-namespace reconstruction (see [`endpoint_namespace_path`]).
pub fn is_path_subset(parent: &str, child: &str) -> (String, bool) {
    if parent == "/" && child != "/" {
        return (child.to_string(), true);
    }
    let parent_segs: Vec<&str> = parent.split('/').collect();
    let child_segs: Vec<&str> = child.split('/').collect();
    if parent_segs.len() > child_segs.len() {
        return (String::new(), false);
    }
    for (p, c) in parent_segs.iter().zip(child_segs.iter()) {
        if p != c {
            return (String::new(), false);
        }
    }
    if parent_segs.len() == child_segs.len() {
        return (String::new(), true);
    }
    (child_segs[parent_segs.len()..].join("/"), true)
}

/// Builds the absolute child path from a parent's absolute path and a
/// declared relative tail (the remainder after the parent-endpoint-name
/// segment in a `/addKey` declaration).
fn join_parent_path(parent_path: &str, tail: &str) -> String {
    if parent_path == "/" {
        format!("/{tail}")
    } else if tail.is_empty() {
        parent_path.to_string()
    } else {
        format!("{parent_path}/{tail}")
    }
}

/// The descendant-namespace path quoted back to a parent caller: the
/// matching parent endpoint name, with the prefix-check suffix appended the
/// way [`is_path_subset`]'s two branches produce it (with, or without, its
/// own separating slash — see that function's doc comment).
fn endpoint_namespace_path(endpoint_name: &str, parent_path: &str, suffix: &str) -> String {
    if parent_path == "/" {
        format!("{endpoint_name}{suffix}")
    } else if suffix.is_empty() {
        endpoint_name.to_string()
    } else {
        format!("{endpoint_name}/{suffix}")
    }
}

/// MIME-set inclusion: `parent`'s `{"any"}` sentinel absorbs any child set;
/// otherwise every element of `child` must be in `parent`. A child declaring
/// `{"any"}` against a non-any parent is rejected (I3).
pub fn mime_subset(parent: &BTreeSet<String>, child: &BTreeSet<String>) -> bool {
    if is_any_set(parent) {
        return true;
    }
    if is_any_set(child) {
        return false;
    }
    child.iter().all(|t| parent.contains(t))
}

/// The permission flag for `method` on `endpoint`, or `None` if the method
/// has no corresponding flag (only [`Method::Move`] — see the module docs on
/// [`crate::types::Endpoint`]).
pub fn permission_flag(endpoint: &Endpoint, method: Method) -> Option<bool> {
    Some(match method {
        Method::Copy => endpoint.copy,
        Method::Del => endpoint.del,
        Method::Get => endpoint.get,
        Method::Head => endpoint.head,
        Method::Lock => endpoint.lock,
        Method::Mkcol => endpoint.mkcol,
        Method::Move => return None,
        Method::Options => endpoint.options,
        Method::Post => endpoint.post,
        Method::Propfind => endpoint.propfind,
        Method::Put => endpoint.put,
        Method::Trace => endpoint.trace,
        Method::Unlock => endpoint.unlock,
    })
}

/// Every dominance attribute of an endpoint *other* than path containment:
/// MIME inclusion, numeric maxima, and the twelve permission flags. Path is
/// checked separately by callers because `validate_child` derives it by
/// construction while descendant enumeration checks it by prefix.
fn endpoint_dominated_by(child: &Endpoint, parent: &Endpoint) -> bool {
    mime_subset(&parent.put_types, &child.put_types)
        && child.max_get <= parent.max_get
        && child.max_put <= parent.max_put
        && child.max_mkcol <= parent.max_mkcol
        && child.max_put_size <= parent.max_put_size
        && (!child.copy || parent.copy)
        && (!child.del || parent.del)
        && (!child.get || parent.get)
        && (!child.head || parent.head)
        && (!child.lock || parent.lock)
        && (!child.mkcol || parent.mkcol)
        && (!child.options || parent.options)
        && (!child.post || parent.post)
        && (!child.propfind || parent.propfind)
        && (!child.put || parent.put)
        && (!child.trace || parent.trace)
        && (!child.unlock || parent.unlock)
}

/// Validates and builds a storable child [`KeyRecord`] from a client
/// declaration and the resolved parent record (§4.3 `Validate child`).
pub fn validate_child(decl: &ChildKeyDeclaration, parent: &KeyRecord, now_millis: i64) -> Result<KeyRecord, CoreError> {
    if !parent.can_create_child {
        return Err(CoreError::InvalidChild("parent key cannot create children".to_string()));
    }

    let expire_delta = expiry::resolve_expire_delta(decl.initiate_expire, decl.expire_delta);
    if expire_delta > parent.expire_delta {
        return Err(CoreError::InvalidChild("expire_delta exceeds parent's".to_string()));
    }

    let mut endpoints = std::collections::BTreeMap::new();
    for (name, e) in &decl.endpoints {
        let mut segs = e.path.splitn(2, '/');
        let parent_name = segs.next().unwrap_or("");
        let tail = segs.next().unwrap_or("");

        let parent_endpoint = parent
            .endpoints
            .get(parent_name)
            .ok_or_else(|| CoreError::InvalidChild(format!("endpoint {name}: unknown parent endpoint {parent_name}")))?;

        let put_types = e.put_types.clone().unwrap_or_else(default_put_types);
        if !is_any_set(&put_types) {
            for t in &put_types {
                if !mime::is_known_or_any(t) {
                    return Err(CoreError::InvalidChild(format!("endpoint {name}: unknown mime type {t}")));
                }
            }
        }

        let resolved = Endpoint {
            path: join_parent_path(&parent_endpoint.path, tail),
            copy: e.copy,
            del: e.del,
            get: e.get,
            head: e.head,
            lock: e.lock,
            mkcol: e.mkcol,
            options: e.options,
            post: e.post,
            propfind: e.propfind,
            put: e.put,
            trace: e.trace,
            unlock: e.unlock,
            get_count: 0,
            max_get: e.max_get.unwrap_or(DEFAULT_MAX_COUNT),
            put_count: 0,
            max_put: e.max_put.unwrap_or(DEFAULT_MAX_COUNT),
            mkcol_count: 0,
            max_mkcol: e.max_mkcol.unwrap_or(DEFAULT_MAX_COUNT),
            max_put_size: e.max_put_size.unwrap_or(DEFAULT_MAX_PUT_SIZE),
            put_types,
        };

        if !endpoint_dominated_by(&resolved, parent_endpoint) {
            return Err(CoreError::InvalidChild(format!("endpoint {name}: not dominated by parent endpoint {parent_name}")));
        }

        endpoints.insert(name.clone(), resolved);
    }

    let (expire_started, expire_start_time) = expiry::initial_state(decl.initiate_expire, now_millis);

    Ok(KeyRecord {
        key_value: keygen::generate_key(),
        can_create_child: decl.can_create_child,
        endpoints,
        initiate_expire: decl.initiate_expire,
        expire_delta,
        expire_started,
        expire_start_time,
    })
}

/// Whether `candidate` is a descendant of `parent` under §4.3's dominance
/// rule: expiry, `can_create_child`, and every candidate endpoint matched by
/// some dominating parent endpoint.
pub fn is_descendant(candidate: &KeyRecord, parent: &KeyRecord) -> bool {
    if candidate.key_value == parent.key_value {
        return false;
    }
    if candidate.expire_delta > parent.expire_delta {
        return false;
    }
    if candidate.can_create_child && !parent.can_create_child {
        return false;
    }
    candidate
        .endpoints
        .values()
        .all(|cand_ep| find_dominating_parent_endpoint(cand_ep, parent).is_some())
}

fn find_dominating_parent_endpoint<'a>(candidate_ep: &Endpoint, parent: &'a KeyRecord) -> Option<(&'a str, String)> {
    for (name, parent_ep) in &parent.endpoints {
        let (suffix, prefix_ok) = is_path_subset(&parent_ep.path, &candidate_ep.path);
        if !prefix_ok {
            continue;
        }
        if endpoint_dominated_by(candidate_ep, parent_ep) {
            return Some((name.as_str(), suffix));
        }
    }
    None
}

/// One `(child_endpoint_name, path_under_parent_namespace)` pair returned by
/// descendant enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescendantEntry {
    pub endpoint_name: String,
    pub path: String,
}

/// A descendant record together with its entries expressed in the parent's
/// namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Descendant {
    pub key_value: String,
    pub entries: Vec<DescendantEntry>,
}

fn descendant_entries(candidate: &KeyRecord, parent: &KeyRecord) -> Vec<DescendantEntry> {
    candidate
        .endpoints
        .keys()
        .filter_map(|cand_name| {
            let cand_ep = &candidate.endpoints[cand_name];
            let (parent_name, suffix) = find_dominating_parent_endpoint(cand_ep, parent)?;
            Some(DescendantEntry {
                endpoint_name: cand_name.clone(),
                path: endpoint_namespace_path(parent_name, &parent.endpoints[parent_name].path, &suffix),
            })
        })
        .collect()
}

/// Enumerates every descendant of `parent` among `records` (§4.3
/// `/getChildKeys`). `records` is a finite, non-restartable scan, matching
/// [`crate::types`]'s `KeyStore::scan` contract.
pub fn enumerate_descendants<'a>(parent: &KeyRecord, records: impl Iterator<Item = &'a KeyRecord>) -> Vec<Descendant> {
    records
        .filter(|candidate| is_descendant(candidate, parent))
        .map(|candidate| Descendant {
            key_value: candidate.key_value.clone(),
            entries: descendant_entries(candidate, parent),
        })
        .collect()
}
