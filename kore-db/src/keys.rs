//! # Key Schema
//!
//! Every higher-level entity maps to one or more keys in a colon-delimited
//! namespace, all sharing the substrate's unsigned-lexicographic order:
//!
//! ```text
//! doc:<coll>:<id>                              document body
//! idx:<coll>:<name>:<value>                    comma-joined id list
//! vec:<coll>:<id>                              encoded vector payload
//! g:v:<id>                                     node body
//! g:e:out:<src>:<type>:<dst>                   edge body (outbound)
//! g:e:in:<dst>:<type>:<src>                    edge body (inbound)
//! g:idx:v:<label>:<id>                         presence marker
//! g:idx:v_prop:<label>:<key>:<val>:<id>        presence marker
//! g:idx:e_prop:<type>:<key>:<val>:<src>:<dst>  presence marker
//! ```
//!
//! Components are UTF-8 and may not contain ASCII `:` (0x3A); every
//! constructor validates before building a key.

use bytes::Bytes;

use kore_core::error::{Error, Result};

/// Non-empty, non-tombstone value for index marker keys.
pub const PRESENCE: &[u8] = &[1];

/// Reject empty components and components containing the delimiter.
pub fn check_component(component: &str) -> Result<()> {
    if component.is_empty() {
        return Err(Error::InvalidKey {
            reason: "empty key component".to_string(),
        });
    }
    if component.contains(':') {
        return Err(Error::InvalidKey {
            reason: format!("component {component:?} contains ':'"),
        });
    }
    Ok(())
}

fn join(parts: &[&str]) -> Bytes {
    Bytes::from(parts.join(":"))
}

pub fn doc_key(coll: &str, id: &str) -> Result<Bytes> {
    check_component(coll)?;
    check_component(id)?;
    Ok(join(&["doc", coll, id]))
}

/// Prefix covering every document in a collection whose id starts with
/// `id_prefix` (possibly empty).
pub fn doc_prefix(coll: &str, id_prefix: &str) -> Bytes {
    Bytes::from(format!("doc:{coll}:{id_prefix}"))
}

pub fn doc_index_key(coll: &str, index: &str, value: &str) -> Result<Bytes> {
    check_component(coll)?;
    check_component(index)?;
    check_component(value)?;
    Ok(join(&["idx", coll, index, value]))
}

pub fn vec_key(coll: &str, id: &str) -> Result<Bytes> {
    check_component(coll)?;
    check_component(id)?;
    Ok(join(&["vec", coll, id]))
}

pub fn vec_prefix(coll: &str) -> Bytes {
    Bytes::from(format!("vec:{coll}:"))
}

pub fn node_key(id: &str) -> Result<Bytes> {
    check_component(id)?;
    Ok(join(&["g", "v", id]))
}

pub fn edge_out_key(src: &str, edge_type: &str, dst: &str) -> Result<Bytes> {
    check_component(src)?;
    check_component(edge_type)?;
    check_component(dst)?;
    Ok(join(&["g", "e", "out", src, edge_type, dst]))
}

pub fn edge_in_key(src: &str, edge_type: &str, dst: &str) -> Result<Bytes> {
    check_component(src)?;
    check_component(edge_type)?;
    check_component(dst)?;
    Ok(join(&["g", "e", "in", dst, edge_type, src]))
}

/// Prefix of every outbound edge of `src` with `edge_type`.
pub fn edge_out_prefix(src: &str, edge_type: &str) -> Result<Bytes> {
    check_component(src)?;
    check_component(edge_type)?;
    Ok(Bytes::from(format!("g:e:out:{src}:{edge_type}:")))
}

/// Prefix of every inbound edge of `dst` with `edge_type`.
pub fn edge_in_prefix(dst: &str, edge_type: &str) -> Result<Bytes> {
    check_component(dst)?;
    check_component(edge_type)?;
    Ok(Bytes::from(format!("g:e:in:{dst}:{edge_type}:")))
}

pub fn node_label_key(label: &str, id: &str) -> Result<Bytes> {
    check_component(label)?;
    check_component(id)?;
    Ok(join(&["g", "idx", "v", label, id]))
}

pub fn node_label_prefix(label: &str) -> Result<Bytes> {
    check_component(label)?;
    Ok(Bytes::from(format!("g:idx:v:{label}:")))
}

pub fn node_prop_key(label: &str, key: &str, value: &str, id: &str) -> Result<Bytes> {
    check_component(label)?;
    check_component(key)?;
    check_component(value)?;
    check_component(id)?;
    Ok(join(&["g", "idx", "v_prop", label, key, value, id]))
}

pub fn node_prop_prefix(label: &str, key: &str, value: &str) -> Result<Bytes> {
    check_component(label)?;
    check_component(key)?;
    check_component(value)?;
    Ok(Bytes::from(format!("g:idx:v_prop:{label}:{key}:{value}:")))
}

pub fn edge_prop_key(
    edge_type: &str,
    key: &str,
    value: &str,
    src: &str,
    dst: &str,
) -> Result<Bytes> {
    check_component(edge_type)?;
    check_component(key)?;
    check_component(value)?;
    check_component(src)?;
    check_component(dst)?;
    Ok(join(&["g", "idx", "e_prop", edge_type, key, value, src, dst]))
}

/// The component after the final `:` of a key. Traversals use this to pull
/// the opposite endpoint out of edge keys without touching edge bodies.
pub fn last_component(key: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(key).ok()?;
    text.rsplit(':').next().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn components_reject_delimiter() {
        assert!(check_component("user").is_ok());
        assert!(check_component("us:er").is_err());
        assert!(check_component("").is_err());
    }

    #[test]
    fn document_keys_are_stable() {
        assert_eq!(doc_key("people", "u1").unwrap(), Bytes::from("doc:people:u1"));
        assert_eq!(
            doc_index_key("people", "email", "a@b").unwrap(),
            Bytes::from("idx:people:email:a@b")
        );
    }

    #[test]
    fn edge_keys_dualize() {
        assert_eq!(
            edge_out_key("u1", "FOLLOWS", "u2").unwrap(),
            Bytes::from("g:e:out:u1:FOLLOWS:u2")
        );
        assert_eq!(
            edge_in_key("u1", "FOLLOWS", "u2").unwrap(),
            Bytes::from("g:e:in:u2:FOLLOWS:u1")
        );
    }

    #[test]
    fn last_component_extracts_endpoint() {
        assert_eq!(
            last_component(b"g:e:out:u1:FOLLOWS:u2").as_deref(),
            Some("u2")
        );
        assert_eq!(last_component(b"plain").as_deref(), Some("plain"));
    }

    #[test]
    fn invalid_components_surface_before_any_write() {
        assert!(doc_key("c:c", "id").is_err());
        assert!(vec_key("coll", "i:d").is_err());
        assert!(node_prop_key("l", "k", "v:v", "id").is_err());
    }
}
