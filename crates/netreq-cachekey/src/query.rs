//! Canonical query-parameter encoding.

use crate::QueryMap;
use std::collections::BTreeMap;
use std::fmt::Write;

/// A query parameter value: a scalar, an ordered list, or a nested map.
///
/// Maps are canonicalized in sorted key order; lists preserve the order
/// given, since list order is usually semantically meaningful (e.g.
/// `ids=1&ids=2` differs from `ids=2&ids=1` for some APIs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Scalar(String),
    List(Vec<QueryValue>),
    Map(BTreeMap<String, QueryValue>),
}

pub(crate) fn canonicalize(query: &QueryMap) -> String {
    let mut out = String::new();
    let mut first = true;
    for (key, value) in query {
        if !first {
            out.push('&');
        }
        first = false;
        write_pair(&mut out, key, value);
    }
    out
}

fn write_pair(out: &mut String, key: &str, value: &QueryValue) {
    match value {
        QueryValue::Scalar(s) => {
            out.push_str(&percent_encode(key));
            out.push('=');
            out.push_str(&percent_encode(s));
        }
        QueryValue::List(items) => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push('&');
                }
                write_pair(out, key, item);
            }
        }
        QueryValue::Map(map) => {
            let mut first = true;
            for (sub_key, sub_value) in map {
                if !first {
                    out.push('&');
                }
                first = false;
                let nested_key = format!("{key}.{sub_key}");
                write_pair(out, &nested_key, sub_value);
            }
        }
    }
}

/// Percent-encodes everything but unreserved characters (RFC 3986 §2.3).
fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_is_percent_encoded() {
        let mut q = QueryMap::new();
        q.insert("q".into(), QueryValue::Scalar("a b".into()));
        assert_eq!(canonicalize(&q), "q=a%20b");
    }

    #[test]
    fn list_preserves_order() {
        let mut q = QueryMap::new();
        q.insert(
            "ids".into(),
            QueryValue::List(vec![
                QueryValue::Scalar("2".into()),
                QueryValue::Scalar("1".into()),
            ]),
        );
        assert_eq!(canonicalize(&q), "ids=2&ids=1");
    }

    #[test]
    fn nested_map_is_dot_joined() {
        let mut inner = BTreeMap::new();
        inner.insert("lat".to_string(), QueryValue::Scalar("1.0".into()));
        let mut q = QueryMap::new();
        q.insert("pos".into(), QueryValue::Map(inner));
        assert_eq!(canonicalize(&q), "pos.lat=1.0");
    }
}
