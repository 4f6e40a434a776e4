//! Shared query-string types.
//!
//! HTML forms and some HTTP clients send empty parameters (`?status=`).
//! Those deserialize to `None` here instead of failing with a parse error.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer};

use leadforge_core::clamp_page;

/// Deserialize an optional `FromStr` value, treating `""` as absent.
pub fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(de::Error::custom),
    }
}

/// `?limit=&offset=` for list endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub limit: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub offset: Option<i64>,
}

impl PageQuery {
    /// Limit and offset clamped to the allowed range.
    pub fn resolve(&self) -> (i64, i64) {
        clamp_page(self.limit, self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadforge_core::defaults::{PAGE_LIMIT, PAGE_LIMIT_MAX};

    #[derive(Debug, Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "empty_as_none")]
        n: Option<i32>,
    }

    #[test]
    fn test_empty_string_is_none() {
        let p: Probe = serde_json::from_value(serde_json::json!({"n": ""})).unwrap();
        assert_eq!(p.n, None);
        let p: Probe = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(p.n, None);
        let p: Probe = serde_json::from_value(serde_json::json!({"n": " 7 "})).unwrap();
        assert_eq!(p.n, Some(7));
    }

    #[test]
    fn test_garbage_is_an_error() {
        let res: Result<Probe, _> = serde_json::from_value(serde_json::json!({"n": "seven"}));
        assert!(res.is_err());
    }

    #[test]
    fn test_page_query_resolves_defaults_and_caps() {
        assert_eq!(PageQuery::default().resolve(), (PAGE_LIMIT, 0));
        let q = PageQuery {
            limit: Some(10_000),
            offset: Some(-5),
        };
        assert_eq!(q.resolve(), (PAGE_LIMIT_MAX, 0));
    }
}
