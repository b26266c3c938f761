//! Event key parsing.
//!
//! Keys are dotted property paths under a configurable prefix:
//!
//! ```text
//! <prefix>routes[3].id
//! <prefix>routes[3].predicates[0]
//! <prefix>routes[3].metadata.team
//! <prefix>default-filters[1]
//! ```

use thiserror::Error;

/// The field of a route a key addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteField {
    Id,
    Uri,
    Order,
    Predicate(usize),
    Filter(usize),
    Metadata(String),
}

/// A recognised key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKey {
    Route { index: usize, field: RouteField },
    DefaultFilter { index: usize },
}

/// A key this component does not handle. Callers skip these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("Key `{0}` is outside the route prefix")]
    OutsidePrefix(String),

    #[error("Key `{0}` does not address a route field")]
    Malformed(String),
}

/// Parses keys under one prefix.
#[derive(Debug, Clone)]
pub struct KeyPattern {
    prefix: String,
}

impl KeyPattern {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Key for a route field, the inverse of [`KeyPattern::parse`].
    pub fn route_key(&self, index: usize, field: &str) -> String {
        format!("{}routes[{}].{}", self.prefix, index, field)
    }

    pub fn parse(&self, key: &str) -> Result<EventKey, KeyError> {
        let rest = key
            .strip_prefix(self.prefix.as_str())
            .ok_or_else(|| KeyError::OutsidePrefix(key.to_string()))?;
        let malformed = || KeyError::Malformed(key.to_string());

        if let Some((index, tail)) = indexed(rest, "default-filters") {
            return if tail.is_empty() {
                Ok(EventKey::DefaultFilter { index })
            } else {
                Err(malformed())
            };
        }

        let (index, tail) = indexed(rest, "routes").ok_or_else(malformed)?;
        let field_path = tail.strip_prefix('.').ok_or_else(malformed)?;

        let field = match field_path {
            "id" => RouteField::Id,
            "uri" => RouteField::Uri,
            "order" => RouteField::Order,
            other => {
                if let Some((i, "")) = indexed(other, "predicates") {
                    RouteField::Predicate(i)
                } else if let Some((i, "")) = indexed(other, "filters") {
                    RouteField::Filter(i)
                } else if let Some(name) = other.strip_prefix("metadata.") {
                    if name.is_empty() {
                        return Err(malformed());
                    }
                    RouteField::Metadata(name.to_string())
                } else {
                    return Err(malformed());
                }
            }
        };

        Ok(EventKey::Route { index, field })
    }
}

/// Split `name[12]rest` into `(12, rest)`.
fn indexed<'a>(text: &'a str, name: &str) -> Option<(usize, &'a str)> {
    let after_name = text.strip_prefix(name)?.strip_prefix('[')?;
    let close = after_name.find(']')?;
    let digits = &after_name[..close];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index = digits.parse().ok()?;
    Some((index, &after_name[close + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern() -> KeyPattern {
        KeyPattern::new("gateway.")
    }

    #[test]
    fn test_route_fields() {
        let p = pattern();
        assert_eq!(
            p.parse("gateway.routes[0].id").unwrap(),
            EventKey::Route { index: 0, field: RouteField::Id }
        );
        assert_eq!(
            p.parse("gateway.routes[12].predicates[3]").unwrap(),
            EventKey::Route { index: 12, field: RouteField::Predicate(3) }
        );
        assert_eq!(
            p.parse("gateway.routes[1].metadata.team").unwrap(),
            EventKey::Route { index: 1, field: RouteField::Metadata("team".into()) }
        );
        assert_eq!(
            p.parse("gateway.default-filters[2]").unwrap(),
            EventKey::DefaultFilter { index: 2 }
        );
    }

    #[test]
    fn test_unrecognised_keys() {
        let p = pattern();
        assert!(matches!(p.parse("server.port"), Err(KeyError::OutsidePrefix(_))));
        assert!(matches!(p.parse("gateway.routes[x].id"), Err(KeyError::Malformed(_))));
        assert!(matches!(p.parse("gateway.routes[0]"), Err(KeyError::Malformed(_))));
        assert!(matches!(p.parse("gateway.routes[0].weight"), Err(KeyError::Malformed(_))));
        assert!(matches!(p.parse("gateway.routes[0].filters[1].x"), Err(KeyError::Malformed(_))));
        assert!(matches!(p.parse("gateway.httpclient.pool"), Err(KeyError::Malformed(_))));
    }

    #[test]
    fn test_route_key_round_trips() {
        let p = pattern();
        let key = p.route_key(4, "uri");
        assert_eq!(key, "gateway.routes[4].uri");
        assert_eq!(
            p.parse(&key).unwrap(),
            EventKey::Route { index: 4, field: RouteField::Uri }
        );
    }
}
