//! Route predicate matching.
//!
//! # Responsibilities
//! - Compile predicate definitions into matchers
//! - Match path and host patterns (`*`, `**`, `{var}`)
//! - Match method, header, query parameter and cookie conditions
//! - Combine a route's conditions with AND semantics
//!
//! # Design Decisions
//! - Host matching is case-insensitive, path matching is case-sensitive
//! - Trailing slashes are ignored on both pattern and request path
//! - Header/query/cookie regexes must match the whole value
//! - The request is summarised once into a [`RequestView`] so each
//!   matcher does not re-parse the query string

use std::fmt;

use axum::http::header::{COOKIE, HOST};
use axum::http::{HeaderMap, HeaderName, Method, Request};
use regex::Regex;

use crate::routing::definition::PredicateDefinition;

/// The parts of a request that predicates look at.
#[derive(Debug)]
pub struct RequestView<'a> {
    method: &'a Method,
    path: &'a str,
    host: Option<String>,
    headers: &'a HeaderMap,
    query: Vec<(String, String)>,
}

impl<'a> RequestView<'a> {
    pub fn new<B>(req: &'a Request<B>) -> Self {
        let host = req
            .headers()
            .get(HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| req.uri().host())
            .map(|h| strip_port(h).to_ascii_lowercase());

        let query = req
            .uri()
            .query()
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();

        Self {
            method: req.method(),
            path: req.uri().path(),
            host,
            headers: req.headers(),
            query,
        }
    }

    pub fn path(&self) -> &str {
        self.path
    }

    /// First path segment, the key of the route table's path index.
    pub fn first_segment(&self) -> &str {
        segments(self.path, '/').first().copied().unwrap_or("")
    }
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, req: &RequestView<'_>) -> bool;
}

/// One segment of a path or host pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// Segment with `*` wildcards inside (`*`, `*.js`, `v*`).
    Glob(String),
    /// `{name}`: any single non-empty segment.
    Variable,
    /// `**`: zero or more segments.
    AnyDepth,
}

impl Segment {
    fn matches(&self, text: &str) -> bool {
        match self {
            Segment::Literal(lit) => lit == text,
            Segment::Glob(glob) => glob_match(glob, text),
            Segment::Variable => !text.is_empty(),
            Segment::AnyDepth => true,
        }
    }
}

/// `*`-only glob over a single segment.
fn glob_match(pattern: &str, text: &str) -> bool {
    let p = pattern.as_bytes();
    let t = text.as_bytes();
    let (mut pi, mut ti) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && p[pi] == b'*' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if pi < p.len() && p[pi] == t[ti] {
            pi += 1;
            ti += 1;
        } else if let Some((star_p, star_t)) = backtrack {
            pi = star_p + 1;
            ti = star_t + 1;
            backtrack = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|b| *b == b'*')
}

fn segments(text: &str, separator: char) -> Vec<&str> {
    let trimmed = text.trim_matches(separator);
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split(separator).collect()
    }
}

fn match_segments(pattern: &[Segment], input: &[&str]) -> bool {
    match pattern.split_first() {
        None => input.is_empty(),
        Some((Segment::AnyDepth, rest)) => (0..=input.len()).any(|skip| match_segments(rest, &input[skip..])),
        Some((segment, rest)) => match input.split_first() {
            Some((first, tail)) => segment.matches(first) && match_segments(rest, tail),
            None => false,
        },
    }
}

/// A compiled `/`- or `.`-separated pattern.
#[derive(Debug, Clone)]
struct Pattern {
    separator: char,
    segments: Vec<Segment>,
}

impl Pattern {
    fn compile(raw: &str, separator: char) -> Result<Self, String> {
        let trimmed = raw.trim_matches(separator);
        let mut compiled = Vec::new();

        if !trimmed.is_empty() {
            for part in trimmed.split(separator) {
                compiled.push(compile_segment(part, raw)?);
            }
        }

        Ok(Self {
            separator,
            segments: compiled,
        })
    }

    fn matches(&self, text: &str) -> bool {
        match_segments(&self.segments, &segments(text, self.separator))
    }

    /// The leading literal segment, if the pattern has one.
    fn literal_head(&self) -> Option<&str> {
        match self.segments.first() {
            Some(Segment::Literal(lit)) => Some(lit.as_str()),
            None => Some(""),
            _ => None,
        }
    }
}

fn compile_segment(part: &str, raw: &str) -> Result<Segment, String> {
    if part.is_empty() {
        return Err(format!("empty segment in pattern `{}`", raw));
    }
    if part == "**" {
        return Ok(Segment::AnyDepth);
    }
    if part.contains("**") {
        return Err(format!("`**` must span a whole segment in `{}`", raw));
    }
    if let Some(name) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
        if name.is_empty() || name.contains(['{', '}', '*']) {
            return Err(format!("malformed variable `{}` in `{}`", part, raw));
        }
        return Ok(Segment::Variable);
    }
    if part.contains(['{', '}']) {
        return Err(format!("unbalanced braces in `{}`", raw));
    }
    if part.contains('*') {
        Ok(Segment::Glob(part.to_string()))
    } else {
        Ok(Segment::Literal(part.to_string()))
    }
}

/// Matches the request path against any of several patterns.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    patterns: Vec<Pattern>,
}

impl PathMatcher {
    pub fn new(patterns: &[String]) -> Result<Self, String> {
        if patterns.is_empty() {
            return Err("Path needs at least one pattern".to_string());
        }
        let patterns = patterns
            .iter()
            .map(|p| {
                if !p.starts_with('/') {
                    return Err(format!("path pattern `{}` must start with '/'", p));
                }
                Pattern::compile(p, '/')
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Literal first segments of every pattern, or `None` when any pattern
    /// starts with a wildcard.
    pub fn index_keys(&self) -> Option<Vec<String>> {
        self.patterns
            .iter()
            .map(|p| p.literal_head().map(str::to_string))
            .collect()
    }
}

impl Matcher for PathMatcher {
    fn matches(&self, req: &RequestView<'_>) -> bool {
        self.patterns.iter().any(|p| p.matches(req.path))
    }
}

/// Matches the Host header (port ignored).
#[derive(Debug, Clone)]
pub struct HostMatcher {
    patterns: Vec<Pattern>,
}

impl HostMatcher {
    /// Patterns are normalized to lowercase for case-insensitive matching.
    pub fn new(patterns: &[String]) -> Result<Self, String> {
        if patterns.is_empty() {
            return Err("Host needs at least one pattern".to_string());
        }
        let patterns = patterns
            .iter()
            .map(|p| Pattern::compile(&strip_port(p).to_ascii_lowercase(), '.'))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }
}

impl Matcher for HostMatcher {
    fn matches(&self, req: &RequestView<'_>) -> bool {
        match &req.host {
            Some(host) => self.patterns.iter().any(|p| p.matches(host)),
            None => false,
        }
    }
}

/// Matches the request method against a set.
#[derive(Debug, Clone)]
pub struct MethodMatcher {
    methods: Vec<Method>,
}

impl MethodMatcher {
    pub fn new(names: &[String]) -> Result<Self, String> {
        if names.is_empty() {
            return Err("Method needs at least one method".to_string());
        }
        let methods = names
            .iter()
            .map(|n| {
                Method::from_bytes(n.to_ascii_uppercase().as_bytes())
                    .map_err(|_| format!("invalid method `{}`", n))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { methods })
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, req: &RequestView<'_>) -> bool {
        self.methods.contains(req.method)
    }
}

/// Matches a header's presence, or a header value against a regex.
#[derive(Debug, Clone)]
pub struct HeaderMatcher {
    name: HeaderName,
    value: Option<Regex>,
}

impl HeaderMatcher {
    pub fn new(args: &[String]) -> Result<Self, String> {
        let (name, value) = name_and_regex(args, "Header")?;
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| format!("invalid header name `{}`", name))?;
        Ok(Self { name, value })
    }
}

impl Matcher for HeaderMatcher {
    fn matches(&self, req: &RequestView<'_>) -> bool {
        let mut values = req
            .headers
            .get_all(&self.name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .peekable();
        match &self.value {
            None => values.peek().is_some(),
            Some(re) => values.any(|v| re.is_match(v)),
        }
    }
}

/// Matches a query parameter's presence, or its value against a regex.
#[derive(Debug, Clone)]
pub struct QueryMatcher {
    param: String,
    value: Option<Regex>,
}

impl QueryMatcher {
    pub fn new(args: &[String]) -> Result<Self, String> {
        let (param, value) = name_and_regex(args, "Query")?;
        Ok(Self {
            param: param.to_string(),
            value,
        })
    }
}

impl Matcher for QueryMatcher {
    fn matches(&self, req: &RequestView<'_>) -> bool {
        let mut values = req
            .query
            .iter()
            .filter(|(k, _)| *k == self.param)
            .map(|(_, v)| v.as_str())
            .peekable();
        match &self.value {
            None => values.peek().is_some(),
            Some(re) => values.any(|v| re.is_match(v)),
        }
    }
}

/// Matches a cookie value against a regex.
#[derive(Debug, Clone)]
pub struct CookieMatcher {
    name: String,
    value: Regex,
}

impl CookieMatcher {
    pub fn new(args: &[String]) -> Result<Self, String> {
        match name_and_regex(args, "Cookie")? {
            (name, Some(value)) => Ok(Self {
                name: name.to_string(),
                value,
            }),
            (_, None) => Err("Cookie needs a name and a value regex".to_string()),
        }
    }
}

impl Matcher for CookieMatcher {
    fn matches(&self, req: &RequestView<'_>) -> bool {
        req.headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .any(|(name, value)| name == self.name && self.value.is_match(value))
    }
}

fn name_and_regex<'a>(args: &'a [String], kind: &str) -> Result<(&'a str, Option<Regex>), String> {
    match args {
        [name] if !name.is_empty() => Ok((name.as_str(), None)),
        [name, value] if !name.is_empty() => {
            let re = Regex::new(&format!("^(?:{})$", value))
                .map_err(|e| format!("invalid regex `{}`: {}", value, e))?;
            Ok((name.as_str(), Some(re)))
        }
        _ => Err(format!("{} takes a name and an optional regex", kind)),
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, req: &RequestView<'_>) -> bool {
        self.matchers.iter().all(|m| m.matches(req))
    }
}

/// A predicate ready for the request path.
#[derive(Debug)]
pub struct CompiledPredicate {
    pub matcher: Box<dyn Matcher>,
    /// Path index keys, for `Path` predicates with literal heads.
    pub index_keys: Option<Vec<String>>,
}

/// Compile one predicate definition. The error is a human-readable reason.
pub fn compile_predicate(def: &PredicateDefinition) -> Result<CompiledPredicate, String> {
    let args = &def.args;
    let (matcher, index_keys): (Box<dyn Matcher>, _) = match def.name.to_ascii_lowercase().as_str() {
        "path" => {
            let m = PathMatcher::new(args)?;
            let keys = m.index_keys();
            (Box::new(m), keys)
        }
        "host" => (Box::new(HostMatcher::new(args)?), None),
        "method" => (Box::new(MethodMatcher::new(args)?), None),
        "header" => (Box::new(HeaderMatcher::new(args)?), None),
        "query" => (Box::new(QueryMatcher::new(args)?), None),
        "cookie" => (Box::new(CookieMatcher::new(args)?), None),
        "" => return Err("predicate has no name".to_string()),
        other => return Err(format!("unknown predicate `{}`", other)),
    };
    Ok(CompiledPredicate {
        matcher,
        index_keys,
    })
}
