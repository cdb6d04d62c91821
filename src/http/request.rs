// src/http/request.rs

use std::borrow::Cow;
use std::net::SocketAddr;

use percent_encoding::percent_decode_str;

/// Case-insensitive, multi-valued header map.
///
/// Insertion order is preserved; lookups compare names ASCII
/// case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Case-sensitive, multi-valued query parameter map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw query string (`a=1&b=x%20y&flag`). Components are
    /// percent-decoded and `+` is read as a space.
    pub fn parse(raw: &str) -> Self {
        let mut params = Self::new();
        for pair in raw.split('&').filter(|p| !p.is_empty()) {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            params.append(decode_component(k), decode_component(v));
        }
        params
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

fn decode_component(s: &str) -> String {
    let plus_as_space = s.replace('+', " ");
    percent_decode_str(&plus_as_space)
        .decode_utf8_lossy()
        .into_owned()
}

/// What a handler may ask of an inbound request.
pub trait Request: Send + Sync {
    fn method(&self) -> &str;
    fn path(&self) -> &str;
    fn headers(&self) -> &Headers;
    fn query(&self) -> &QueryParams;
    fn body(&self) -> &[u8];
    fn remote_addr(&self) -> Option<SocketAddr>;

    /// Charset declared by the client, if any.
    fn charset(&self) -> Option<&str>;

    fn content_type(&self) -> Option<&str>;

    /// Body decoded as text. Only UTF-8 (and its ASCII subset) is decoded
    /// exactly; other charsets fall back to lossy UTF-8.
    fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.body())
    }
}

/// Plain owned request used by the host binary and tests.
#[derive(Debug, Clone, Default)]
pub struct SimpleRequest {
    method: String,
    path: String,
    headers: Headers,
    query: QueryParams,
    body: Vec<u8>,
    remote_addr: Option<SocketAddr>,
}

impl SimpleRequest {
    /// Build a request; a `?query` suffix on `target` is split off and parsed.
    pub fn new(method: impl Into<String>, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((p, q)) => (p, QueryParams::parse(q)),
            None => (target, QueryParams::new()),
        };
        Self {
            method: method.into().to_ascii_uppercase(),
            path: normalize_path(path),
            query,
            ..Self::default()
        }
    }

    pub fn get(target: &str) -> Self {
        Self::new("GET", target)
    }

    /// Parse `"<METHOD> <target>"`, e.g. `"GET /greet?name=x"`.
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let method = parts.next()?;
        let target = parts.next()?;
        if parts.next().is_some() || !target.starts_with('/') {
            return None;
        }
        Some(Self::new(method, target))
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        self.query.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Same request with a different path; used when a context path prefix
    /// is stripped before project dispatch.
    pub fn with_path(&self, path: &str) -> Self {
        let mut req = self.clone();
        req.path = normalize_path(path);
        req
    }
}

fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

impl Request for SimpleRequest {
    fn method(&self) -> &str {
        &self.method
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn headers(&self) -> &Headers {
        &self.headers
    }

    fn query(&self) -> &QueryParams {
        &self.query
    }

    fn body(&self) -> &[u8] {
        &self.body
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    fn charset(&self) -> Option<&str> {
        let ct = self.content_type()?;
        ct.split(';')
            .skip(1)
            .filter_map(|p| p.trim().split_once('='))
            .find(|(k, _)| k.trim().eq_ignore_ascii_case("charset"))
            .map(|(_, v)| v.trim().trim_matches('"'))
    }

    fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type")
    }
}
