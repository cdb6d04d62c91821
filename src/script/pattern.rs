// src/script/pattern.rs

//! Path patterns: `/users/{id}/files/*`.

use std::collections::BTreeMap;

use super::ast::{Pattern, Segment};

/// Parse a rule's path pattern. Errors carry the character offset inside the
/// pattern they refer to.
pub fn parse_pattern(raw: &str) -> Result<Pattern, (usize, String)> {
    if !raw.starts_with('/') {
        return Err((0, format!("path pattern `{raw}` must start with `/`")));
    }

    let mut segments = Vec::new();
    let mut offset = 1;
    let parts: Vec<&str> = raw[1..].split('/').collect();
    let last = parts.len().saturating_sub(1);

    for (idx, part) in parts.iter().enumerate() {
        if part.is_empty() {
            offset += 1;
            continue;
        }
        if *part == "*" {
            if idx != last {
                return Err((offset, "`*` is only allowed as the last segment".to_string()));
            }
            segments.push(Segment::Rest);
        } else if let Some(inner) = part.strip_prefix('{') {
            let Some(name) = inner.strip_suffix('}') else {
                return Err((offset, format!("unterminated parameter `{part}`")));
            };
            if !is_ident(name) {
                return Err((offset, format!("invalid parameter name `{name}`")));
            }
            if name == "tail" {
                return Err((offset, "`tail` is reserved for `*` segments".to_string()));
            }
            let duplicate = segments
                .iter()
                .any(|s| matches!(s, Segment::Param(p) if p == name));
            if duplicate {
                return Err((offset, format!("duplicate parameter `{name}`")));
            }
            segments.push(Segment::Param(name.to_string()));
        } else if part.contains('{') || part.contains('}') || part.contains('*') {
            return Err((offset, format!("invalid path segment `{part}`")));
        } else {
            segments.push(Segment::Literal(part.to_string()));
        }
        offset += part.chars().count() + 1;
    }

    Ok(Pattern {
        raw: raw.to_string(),
        segments,
    })
}

pub fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Captured values from a successful match. `*` captures under `tail`.
pub type Captures = BTreeMap<String, String>;

impl Pattern {
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(p) => Some(p.as_str()),
            _ => None,
        })
    }

    pub fn has_rest(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::Rest))
    }

    pub fn matches(&self, path: &str) -> Option<Captures> {
        let mut captures = Captures::new();
        let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();

        for (idx, seg) in self.segments.iter().enumerate() {
            match seg {
                Segment::Rest => {
                    let rest = parts.get(idx..).unwrap_or(&[]).join("/");
                    captures.insert("tail".to_string(), rest);
                    return Some(captures);
                }
                Segment::Literal(lit) => {
                    if parts.get(idx) != Some(&lit.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = parts.get(idx)?;
                    captures.insert(name.clone(), (*value).to_string());
                }
            }
        }

        if parts.len() == self.segments.len() {
            Some(captures)
        } else {
            None
        }
    }
}
