//! Route template parsing and matching.
//!
//! # Responsibilities
//! - Parse templates such as `{controller=Home}/{action=Index}/{id?}`
//! - Match request paths segment by segment
//! - Fill defaults for missing trailing segments
//!
//! # Design Decisions
//! - Literal segments match case-insensitively
//! - Empty path segments are ignored (`/Home//Index` == `/Home/Index`)
//! - No regex, one pass over the segments

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteTemplateError {
    #[error("unbalanced braces in segment '{0}'")]
    UnbalancedBraces(String),

    #[error("empty parameter name in segment '{0}'")]
    EmptyParameter(String),

    #[error("parameter '{0}' appears more than once")]
    DuplicateParameter(String),

    #[error("required segment '{0}' follows an optional one")]
    RequiredAfterOptional(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Parameter {
        name: String,
        default: Option<String>,
        optional: bool,
    },
}

impl Segment {
    fn can_be_omitted(&self) -> bool {
        matches!(self, Segment::Parameter { default: Some(_), .. } | Segment::Parameter { optional: true, .. })
    }
}

/// Values captured by a route match, keyed by parameter name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteValues {
    values: BTreeMap<String, String>,
}

impl RouteValues {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn controller(&self) -> Option<&str> {
        self.get("controller")
    }

    pub fn action(&self) -> Option<&str> {
        self.get("action")
    }

    pub fn id(&self) -> Option<&str> {
        self.get("id")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A compiled route template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl RouteTemplate {
    pub fn parse(template: &str) -> Result<Self, RouteTemplateError> {
        let mut segments = Vec::new();
        let mut seen_optional = false;

        for raw in template.split('/').filter(|s| !s.is_empty()) {
            let segment = parse_segment(raw)?;

            if let Segment::Parameter { name, .. } = &segment {
                let duplicate = segments
                    .iter()
                    .any(|s| matches!(s, Segment::Parameter { name: n, .. } if n.eq_ignore_ascii_case(name)));
                if duplicate {
                    return Err(RouteTemplateError::DuplicateParameter(name.clone()));
                }
            }
            if segment.can_be_omitted() {
                seen_optional = true;
            } else if seen_optional {
                return Err(RouteTemplateError::RequiredAfterOptional(raw.to_string()));
            }
            segments.push(segment);
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Match `path` against the template.
    pub fn matches(&self, path: &str) -> Option<RouteValues> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if parts.len() > self.segments.len() {
            return None;
        }

        let mut values = RouteValues::default();
        for (index, segment) in self.segments.iter().enumerate() {
            match (segment, parts.get(index)) {
                (Segment::Literal(literal), Some(part)) => {
                    if !literal.eq_ignore_ascii_case(part) {
                        return None;
                    }
                }
                (Segment::Literal(_), None) => return None,
                (Segment::Parameter { name, .. }, Some(part)) => {
                    values.values.insert(name.clone(), (*part).to_string());
                }
                (Segment::Parameter { name, default, optional }, None) => match default {
                    Some(default) => {
                        values.values.insert(name.clone(), default.clone());
                    }
                    None if *optional => {}
                    None => return None,
                },
            }
        }
        Some(values)
    }
}

fn parse_segment(raw: &str) -> Result<Segment, RouteTemplateError> {
    let opens = raw.starts_with('{');
    let closes = raw.ends_with('}');
    if !opens && !closes && !raw.contains(['{', '}']) {
        return Ok(Segment::Literal(raw.to_string()));
    }
    if !(opens && closes) || raw.len() < 2 {
        return Err(RouteTemplateError::UnbalancedBraces(raw.to_string()));
    }

    let body = &raw[1..raw.len() - 1];
    if body.contains(['{', '}']) {
        return Err(RouteTemplateError::UnbalancedBraces(raw.to_string()));
    }

    let (name, default, optional) = match body.split_once('=') {
        Some((name, default)) => (name, Some(default.to_string()), false),
        None => match body.strip_suffix('?') {
            Some(name) => (name, None, true),
            None => (body, None, false),
        },
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(RouteTemplateError::EmptyParameter(raw.to_string()));
    }

    Ok(Segment::Parameter {
        name: name.to_string(),
        default,
        optional,
    })
}
