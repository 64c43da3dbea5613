//! Connection string parsing and branch-aware composition.
//!
//! A connection string is a `;`-separated list of `key=value` pairs. A value
//! whose first non-blank character is `'` or `"` is quoted up to the matching
//! quote, and `;` inside it does not split. Quotes anywhere else are plain
//! characters. Keys compare case-insensitively.

use std::ops::Range;

/// Keys naming the catalog (database) component.
pub const CATALOG_KEYS: [&str; 2] = ["database", "initial catalog"];

/// Keys naming the server component.
pub const SERVER_KEYS: [&str; 4] = ["server", "data source", "host", "address"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionStringError {
    #[error("segment '{0}' is not a key=value pair")]
    MissingEquals(String),

    #[error("empty key in segment '{0}'")]
    EmptyKey(String),

    #[error("unterminated quoted value")]
    UnterminatedQuote,
}

/// Parsed key/value view of a connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pairs: Vec<(String, String)>,
}

impl ConnectionString {
    pub fn parse(input: &str) -> Result<Self, ConnectionStringError> {
        let mut pairs = Vec::new();
        for segment in split_segments(input)? {
            let Some(pair) = parse_segment(input, segment)? else {
                continue;
            };
            pairs.push((
                input[pair.key].trim().to_string(),
                input[pair.value].to_string(),
            ));
        }
        Ok(Self { pairs })
    }

    /// Value of the last pair whose key matches one of `keys`.
    pub fn get_any(&self, keys: &[&str]) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| keys.iter().any(|candidate| k.eq_ignore_ascii_case(candidate)))
            .map(|(_, v)| v.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_any(&[key])
    }

    pub fn catalog(&self) -> Option<&str> {
        self.get_any(&CATALOG_KEYS)
    }

    pub fn server(&self) -> Option<&str> {
        self.get_any(&SERVER_KEYS)
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}

/// Make a branch name safe for use inside a catalog name.
///
/// Every character that is not ASCII alphanumeric becomes `_`.
pub fn sanitize_branch(branch: &str) -> String {
    branch
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Effective connection string for the current environment.
///
/// Outside development, or without a branch, `base` is returned unchanged.
/// In development the catalog value gains a `_{sanitized branch}` suffix and
/// every other byte of `base` is kept as is. A base without a catalog
/// component is returned unchanged.
pub fn compose(base: &str, is_development: bool, branch: Option<&str>) -> String {
    if !is_development {
        return base.to_string();
    }
    let Some(branch) = branch.filter(|b| !b.is_empty()) else {
        return base.to_string();
    };

    let catalog = match catalog_span(base) {
        Ok(Some(span)) => span,
        Ok(None) => {
            tracing::warn!("Connection string has no catalog component; branch suffix not applied");
            return base.to_string();
        }
        Err(e) => {
            tracing::warn!(error = %e, "Connection string could not be parsed; branch suffix not applied");
            return base.to_string();
        }
    };

    let suffix = sanitize_branch(branch);
    let mut composed = String::with_capacity(base.len() + suffix.len() + 1);
    composed.push_str(&base[..catalog.end]);
    composed.push('_');
    composed.push_str(&suffix);
    composed.push_str(&base[catalog.end..]);
    composed
}

struct Pair {
    key: Range<usize>,
    value: Range<usize>,
}

#[derive(Clone, Copy)]
enum Scan {
    Key,
    ValueStart,
    Value,
    Quoted(char),
}

fn split_segments(input: &str) -> Result<Vec<Range<usize>>, ConnectionStringError> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut state = Scan::Key;

    for (i, c) in input.char_indices() {
        state = match (state, c) {
            (Scan::Quoted(q), c) if c == q => Scan::Value,
            (Scan::Quoted(q), _) => Scan::Quoted(q),
            (Scan::Key, '=') => Scan::ValueStart,
            (Scan::ValueStart, '"' | '\'') => Scan::Quoted(c),
            (_, ';') => {
                segments.push(start..i);
                start = i + 1;
                Scan::Key
            }
            (Scan::ValueStart, c) if c.is_whitespace() => Scan::ValueStart,
            (Scan::ValueStart, _) => Scan::Value,
            (state, _) => state,
        };
    }

    if matches!(state, Scan::Quoted(_)) {
        return Err(ConnectionStringError::UnterminatedQuote);
    }
    segments.push(start..input.len());
    Ok(segments)
}

/// Key and unquoted value ranges of one segment. Blank segments yield `None`.
fn parse_segment(input: &str, segment: Range<usize>) -> Result<Option<Pair>, ConnectionStringError> {
    let text = &input[segment.clone()];
    if text.trim().is_empty() {
        return Ok(None);
    }

    let eq = text
        .find('=')
        .ok_or_else(|| ConnectionStringError::MissingEquals(text.to_string()))?;
    if text[..eq].trim().is_empty() {
        return Err(ConnectionStringError::EmptyKey(text.to_string()));
    }

    let raw = &text[eq + 1..];
    let lead = raw.len() - raw.trim_start().len();
    let trimmed = raw.trim();
    let mut value_start = segment.start + eq + 1 + lead;
    let mut value_end = value_start + trimmed.len();

    let bytes = trimmed.as_bytes();
    if bytes.len() >= 2 && (bytes[0] == b'"' || bytes[0] == b'\'') && bytes[bytes.len() - 1] == bytes[0] {
        value_start += 1;
        value_end -= 1;
    }

    Ok(Some(Pair {
        key: segment.start..segment.start + eq,
        value: value_start..value_end,
    }))
}

/// Byte range of the last non-empty catalog value in `input`.
fn catalog_span(input: &str) -> Result<Option<Range<usize>>, ConnectionStringError> {
    let mut found = None;
    for segment in split_segments(input)? {
        let Some(pair) = parse_segment(input, segment)? else {
            continue;
        };
        let key = input[pair.key.clone()].trim();
        if CATALOG_KEYS.iter().any(|k| key.eq_ignore_ascii_case(k)) && !pair.value.is_empty() {
            found = Some(pair.value);
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "Server=s;Database=MyApp;Trusted_Connection=True;MultipleActiveResultSets=true";

    #[test]
    fn test_non_development_is_identity() {
        for branch in [None, Some("dev/alice"), Some(""), Some("main")] {
            assert_eq!(compose(BASE, false, branch), BASE);
        }
    }

    #[test]
    fn test_development_without_branch_is_identity() {
        assert_eq!(compose(BASE, true, None), BASE);
        assert_eq!(compose(BASE, true, Some("")), BASE);
    }

    #[test]
    fn test_dev_alice_scenario() {
        let composed = compose(BASE, true, Some("dev/alice"));
        assert_eq!(
            composed,
            "Server=s;Database=MyApp_dev_alice;Trusted_Connection=True;MultipleActiveResultSets=true"
        );

        let before = ConnectionString::parse(BASE).unwrap();
        let after = ConnectionString::parse(&composed).unwrap();
        assert_eq!(after.catalog(), Some("MyApp_dev_alice"));
        for ((bk, bv), (ak, av)) in before.pairs().iter().zip(after.pairs()) {
            assert_eq!(bk, ak);
            if !bk.eq_ignore_ascii_case("database") {
                assert_eq!(bv, av);
            }
        }
    }

    #[test]
    fn test_feature_branch_is_deterministic_and_valid() {
        let first = compose(BASE, true, Some("feature/x"));
        let second = compose(BASE, true, Some("feature/x"));
        assert_eq!(first, second);

        let parsed = ConnectionString::parse(&first).unwrap();
        assert_ne!(parsed.catalog(), ConnectionString::parse(BASE).unwrap().catalog());
        assert_eq!(parsed.catalog(), Some("MyApp_feature_x"));
    }

    #[test]
    fn test_sanitize_replaces_every_non_alphanumeric() {
        assert_eq!(sanitize_branch("dev/alice"), "dev_alice");
        assert_eq!(sanitize_branch("fix;drop=1 'x'"), "fix_drop_1__x_");
        assert_eq!(sanitize_branch("über-branch"), "_ber_branch");
    }

    #[test]
    fn test_initial_catalog_key_and_quotes() {
        let base = "Data Source=host;Initial Catalog='My;App';User Id=sa";
        let composed = compose(base, true, Some("b1"));
        assert_eq!(composed, "Data Source=host;Initial Catalog='My;App_b1';User Id=sa");

        let parsed = ConnectionString::parse(&composed).unwrap();
        assert_eq!(parsed.catalog(), Some("My;App_b1"));
        assert_eq!(parsed.server(), Some("host"));
    }

    #[test]
    fn test_missing_catalog_is_unchanged() {
        let base = "Server=s;User Id=sa";
        assert_eq!(compose(base, true, Some("dev")), base);
    }

    #[test]
    fn test_host_and_credentials_never_touched() {
        let base = "Server=database;Database=app;Password=database";
        let composed = compose(base, true, Some("x"));
        assert_eq!(composed, "Server=database;Database=app_x;Password=database");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            ConnectionString::parse("Server=s;oops"),
            Err(ConnectionStringError::MissingEquals("oops".into()))
        );
        assert_eq!(
            ConnectionString::parse("=value"),
            Err(ConnectionStringError::EmptyKey("=value".into()))
        );
        assert_eq!(
            ConnectionString::parse("Database='open"),
            Err(ConnectionStringError::UnterminatedQuote)
        );
        assert!(ConnectionString::parse("Server=s;;Database=d;").is_ok());
    }

    #[test]
    fn test_quote_inside_value_is_literal() {
        let base = "Server=s;Password=p'w;Database=MyApp";
        let composed = compose(base, true, Some("dev/alice"));
        assert_eq!(composed, "Server=s;Password=p'w;Database=MyApp_dev_alice");

        let parsed = ConnectionString::parse(&composed).unwrap();
        assert_eq!(parsed.get("password"), Some("p'w"));
        assert_eq!(parsed.catalog(), Some("MyApp_dev_alice"));

        let quoted = ConnectionString::parse(r#"Password= "a;b" ;Database=x"#).unwrap();
        assert_eq!(quoted.get("Password"), Some("a;b"));
    }

    #[test]
    fn test_unparseable_base_is_unchanged() {
        let base = "Server=s;Database='open";
        assert_eq!(compose(base, true, Some("dev")), base);
    }
}
