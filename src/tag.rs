//! Field-tag grammar reader.
//!
//! Struct fields in the scanned sources carry a tag string made of whitespace-separated
//! `key:"value"` pairs, for example `` `json:"name,omitempty" public:"view"` ``. This module
//! turns such a string into a key/value map and answers the questions the rest of the
//! pipeline asks about a field: its output name, whether it is optional, whether it is
//! visible under the public projection, and which schema modifiers it carries.

use log::debug;
use std::collections::BTreeMap;

/// Parses a tag string into a map from key to unquoted value.
///
/// Surrounding backticks are accepted. Malformed tokens (a key with no colon, a value
/// with no closing quote) are skipped; scanning resumes at the next whitespace.
///
/// # Example
///
/// ```
/// use openapi_from_comments::tag::parse_tag;
///
/// let tag = parse_tag(r#"json:"foo,omitempty" public:"view""#);
/// assert_eq!(tag["json"], "foo,omitempty");
/// assert_eq!(tag["public"], "view");
/// ```
pub fn parse_tag(raw: &str) -> BTreeMap<String, String> {
    let raw = raw.trim();
    let raw = raw
        .strip_prefix('`')
        .and_then(|s| s.strip_suffix('`'))
        .unwrap_or(raw);

    let mut entries = BTreeMap::new();
    let bytes = raw.as_bytes();
    let mut pos = 0;

    while pos < bytes.len() {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= bytes.len() {
            break;
        }

        let key_start = pos;
        while pos < bytes.len()
            && bytes[pos] != b':'
            && bytes[pos] != b'"'
            && !bytes[pos].is_ascii_whitespace()
        {
            pos += 1;
        }
        let key = &raw[key_start..pos];

        if key.is_empty() || pos + 1 >= bytes.len() || bytes[pos] != b':' || bytes[pos + 1] != b'"' {
            debug!("Skipping malformed tag token at offset {} in {:?}", key_start, raw);
            pos = skip_token(bytes, pos);
            continue;
        }

        pos += 2;
        let mut value = String::new();
        let mut closed = false;
        while pos < bytes.len() {
            match bytes[pos] {
                b'\\' if pos + 1 < bytes.len() => {
                    let ch = raw[pos + 1..].chars().next().unwrap_or_default();
                    value.push(ch);
                    pos += 1 + ch.len_utf8();
                }
                b'"' => {
                    closed = true;
                    pos += 1;
                    break;
                }
                _ => {
                    let ch = raw[pos..].chars().next().unwrap_or_default();
                    value.push(ch);
                    pos += ch.len_utf8().max(1);
                }
            }
        }

        if closed {
            entries.insert(key.to_string(), value);
        } else {
            debug!("Unterminated value for tag key {:?}", key);
        }
    }

    entries
}

/// Advances past the current token, honoring quoted sections.
fn skip_token(bytes: &[u8], mut pos: usize) -> usize {
    let mut in_quotes = false;
    while pos < bytes.len() {
        match bytes[pos] {
            b'"' => in_quotes = !in_quotes,
            b if b.is_ascii_whitespace() && !in_quotes => break,
            _ => {}
        }
        pos += 1;
    }
    pos
}

/// Parsed tag of one struct field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTag {
    entries: BTreeMap<String, String>,
}

impl FieldTag {
    pub fn parse(raw: &str) -> Self {
        Self {
            entries: parse_tag(raw),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Output property name taken from the first matching key in `name_keys`.
    ///
    /// The first comma-separated segment of the value is the name. A `column:` option
    /// inside a semicolon-separated value (`gorm:"column:user_id;not null"`) is honored
    /// for keys that use that style.
    pub fn property_name(&self, name_keys: &[String]) -> Option<String> {
        for key in name_keys {
            let Some(value) = self.get(key) else {
                continue;
            };

            if let Some(column) = value
                .split(';')
                .find_map(|opt| opt.trim().strip_prefix("column:"))
            {
                if !column.is_empty() {
                    return Some(column.to_string());
                }
            }

            let name = value.split(',').next().unwrap_or_default().trim();
            if !name.is_empty() && name != "-" {
                return Some(name.to_string());
            }
        }
        None
    }

    /// Whether the field is excluded from every projection.
    pub fn is_skipped(&self, name_keys: &[String]) -> bool {
        if self.get("swaggerignore") == Some("true") {
            return true;
        }
        name_keys
            .iter()
            .filter_map(|key| self.get(key))
            .any(|value| value == "-")
    }

    /// Whether the field carries the omit-when-empty marker on any name key.
    pub fn is_omitempty(&self, name_keys: &[String]) -> bool {
        name_keys
            .iter()
            .filter_map(|key| self.get(key))
            .any(|value| value.split(',').skip(1).any(|opt| opt.trim() == "omitempty"))
    }

    /// Whether the field carries the visibility marker used by the public projection.
    pub fn has_marker(&self, visibility_key: &str) -> bool {
        self.entries.contains_key(visibility_key)
    }

    /// Whether the JSON encoding of the field is a string (`json:",string"`).
    pub fn is_stringified(&self) -> bool {
        self.get("json")
            .map(|value| value.split(',').skip(1).any(|opt| opt.trim() == "string"))
            .unwrap_or(false)
    }

    pub fn default_value(&self) -> Option<&str> {
        self.get("default")
    }

    pub fn example(&self) -> Option<&str> {
        self.get("example")
    }

    pub fn format(&self) -> Option<&str> {
        self.get("format")
    }

    pub fn swagger_type(&self) -> Option<&str> {
        self.get("swaggertype")
    }

    pub fn is_nullable(&self) -> bool {
        self.get("nullable") == Some("true")
    }

    pub fn enums(&self) -> Vec<String> {
        self.get("enums")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn minimum(&self) -> Option<f64> {
        self.get("minimum").and_then(|v| v.trim().parse().ok())
    }

    pub fn maximum(&self) -> Option<f64> {
        self.get("maximum").and_then(|v| v.trim().parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> Vec<String> {
        vec!["json".to_string(), "column".to_string()]
    }

    #[test]
    fn test_parse_tag_round_trip() {
        let tag = parse_tag(r#"json:"foo,omitempty" public:"view""#);

        let mut expected = BTreeMap::new();
        expected.insert("json".to_string(), "foo,omitempty".to_string());
        expected.insert("public".to_string(), "view".to_string());
        assert_eq!(tag, expected);

        let field_tag = FieldTag::parse(r#"json:"foo,omitempty" public:"view""#);
        assert_eq!(field_tag.property_name(&keys()), Some("foo".to_string()));
    }

    #[test]
    fn test_parse_tag_with_backticks() {
        let tag = parse_tag(r#"`json:"id" db:"user_id"`"#);
        assert_eq!(tag.len(), 2);
        assert_eq!(tag["db"], "user_id");
    }

    #[test]
    fn test_malformed_tokens_are_skipped() {
        let tag = parse_tag(r#"broken json:"name" nocolon "stray" default:"unterminated"#);
        assert_eq!(tag.len(), 1);
        assert_eq!(tag["json"], "name");
    }

    #[test]
    fn test_escaped_quote_in_value() {
        let tag = parse_tag(r#"example:"say \"hi\"""#);
        assert_eq!(tag["example"], r#"say "hi""#);
    }

    #[test]
    fn test_empty_tag() {
        assert!(parse_tag("").is_empty());
        assert!(parse_tag("   ").is_empty());
        assert_eq!(FieldTag::parse("").property_name(&keys()), None);
    }

    #[test]
    fn test_property_name_falls_through_keys() {
        let tag = FieldTag::parse(r#"column:"created_at""#);
        assert_eq!(tag.property_name(&keys()), Some("created_at".to_string()));

        let tag = FieldTag::parse(r#"json:",omitempty""#);
        assert_eq!(tag.property_name(&keys()), None);
        assert!(tag.is_omitempty(&keys()));
    }

    #[test]
    fn test_gorm_column_option() {
        let keys = vec!["gorm".to_string()];
        let tag = FieldTag::parse(r#"gorm:"column:user_id;not null""#);
        assert_eq!(tag.property_name(&keys), Some("user_id".to_string()));
    }

    #[test]
    fn test_skip_markers() {
        assert!(FieldTag::parse(r#"json:"-""#).is_skipped(&keys()));
        assert!(FieldTag::parse(r#"json:"a" swaggerignore:"true""#).is_skipped(&keys()));
        assert!(!FieldTag::parse(r#"json:"-,""#).is_skipped(&keys()));
    }

    #[test]
    fn test_visibility_marker() {
        let tag = FieldTag::parse(r#"json:"bio" public:"view""#);
        assert!(tag.has_marker("public"));
        assert!(!FieldTag::parse(r#"json:"bio""#).has_marker("public"));
    }

    #[test]
    fn test_modifiers() {
        let tag = FieldTag::parse(
            r#"json:"status" enums:"active, blocked" default:"active" minimum:"1" maximum:"x" nullable:"true""#,
        );
        assert_eq!(tag.enums(), vec!["active".to_string(), "blocked".to_string()]);
        assert_eq!(tag.default_value(), Some("active"));
        assert_eq!(tag.minimum(), Some(1.0));
        assert_eq!(tag.maximum(), None);
        assert!(tag.is_nullable());
    }
}
