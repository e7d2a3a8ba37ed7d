//! Compose variable interpolation
//!
//! Implements the substitution forms compose supports: `${VAR}`,
//! `${VAR:-default}` (default when unset or empty), `${VAR-default}`
//! (default only when unset), bare `$VAR` and the `$$` escape. References
//! that cannot be resolved are left in the text as-is.

use std::collections::BTreeMap;

/// Substitute `$`-references in `input` using `vars`
pub fn interpolate(input: &str, vars: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if ch != '$' {
            out.push(ch);
            continue;
        }

        match chars.peek() {
            // `$$` escapes to a literal dollar
            Some((_, '$')) => {
                chars.next();
                out.push('$');
            }
            // `${...}` braced reference
            Some((start, '{')) => {
                let start = *start;
                let rest = &input[start + 1..];
                match rest.find('}') {
                    Some(end) => {
                        let inner = &rest[..end];
                        match resolve_braced(inner, vars) {
                            Some(value) => out.push_str(&value),
                            // unresolved or malformed, keep the literal text
                            None => {
                                out.push('$');
                                out.push('{');
                                out.push_str(inner);
                                out.push('}');
                            }
                        }
                        // skip `{`, the inner text and `}`
                        for _ in 0..inner.chars().count() + 2 {
                            chars.next();
                        }
                    }
                    // unterminated `${`, keep everything literal
                    None => {
                        out.push('$');
                        let _ = idx;
                    }
                }
            }
            // bare `$VAR`
            Some((start, c)) if c.is_ascii_alphabetic() || *c == '_' => {
                let start = *start;
                let name_len = input[start..]
                    .chars()
                    .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                    .count();
                let name = &input[start..start + name_len];
                match vars.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('$');
                        out.push_str(name);
                    }
                }
                for _ in 0..name_len {
                    chars.next();
                }
            }
            // lone `$` or `$` followed by something that cannot start a name
            _ => out.push('$'),
        }
    }

    out
}

/// Resolve the inside of a `${...}` reference, `None` leaves it literal
fn resolve_braced(inner: &str, vars: &BTreeMap<String, String>) -> Option<String> {
    let name_len = inner
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .count();
    let (name, rest) = inner.split_at(name_len);
    if !valid_name(name) {
        return None;
    }

    if let Some(default) = rest.strip_prefix(":-") {
        // default applies when unset or empty
        return match vars.get(name) {
            Some(v) if !v.is_empty() => Some(v.clone()),
            _ => Some(default.to_string()),
        };
    }
    if let Some(default) = rest.strip_prefix('-') {
        // default applies only when unset
        return match vars.get(name) {
            Some(v) => Some(v.clone()),
            None => Some(default.to_string()),
        };
    }
    if !rest.is_empty() {
        return None;
    }
    vars.get(name).cloned()
}

fn valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_braced_reference() {
        let v = vars(&[("TAG", "1.2.3")]);
        assert_eq!(interpolate("image: app:${TAG}", &v), "image: app:1.2.3");
    }

    #[test]
    fn test_bare_reference() {
        let v = vars(&[("HOST", "db")]);
        assert_eq!(interpolate("host: $HOST:5432", &v), "host: db:5432");
    }

    #[test]
    fn test_default_when_unset_or_empty() {
        let v = vars(&[("EMPTY", "")]);
        assert_eq!(interpolate("${MISSING:-x}", &v), "x");
        assert_eq!(interpolate("${EMPTY:-x}", &v), "x");
    }

    #[test]
    fn test_default_only_when_unset() {
        let v = vars(&[("EMPTY", "")]);
        assert_eq!(interpolate("${MISSING-x}", &v), "x");
        assert_eq!(interpolate("${EMPTY-x}", &v), "");
    }

    #[test]
    fn test_unresolved_left_literal() {
        let v = BTreeMap::new();
        assert_eq!(interpolate("${MISSING}", &v), "${MISSING}");
        assert_eq!(interpolate("$MISSING", &v), "$MISSING");
    }

    #[test]
    fn test_dollar_escape() {
        let v = vars(&[("X", "y")]);
        assert_eq!(interpolate("cost: $$5 and $${X}", &v), "cost: $5 and ${X}");
    }

    #[test]
    fn test_unterminated_brace_left_literal() {
        let v = vars(&[("X", "y")]);
        assert_eq!(interpolate("${X", &v), "${X");
    }

    #[test]
    fn test_lone_dollar() {
        let v = BTreeMap::new();
        assert_eq!(interpolate("a $ b $", &v), "a $ b $");
        assert_eq!(interpolate("100$!", &v), "100$!");
    }

    #[test]
    fn test_malformed_name_left_literal() {
        let v = vars(&[("X", "y")]);
        assert_eq!(interpolate("${1BAD}", &v), "${1BAD}");
        assert_eq!(interpolate("${}", &v), "${}");
    }

    #[test]
    fn test_default_may_contain_colon() {
        let v = BTreeMap::new();
        assert_eq!(
            interpolate("${URL:-http://localhost:8080}", &v),
            "http://localhost:8080"
        );
    }
}
