//! Predefined entity escaping

use crate::error::{Error, ErrorKind, Result, Span};

/// Characters that must not appear raw in text or attribute values
pub const ENTITIES: [(char, &str); 5] = [
    ('&', "&amp;"),
    ('<', "&lt;"),
    ('>', "&gt;"),
    ('\'', "&apos;"),
    ('"', "&quot;"),
];

fn entity_for(ch: char) -> Option<&'static str> {
    ENTITIES
        .iter()
        .find(|(raw, _)| *raw == ch)
        .map(|(_, entity)| *entity)
}

/// Replace the five special characters with their entity references
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    escape_into(text, &mut out);
    out
}

/// Escape `text` onto the end of `out`
pub fn escape_into(text: &str, out: &mut String) {
    for ch in text.chars() {
        match entity_for(ch) {
            Some(entity) => out.push_str(entity),
            None => out.push(ch),
        }
    }
}

/// Decode named entities and numeric character references
///
/// ```
/// use zbind::xml::escape::unescape;
///
/// assert_eq!(unescape("a &lt; b &amp;&#38;&#x26;").unwrap(), "a < b &&&");
/// assert!(unescape("&nbsp;").is_err());
/// ```
pub fn unescape(text: &str) -> Result<String> {
    if !text.contains('&') {
        return Ok(text.to_string());
    }

    let mut result = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        let (before, after) = rest.split_at(amp);
        result.push_str(before);

        let Some(end) = after.find(';') else {
            return Err(invalid_entity(after));
        };
        let entity = after.get(1..end).unwrap_or_default();
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => decode_numeric_entity(entity),
        };
        match decoded {
            Some(ch) => result.push(ch),
            None => return Err(invalid_entity(after.get(..=end).unwrap_or(after))),
        }
        rest = after.get(end + 1..).unwrap_or_default();
    }
    result.push_str(rest);
    Ok(result)
}

fn decode_numeric_entity(entity: &str) -> Option<char> {
    let digits = entity.strip_prefix('#')?;
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<u32>().ok()?,
    };
    char::from_u32(code)
}

fn invalid_entity(found: &str) -> Error {
    let shown: String = found.chars().take(16).collect();
    Error::with_message(
        ErrorKind::MalformedDocument,
        Span::empty(),
        format!("invalid xml entity `{shown}`"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_all_entities() {
        assert_eq!(
            escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &apos;Jerry&apos;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_escape_does_not_double_escape() {
        assert_eq!(escape("&lt;"), "&amp;lt;");
        assert_eq!(unescape(&escape("&lt;")).unwrap(), "&lt;");
    }

    #[test]
    fn test_escape_plain_text_unchanged() {
        assert_eq!(escape("plain text"), "plain text");
        assert_eq!(escape(""), "");
    }

    #[test]
    fn test_unescape_named_and_numeric() {
        assert_eq!(unescape("&amp;&lt;&gt;&apos;&quot;").unwrap(), "&<>'\"");
        assert_eq!(unescape("&#65;&#x42;&#X43;").unwrap(), "ABC");
        assert_eq!(unescape("caf&#233;").unwrap(), "café");
    }

    #[test]
    fn test_unescape_rejects_unknown_entities() {
        let err = unescape("a &copy; b").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::MalformedDocument);
        assert!(err.message().contains("&copy;"));

        assert!(unescape("dangling &amp").is_err());
        assert!(unescape("&#xZZ;").is_err());
        assert!(unescape("&#xD800;").is_err());
    }
}
