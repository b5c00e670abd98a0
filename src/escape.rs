use flate2::Crc;
use unicode_casefold::UnicodeCaseFold;

/// Escapes `&`, `<` and `>` for element content such as code blocks.
pub(crate) fn escape_code(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escapes text so it renders literally, quotes included.
pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Normalizes a link reference id: case folded, with embedded line breaks
/// collapsed to one space.
pub(crate) fn normalize_link_id(id: &str) -> String {
    let folded: String = id.chars().case_fold().collect();
    folded.replace(" \n", "\n").replace('\n', " ")
}

/// Builds an obfuscated `mailto:` anchor for `address`.
///
/// Each ASCII character of `mailto:address` is written raw, as a decimal
/// reference or as a hexadecimal reference. The choice is seeded by a CRC-32
/// of the string, so the same address always encodes the same way. `@` is
/// never left raw.
pub(crate) fn encode_email_address(address: &str) -> String {
    let mailto = format!("mailto:{address}");
    let mut crc = Crc::new();
    crc.update(mailto.as_bytes());
    let seed = u64::from(crc.sum()) / mailto.len() as u64;

    let pieces: Vec<String> = mailto
        .chars()
        .enumerate()
        .map(|(key, c)| {
            if !c.is_ascii() {
                return c.to_string();
            }
            let r = (seed * (1 + key as u64)) % 100;
            if r > 90 && c != '@' {
                c.to_string()
            } else if r < 45 {
                format!("&#x{:x};", u32::from(c))
            } else {
                format!("&#{};", u32::from(c))
            }
        })
        .collect();

    let href = pieces.concat();
    let text = pieces[7..].concat();
    format!("<a href=\"{href}\">{text}</a>")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_references(encoded: &str) -> String {
        let mut out = String::new();
        let mut rest = encoded;
        while let Some(start) = rest.find("&#") {
            out.push_str(&rest[..start]);
            let end = rest[start..].find(';').unwrap() + start;
            let body = &rest[start + 2..end];
            let code = match body.strip_prefix('x') {
                Some(hex) => u32::from_str_radix(hex, 16).unwrap(),
                None => body.parse().unwrap(),
            };
            out.push(char::from_u32(code).unwrap());
            rest = &rest[end + 1..];
        }
        out.push_str(rest);
        out
    }

    #[test]
    fn test_escape_code() {
        assert_eq!(escape_code("<a href=\"x\">&</a>"), "&lt;a href=\"x\"&gt;&amp;&lt;/a&gt;");
    }

    #[test]
    fn test_escape_html_quotes() {
        assert_eq!(escape_html("\"<&>\""), "&quot;&lt;&amp;&gt;&quot;");
    }

    #[test]
    fn test_escape_html_keeps_other_text() {
        assert_eq!(escape_html(""), "");
        assert_eq!(escape_html("café 'x' ü"), "café 'x' ü");
        assert_eq!(escape_html("a<b>c"), "a&lt;b&gt;c");
    }

    #[test]
    fn test_normalize_link_id() {
        assert_eq!(normalize_link_id("Foo Bar"), "foo bar");
        assert_eq!(normalize_link_id("Foo \nBar"), "foo bar");
        assert_eq!(normalize_link_id("Foo\nBar"), "foo bar");
        assert_eq!(normalize_link_id("a  b"), "a  b");
        assert_eq!(normalize_link_id("ÉCOLE"), "école");
    }

    #[test]
    fn test_email_encoding_is_deterministic() {
        let first = encode_email_address("user@example.com");
        let second = encode_email_address("user@example.com");
        assert_eq!(first, second);
    }

    #[test]
    fn test_email_encoding_decodes_to_address() {
        let anchor = encode_email_address("user@example.com");
        let href_start = anchor.find("href=\"").unwrap() + 6;
        let href_end = anchor[href_start..].find('"').unwrap() + href_start;
        assert_eq!(decode_references(&anchor[href_start..href_end]), "mailto:user@example.com");
        let text_start = anchor.find('>').unwrap() + 1;
        let text_end = anchor.rfind("</a>").unwrap();
        assert_eq!(decode_references(&anchor[text_start..text_end]), "user@example.com");
    }

    #[test]
    fn test_email_at_sign_is_never_raw() {
        for address in ["a@b.co", "someone@example.org", "x.y+z@host.net"] {
            let anchor = encode_email_address(address);
            assert!(!anchor.contains('@'), "{anchor}");
        }
    }
}
