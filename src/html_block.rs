//! Raw HTML block detection.
//!
//! Two scanners call each other. The Markdown-side scanner walks text
//! looking for block tags, comments, code spans and code blocks; when it
//! meets a block tag it hands the subtree to the HTML-side scanner, which
//! balances tags of the same name and hashes the region. An opening tag
//! carrying `markdown="1"` sends its content back to the Markdown side.

use crate::context::Context;
use crate::hash::Boundary;
use crate::markdown::Markdown;
use crate::patterns::{captures, find, group, is_match, replace_all};
use crate::text::{last_line_indent, outdent_spaces};
use log::{trace, warn};

impl Markdown {
    /// Hashes every raw HTML block of `text` so the block gamut skips it.
    pub(crate) fn hash_html_blocks(&self, ctx: &mut Context, text: &str) -> String {
        if self.config.no_markup {
            return text.to_string();
        }
        ctx.unbalanced.clear();
        let (parsed, _) = self.html_in_markdown(ctx, text, 0, "", false);
        ctx.unbalanced.clear();
        parsed
    }

    /// Copies Markdown text through, hashing the HTML blocks it contains.
    ///
    /// With a non-empty `enclosing` tag name, stops before the first
    /// unmatched closing tag of that name and returns the rest. In span
    /// mode, every line break is guarded by an empty placeholder so the
    /// content never forms paragraphs or block elements.
    fn html_in_markdown<'t>(
        &self,
        ctx: &mut Context,
        text: &'t str,
        indent: usize,
        enclosing: &str,
        span: bool,
    ) -> (String, &'t str) {
        if text.is_empty() {
            return (String::new(), "");
        }
        let scanner = match ctx.scanner(
            &self.patterns,
            indent,
            enclosing,
            span,
            self.config.tab_width,
        ) {
            Ok(scanner) => scanner,
            Err(err) => {
                warn!("HTML block scanner unavailable, leaving text as is: {}", err);
                return (text.to_string(), "");
            }
        };
        let patterns = &self.patterns;

        let mut depth: isize = 0;
        let mut parsed = String::with_capacity(text.len());
        let mut rest = text;

        loop {
            let current = rest;
            let found = find(&scanner, current);
            let before = found.as_ref().map_or(current, |m| &current[..m.start()]);
            if span {
                let void = ctx.hash("", Boundary::Separator);
                parsed.push_str(&void);
                parsed.push_str(&before.replace('\n', &format!("{void}\n")));
                parsed.push_str(&void);
            } else {
                parsed.push_str(before);
            }

            let Some(found) = found else {
                rest = "";
                break;
            };
            let tag = found.as_str();
            let tag_and_rest = &current[found.start()..];
            rest = &current[found.end()..];
            let second = tag.as_bytes().get(1).copied();

            if tag.starts_with('`') {
                match code_span_close(rest, tag.len()) {
                    Some(end) => {
                        parsed.push_str(tag);
                        parsed.push_str(&rest[..end]);
                        rest = &rest[end..];
                    }
                    None => parsed.push_str(tag),
                }
            } else if opens_fence(tag, indent) {
                let fence = tag.trim_matches(|c| c == ' ' || c == '\n');
                match fence_close(rest, fence.len(), indent) {
                    Some(end) => {
                        parsed.push_str(tag);
                        parsed.push_str(&rest[..end]);
                        rest = &rest[end..];
                    }
                    None => parsed.push_str(tag),
                }
            } else if tag.starts_with('\n') || tag.starts_with(' ') {
                // Indented code; the block gamut handles it later.
                parsed.push_str(tag);
            } else if is_match(&patterns.block_tag_start, tag)
                || (is_match(&patterns.context_tag_start, tag)
                    && ends_on_blank_line(&parsed)
                    && is_match(&patterns.newline_after_tag, rest))
            {
                let markdown_attribute = patterns.tags.markdown_attribute;
                match self.html_in_html(ctx, tag_and_rest, Boundary::Block, markdown_attribute) {
                    Some((block, remaining)) => {
                        parsed.push_str("\n\n");
                        parsed.push_str(&block);
                        parsed.push_str("\n\n");
                        rest = remaining;
                    }
                    None => {
                        parsed.push('<');
                        rest = &tag_and_rest[1..];
                    }
                }
            } else if patterns
                .clean_tag_start
                .as_ref()
                .is_some_and(|re| is_match(re, tag))
                || second == Some(b'!')
                || second == Some(b'?')
            {
                match self.html_in_html(ctx, tag_and_rest, Boundary::Clean, false) {
                    Some((block, remaining)) => {
                        parsed.push_str(&block);
                        rest = remaining;
                    }
                    None => {
                        parsed.push('<');
                        rest = &tag_and_rest[1..];
                    }
                }
            } else if !enclosing.is_empty() && tag_has_name(tag, enclosing) {
                if second == Some(b'/') {
                    depth -= 1;
                } else if !is_self_closing(tag) {
                    depth += 1;
                }
                if depth < 0 {
                    rest = tag_and_rest;
                    break;
                }
                parsed.push_str(tag);
            } else {
                parsed.push_str(tag);
            }
        }

        (parsed, rest)
    }

    /// Consumes one balanced HTML element from the start of `text` and
    /// hashes it with `boundary`. Returns `None` when the element never
    /// closes.
    fn html_in_html<'t>(
        &self,
        ctx: &mut Context,
        text: &'t str,
        boundary: Boundary,
        markdown_attribute: bool,
    ) -> Option<(String, &'t str)> {
        if text.is_empty() {
            return Some((String::new(), ""));
        }
        // Retrying an element that never closed costs a full scan each time.
        let start = text.as_ptr() as usize;
        if ctx.unbalanced.contains(&start) {
            return None;
        }
        let patterns = &self.patterns;
        let base = tag_name(text);

        let mut depth: isize = 0;
        let mut block_text = String::new();
        let mut parsed = String::new();
        let mut rest = text;

        loop {
            let Some(found) = find(&patterns.html_tag, rest) else {
                trace!("unbalanced HTML at {:?}, passing one character through", base);
                ctx.unbalanced.insert(start);
                return None;
            };
            block_text.push_str(&rest[..found.start()]);
            let tag = found.as_str();
            rest = &rest[found.end()..];
            let second = tag.as_bytes().get(1).copied();

            if is_match(&patterns.auto_close_tag, tag)
                || second == Some(b'!')
                || second == Some(b'?')
            {
                block_text.push_str(tag);
            } else {
                if tag_has_name(tag, base) {
                    if second == Some(b'/') {
                        depth -= 1;
                    } else if !is_self_closing(tag) {
                        depth += 1;
                    }
                }

                let mode = if markdown_attribute {
                    captures(&patterns.markdown_attribute, tag).map(|caps| {
                        format!("{}{}", group(&caps, 2), group(&caps, 3))
                    })
                } else {
                    None
                };
                match mode {
                    Some(mode) if matches!(mode.as_str(), "1" | "block" | "span") && ctx.enter() => {
                        let tag = replace_all(&patterns.markdown_attribute, tag, |_| String::new());
                        let span = mode == "span"
                            || (mode != "block" && is_match(&patterns.contain_span_tag_start, &tag));
                        let indent = last_line_indent(&block_text);

                        block_text.push_str(&tag);
                        parsed.push_str(&ctx.hash(&block_text, boundary));
                        block_text.clear();

                        let (inner, remaining) =
                            self.html_in_markdown(ctx, rest, indent, tag_name(&tag), span);
                        ctx.leave();
                        rest = remaining;

                        let inner = if indent > 0 {
                            outdent_spaces(&inner, indent)
                        } else {
                            inner
                        };
                        if span {
                            parsed.push_str(&inner);
                        } else {
                            parsed.push_str("\n\n");
                            parsed.push_str(&inner);
                            parsed.push_str("\n\n");
                        }
                    }
                    _ => block_text.push_str(tag),
                }
            }

            if depth <= 0 {
                break;
            }
        }

        parsed.push_str(&ctx.hash(&block_text, boundary));
        Some((parsed, rest))
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Name of the tag opening `text`: the run after `<` of word characters,
/// `:` and `$`.
fn tag_name(text: &str) -> &str {
    let Some(after) = text.strip_prefix('<') else {
        return "";
    };
    let end = after
        .find(|c: char| !(is_word_char(c) || c == ':' || c == '$'))
        .unwrap_or(after.len());
    &after[..end]
}

/// Whether `tag` opens or closes an element called `name`, with a word
/// boundary right after the name.
fn tag_has_name(tag: &str, name: &str) -> bool {
    let Some(after) = tag.strip_prefix('<') else {
        return false;
    };
    let after = after.strip_prefix('/').unwrap_or(after);
    let Some(tail) = after.strip_prefix(name) else {
        return false;
    };
    let word_before = name.chars().last().is_some_and(is_word_char);
    let word_after = tail.chars().next().is_some_and(is_word_char);
    word_before != word_after
}

fn is_self_closing(tag: &str) -> bool {
    tag.len() >= 2 && tag.as_bytes()[tag.len() - 2] == b'/'
}

/// Whether the last line of `parsed` holds nothing but spaces.
fn ends_on_blank_line(parsed: &str) -> bool {
    parsed
        .rsplit('\n')
        .next()
        .is_none_or(|line| line.bytes().all(|b| b == b' '))
}

/// Whether a scanner match is a fence line: an optional newline, at most
/// `indent + 3` spaces, then a tilde.
fn opens_fence(tag: &str, indent: usize) -> bool {
    let line = tag.strip_prefix('\n').unwrap_or(tag);
    let spaces = line.bytes().take_while(|&b| b == b' ').count();
    spaces <= indent + 3 && line[spaces..].starts_with('~')
}

/// End offset of the line closing a fence of `fence_len` tildes. The
/// closing line comes after at least one content line.
fn fence_close(text: &str, fence_len: usize, indent: usize) -> Option<usize> {
    let mut offset = 0;
    for (index, line) in text.split_inclusive('\n').enumerate() {
        let start = offset;
        offset += line.len();
        if index == 0 {
            continue;
        }
        let Some(body) = line.strip_suffix('\n') else {
            break;
        };
        let spaces = body.bytes().take_while(|&b| b == b' ').count();
        if spaces > indent {
            continue;
        }
        let marker = &body[spaces..];
        let tildes = marker.bytes().take_while(|&b| b == b'~').count();
        if tildes >= fence_len && marker[tildes..].bytes().all(|b| b == b' ') {
            return Some(start + line.len());
        }
    }
    None
}

/// End offset of the backtick run of exactly `run` characters closing a
/// code span, without crossing a blank line.
fn code_span_close(text: &str, run: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' if bytes.get(i + 1) == Some(&b'\n') => return None,
            b'`' => {
                let start = i;
                while i < bytes.len() && bytes[i] == b'`' {
                    i += 1;
                }
                if i - start == run {
                    return Some(i);
                }
            }
            _ => i += 1,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn hashed(config: Config, text: &str) -> (String, Context, Markdown) {
        let markdown = Markdown::new(config).unwrap();
        let mut ctx = Context::new(markdown.config());
        let out = markdown.hash_html_blocks(&mut ctx, text);
        (out, ctx, markdown)
    }

    #[test]
    fn test_tag_helpers() {
        assert_eq!(tag_name("<div class=\"a\">"), "div");
        assert_eq!(tag_name("<!-- x -->"), "");
        assert!(tag_has_name("<div>", "div"));
        assert!(tag_has_name("</div>", "div"));
        assert!(!tag_has_name("<divx>", "div"));
        assert!(is_self_closing("<div/>"));
        assert!(!is_self_closing("<div>"));
    }

    #[test]
    fn test_fence_helpers() {
        assert!(opens_fence("\n~~~\n", 0));
        assert!(!opens_fence("    ~~~\n", 0));
        assert_eq!(fence_close("a\n~~~~\nrest", 3, 0), Some(7));
        assert_eq!(fence_close("~~~\n", 3, 0), None);
        assert_eq!(fence_close("a\n~~\n", 3, 0), None);
    }

    #[test]
    fn test_code_span_close_stops_at_blank_line() {
        assert_eq!(code_span_close("a <div> `b", 1), Some(9));
        assert_eq!(code_span_close("a\n\n`", 1), None);
    }

    #[test]
    fn test_block_is_hashed_and_padded() {
        let (out, ctx, _) = hashed(Config::default(), "<div>\n*a*\n</div>\n\nText\n");
        assert_eq!(out, "\n\nB\u{1A}1B\n\n\n\nText\n");
        assert_eq!(ctx.unhash("B\u{1A}1B"), "<div>\n*a*\n</div>");
    }

    #[test]
    fn test_nested_same_name_tags_balance() {
        let (out, ctx, _) = hashed(Config::default(), "<div><div>x</div></div>\ny\n");
        assert_eq!(ctx.unhash(&out), "\n\n<div><div>x</div></div>\n\n\ny\n");
    }

    #[test]
    fn test_inline_tags_are_left_alone() {
        let (out, _, _) = hashed(Config::default(), "a <span>b</span>\n");
        assert_eq!(out, "a <span>b</span>\n");
    }

    #[test]
    fn test_comment_is_clean() {
        let (out, ctx, _) = hashed(Config::default(), "<!-- note -->\n");
        assert_eq!(out, "C\u{1A}1C\n");
        assert_eq!(ctx.unhash(&out), "<!-- note -->\n");
    }

    #[test]
    fn test_unbalanced_block_passes_first_character() {
        let (out, _, _) = hashed(Config::default(), "<div>\nopen\n");
        assert_eq!(out, "<div>\nopen\n");
    }

    #[test]
    fn test_tag_inside_code_span_is_ignored() {
        let (out, _, _) = hashed(Config::default(), "`<div>` x\n");
        assert_eq!(out, "`<div>` x\n");
    }

    #[test]
    fn test_markdown_attribute_reenters_markdown() {
        let (out, ctx, _) = hashed(
            Config::default(),
            "<div markdown=\"1\">\n*a*\n</div>\n",
        );
        let resolved = ctx.unhash(&out);
        assert!(resolved.contains("<div>"));
        assert!(resolved.contains("\n\n\n*a*\n\n\n"));
        assert!(!resolved.contains("markdown="));
    }

    fn convert(text: &str) -> String {
        Markdown::new(Config::default()).unwrap().transform(text)
    }

    #[test]
    fn test_markdown_span_mode_keeps_one_block() {
        let html = convert("<div markdown=\"span\">*a*\n\nb</div>\n");
        assert_eq!(html.trim_end(), "<div><em>a</em><br />\n<br />\nb</div>");
    }

    #[test]
    fn test_markdown_block_mode_forms_paragraphs() {
        let html = convert("<p markdown=\"block\">*a*\n\nb</p>\n");
        assert!(html.contains("<p><em>a</em></p>"), "{html}");
        assert!(html.contains("<p>b</p>"), "{html}");
        assert!(!html.contains("markdown="));
    }

    #[test]
    fn test_span_tag_defaults_to_span_mode() {
        let html = convert("<p markdown=\"1\">*a*\n\nb</p>\n");
        assert_eq!(html.trim_end(), "<p><em>a</em><br />\n<br />\nb</p>");
    }

    #[test]
    fn test_indented_markdown_region_is_outdented() {
        let html = convert("<div>\n    <div markdown=\"1\">\n    *a*\n    </div>\n</div>\n");
        assert!(html.contains("<p><em>a</em></p>"), "{html}");
        assert!(!html.contains("<pre>"), "{html}");
    }

    #[test]
    fn test_unclosed_markdown_region_stays_literal() {
        let text = "<div markdown=\"1\">\n*a*\n";
        let (out, ctx, _) = hashed(Config::default(), text);
        assert_eq!(out, text);
        assert!(ctx.unbalanced.is_empty());
    }

    #[test]
    fn test_stray_angle_bracket_stops_at_blank_line() {
        let (out, _, _) = hashed(Config::default(), "a<b x\n\n<p>para</p>\n");
        assert_eq!(out, "a<b x\n\n\n\nB\u{1A}1B\n\n\n");
        let html = convert("a<b x\n\n<div>\n*raw*\n</div>\n");
        assert!(html.contains("\n\n<div>\n*raw*\n</div>\n"), "{html}");
    }

    #[test]
    fn test_markdown_attribute_ignored_in_basic() {
        let (out, ctx, _) = hashed(Config::basic(), "<div markdown=\"1\">\n*a*\n</div>\n");
        assert!(ctx.unhash(&out).contains("<div markdown=\"1\">\n*a*\n</div>"));
    }

    #[test]
    fn test_context_tag_needs_own_line() {
        let (out, _, _) = hashed(Config::default(), "a <ins>b</ins>\n");
        assert_eq!(out, "a <ins>b</ins>\n");
        let (out, ctx, _) = hashed(Config::default(), "<ins>\nb\n</ins>\n");
        assert_eq!(ctx.unhash(&out), "\n\n<ins>\nb\n</ins>\n\n\n");
    }

    #[test]
    fn test_no_markup_skips_hashing() {
        let mut config = Config::default();
        config.no_markup = true;
        let (out, _, _) = hashed(config, "<div>x</div>\n");
        assert_eq!(out, "<div>x</div>\n");
    }
}
