//! Span-level passes: escapes, code spans, inline HTML, links, images,
//! autolinks, entity encoding, hard breaks, footnote references and
//! abbreviations.

use crate::context::Context;
use crate::escape::{encode_email_address, escape_code, escape_html, normalize_link_id};
use crate::gamut::SpanPass;
use crate::hash::{Boundary, SENTINEL};
use crate::markdown::Markdown;
use crate::patterns::{find, group, replace_all};
use fancy_regex::Captures;
use log::trace;

impl Markdown {
    /// Runs every span pass over `text`.
    pub(crate) fn run_span_gamut(&self, ctx: &mut Context, text: &str) -> String {
        if !ctx.enter() {
            let literal = escape_html(&ctx.unhash(text));
            return ctx.hash(&literal, Boundary::General);
        }
        let mut text = text.to_string();
        for pass in &self.span_gamut {
            text = match pass {
                SpanPass::ParseSpan => self.parse_span(ctx, &text),
                SpanPass::Images => self.do_images(ctx, &text),
                SpanPass::Anchors => self.do_anchors(ctx, &text),
                SpanPass::AutoLinks => self.do_auto_links(ctx, &text),
                SpanPass::AmpsAndAngles => self.encode_amps_and_angles(&text),
                SpanPass::Emphasis => self.resolve_delimiters(ctx, &text, &self.emphasis),
                SpanPass::Strikethrough => {
                    self.resolve_delimiters(ctx, &text, &self.strikethrough)
                }
                SpanPass::FootnoteReferences => self.do_footnote_references(ctx, &text),
                SpanPass::HardBreaks => self.do_hard_breaks(ctx, &text),
                SpanPass::Abbreviations => self.do_abbreviations(ctx, &text),
            };
        }
        ctx.leave();
        text
    }

    /// Hashes backslash escapes, code spans and raw inline tags so later
    /// passes leave them alone.
    pub(crate) fn parse_span(&self, ctx: &mut Context, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(found) = find(&self.patterns.span_token, rest) {
            out.push_str(&rest[..found.start()]);
            let token = found.as_str();
            rest = &rest[found.end()..];

            if let Some(escaped) = token.strip_prefix('\\') {
                let code = escaped.chars().next().map_or(0, u32::from);
                out.push_str(&ctx.hash(&format!("&#{code};"), Boundary::General));
            } else if token.starts_with('`') {
                match code_span_end(rest, token.len()) {
                    Some((code, after)) => {
                        out.push_str(&self.make_code_span(ctx, code));
                        rest = after;
                    }
                    None => out.push_str(token),
                }
            } else {
                out.push_str(&ctx.hash(token, Boundary::General));
            }
        }

        out.push_str(rest);
        out
    }

    fn make_code_span(&self, ctx: &mut Context, code: &str) -> String {
        let code = escape_code(code.trim());
        ctx.hash(&format!("<code>{code}</code>"), Boundary::General)
    }

    pub(crate) fn do_images(&self, ctx: &mut Context, text: &str) -> String {
        let text = replace_all(&self.patterns.image_reference, text, |caps| {
            let whole = group(caps, 1);
            let alt = group(caps, 2);
            let mut id = normalize_link_id(group(caps, 3));
            if id.is_empty() {
                id = normalize_link_id(alt);
            }
            let Some(url) = ctx.urls.get(&id).cloned() else {
                return whole.to_string();
            };
            let mut result = format!(
                "<img src=\"{}\" alt=\"{}\"",
                self.encode_attribute(&url),
                self.encode_attribute(alt)
            );
            if let Some(title) = ctx.titles.get(&id) {
                result.push_str(&format!(" title=\"{}\"", self.encode_attribute(title)));
            }
            result.push_str(&self.config.empty_element_suffix);
            ctx.hash(&result, Boundary::General)
        });

        replace_all(&self.patterns.image_inline, &text, |caps| {
            let alt = group(caps, 2);
            let url = link_url(caps);
            let mut result = format!(
                "<img src=\"{}\" alt=\"{}\"",
                self.encode_attribute(url),
                self.encode_attribute(alt)
            );
            if let Some(title) = caps.get(7) {
                result.push_str(&format!(
                    " title=\"{}\"",
                    self.encode_attribute(title.as_str())
                ));
            }
            result.push_str(&self.config.empty_element_suffix);
            ctx.hash(&result, Boundary::General)
        })
    }

    pub(crate) fn do_anchors(&self, ctx: &mut Context, text: &str) -> String {
        if ctx.in_anchor {
            return text.to_string();
        }
        ctx.in_anchor = true;

        let text = replace_all(&self.patterns.anchor_reference, text, |caps| {
            self.reference_anchor(ctx, group(caps, 1), group(caps, 2), group(caps, 3))
        });

        let text = replace_all(&self.patterns.anchor_inline, &text, |caps| {
            let url = link_url(caps);
            let mut result = format!("<a href=\"{}\"", self.encode_attribute(url));
            if let Some(title) = caps.get(7) {
                result.push_str(&format!(
                    " title=\"{}\"",
                    self.encode_attribute(title.as_str())
                ));
            }
            let link_text = self.run_span_gamut(ctx, group(caps, 2));
            result.push_str(&format!(">{link_text}</a>"));
            ctx.hash(&result, Boundary::General)
        });

        // Shortcuts last, so `[text][id]` and `[text](url)` win.
        let text = replace_all(&self.patterns.anchor_shortcut, &text, |caps| {
            self.reference_anchor(ctx, group(caps, 1), group(caps, 2), "")
        });

        ctx.in_anchor = false;
        text
    }

    fn reference_anchor(&self, ctx: &mut Context, whole: &str, link_text: &str, id: &str) -> String {
        let id = if id.is_empty() { link_text } else { id };
        let id = normalize_link_id(id);
        let Some(url) = ctx.urls.get(&id).cloned() else {
            return whole.to_string();
        };

        let mut result = format!("<a href=\"{}\"", self.encode_attribute(&url));
        if let Some(title) = ctx.titles.get(&id) {
            result.push_str(&format!(" title=\"{}\"", self.encode_attribute(title)));
        }
        let link_text = self.run_span_gamut(ctx, link_text);
        result.push_str(&format!(">{link_text}</a>"));
        ctx.hash(&result, Boundary::General)
    }

    pub(crate) fn do_auto_links(&self, ctx: &mut Context, text: &str) -> String {
        let text = replace_all(&self.patterns.autolink_url, text, |caps| {
            let url = self.encode_attribute(group(caps, 1));
            ctx.hash(&format!("<a href=\"{url}\">{url}</a>"), Boundary::General)
        });
        replace_all(&self.patterns.autolink_email, &text, |caps| {
            let link = encode_email_address(group(caps, 1));
            ctx.hash(&link, Boundary::General)
        })
    }

    /// Encodes `&` that does not start an entity, and every `<`.
    pub(crate) fn encode_amps_and_angles(&self, text: &str) -> String {
        let text = if self.config.no_entities {
            text.replace('&', "&amp;")
        } else {
            replace_all(&self.patterns.bare_ampersand, text, |_| "&amp;".to_string())
        };
        text.replace('<', "&lt;")
    }

    /// Encodes text for a double-quoted attribute value.
    pub(crate) fn encode_attribute(&self, text: &str) -> String {
        self.encode_amps_and_angles(text).replace('"', "&quot;")
    }

    pub(crate) fn do_hard_breaks(&self, ctx: &mut Context, text: &str) -> String {
        replace_all(&self.patterns.hard_break, text, |_| {
            let br = format!("<br{}\n", self.config.empty_element_suffix);
            ctx.hash(&br, Boundary::General)
        })
    }

    /// Replaces `[^id]` with a token resolved when footnotes are appended.
    pub(crate) fn do_footnote_references(&self, ctx: &mut Context, text: &str) -> String {
        if ctx.in_anchor {
            return text.to_string();
        }
        replace_all(&self.patterns.footnote_reference, text, |caps| {
            ctx.footnote_refs.push(group(caps, 1).to_string());
            let token = format!("F{SENTINEL}fn{}{SENTINEL}:", ctx.footnote_refs.len());
            trace!("footnote reference {:?} as {:?}", group(caps, 1), token);
            token
        })
    }

    pub(crate) fn do_abbreviations(&self, ctx: &mut Context, text: &str) -> String {
        let Some(re) = ctx.abbreviation_pattern.take() else {
            return text.to_string();
        };
        let out = replace_all(&re, text, |caps| {
            let word = group(caps, 0);
            match ctx.abbreviations.get(word).cloned() {
                Some(description) if description.is_empty() => {
                    ctx.hash(&format!("<abbr>{word}</abbr>"), Boundary::General)
                }
                Some(description) => {
                    let title = self.encode_attribute(&description);
                    ctx.hash(
                        &format!("<abbr title=\"{title}\">{word}</abbr>"),
                        Boundary::General,
                    )
                }
                None => word.to_string(),
            }
        });
        ctx.abbreviation_pattern = Some(re);
        out
    }
}

/// URL of an inline link or image: the `<...>` form wins when present.
fn link_url<'t>(caps: &Captures<'t>) -> &'t str {
    match group(caps, 3) {
        "" => group(caps, 4),
        bracketed => bracketed,
    }
}

/// Finds the backtick run of exactly `run` characters closing a code span.
/// Returns the code and the text after the closing run.
fn code_span_end(text: &str, run: usize) -> Option<(&str, &str)> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'`' {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && bytes[i] == b'`' {
            i += 1;
        }
        if start > 0 && i - start == run {
            return Some((&text[..start], &text[i..]));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn span(config: Config, text: &str) -> String {
        let markdown = Markdown::new(config).unwrap();
        let mut ctx = Context::new(markdown.config());
        let out = markdown.run_span_gamut(&mut ctx, text);
        ctx.unhash(&out)
    }

    #[test]
    fn test_code_span_end() {
        assert_eq!(code_span_end("a` b", 1), Some(("a", " b")));
        assert_eq!(code_span_end("a``b`c", 1), Some(("a``b", "c")));
        assert_eq!(code_span_end("a`", 2), None);
    }

    #[test]
    fn test_code_span_escapes_and_trims() {
        assert_eq!(
            span(Config::default(), "use `` <a>`b` `` here"),
            "use <code>&lt;a&gt;`b`</code> here"
        );
    }

    #[test]
    fn test_unterminated_code_span_is_literal() {
        assert_eq!(span(Config::default(), "a `b"), "a `b");
    }

    #[test]
    fn test_backslash_escapes() {
        assert_eq!(span(Config::default(), r"\*not\*"), "&#42;not&#42;");
        assert_eq!(span(Config::basic(), r"a\|b"), r"a\|b");
        assert_eq!(span(Config::default(), r"a\|b"), "a&#124;b");
    }

    #[test]
    fn test_inline_html_passes_through() {
        assert_eq!(
            span(Config::default(), "<span class=\"x\">*a*</span> & b"),
            "<span class=\"x\"><em>a</em></span> &amp; b"
        );
    }

    #[test]
    fn test_no_markup_escapes_tags() {
        let mut config = Config::default();
        config.no_markup = true;
        assert_eq!(span(config, "<b>x</b>"), "&lt;b>x&lt;/b>");
    }

    #[test]
    fn test_entities_are_kept() {
        assert_eq!(span(Config::default(), "&copy; & &#169;"), "&copy; &amp; &#169;");
        let mut config = Config::default();
        config.no_entities = true;
        assert_eq!(span(config, "&copy;"), "&amp;copy;");
    }

    #[test]
    fn test_inline_link_with_title() {
        assert_eq!(
            span(Config::default(), "[a *b*](/u \"T\")"),
            "<a href=\"/u\" title=\"T\">a <em>b</em></a>"
        );
    }

    #[test]
    fn test_inline_link_with_parentheses_in_url() {
        assert_eq!(
            span(Config::default(), "[w](http://x.org/a_(b))"),
            "<a href=\"http://x.org/a_(b)\">w</a>"
        );
    }

    #[test]
    fn test_predefined_reference_link() {
        let mut config = Config::default();
        config.predefined_links.insert("site".into(), "http://e.com/?a&b".into());
        config.predefined_titles.insert("site".into(), "Say \"hi\"".into());
        assert_eq!(
            span(config, "[Site] and [x][site]"),
            "<a href=\"http://e.com/?a&amp;b\" title=\"Say &quot;hi&quot;\">Site</a> and \
             <a href=\"http://e.com/?a&amp;b\" title=\"Say &quot;hi&quot;\">x</a>"
        );
    }

    #[test]
    fn test_unresolved_reference_is_literal() {
        assert_eq!(span(Config::default(), "[a][nope]"), "[a][nope]");
    }

    #[test]
    fn test_anchors_do_not_nest() {
        let mut config = Config::default();
        config.predefined_links.insert("b".into(), "/b".into());
        assert_eq!(
            span(config, "[see [b]](/a)"),
            "<a href=\"/a\">see [b]</a>"
        );
    }

    #[test]
    fn test_inline_image() {
        assert_eq!(
            span(Config::default(), "![alt \"x\"](/i.png 'T')"),
            "<img src=\"/i.png\" alt=\"alt &quot;x&quot;\" title=\"T\" />"
        );
    }

    #[test]
    fn test_url_autolink() {
        assert_eq!(
            span(Config::default(), "<http://e.com/?a&b>"),
            "<a href=\"http://e.com/?a&amp;b\">http://e.com/?a&amp;b</a>"
        );
    }

    #[test]
    fn test_email_autolink_is_obfuscated() {
        let out = span(Config::default(), "<me@example.com>");
        assert!(out.starts_with("<a href=\""));
        assert!(!out.contains("me@example.com"));
        assert_eq!(out, encode_email_address("me@example.com"));
    }

    #[test]
    fn test_hard_breaks() {
        assert_eq!(span(Config::default(), "a  \nb\nc"), "a<br />\nb<br />\nc");
        let mut config = Config::default();
        config.empty_element_suffix = ">".into();
        assert_eq!(span(config, "a\nb"), "a<br>\nb");
    }

    #[test]
    fn test_abbreviations() {
        let mut config = Config::default();
        config.predefined_abbreviations.insert("HTML".into(), "Hyper Text".into());
        config.predefined_abbreviations.insert("W3C".into(), "".into());
        let markdown = Markdown::new(config).unwrap();
        let mut ctx = Context::new(markdown.config());
        ctx.compile_abbreviations();
        let out = markdown.run_span_gamut(&mut ctx, "HTML by the W3C, not HTMLX");
        assert_eq!(
            ctx.unhash(&out),
            "<abbr title=\"Hyper Text\">HTML</abbr> by the <abbr>W3C</abbr>, not HTMLX"
        );
    }

    #[test]
    fn test_footnote_reference_token() {
        let markdown = Markdown::new(Config::default()).unwrap();
        let mut ctx = Context::new(markdown.config());
        let out = markdown.run_span_gamut(&mut ctx, "a[^note]");
        assert_eq!(out, "aF\u{1A}fn1\u{1A}:");
        assert_eq!(ctx.footnote_refs, vec!["note".to_string()]);
    }

    #[test]
    fn test_basic_flavor_ignores_footnote_references() {
        assert_eq!(span(Config::basic(), "a[^1]"), "a[^1]");
    }
}
