//! Block-level passes and paragraph formation.

use crate::context::Context;
use crate::escape::{escape_code, escape_html};
use crate::gamut::BlockPass;
use crate::hash::{Boundary, HashStore};
use crate::markdown::Markdown;
use crate::patterns::{group, replace_all, ListPatterns};
use crate::text::{indent_lines, outdent, trim_newlines};
use log::trace;

impl Markdown {
    /// Hashes the raw HTML of a nested block, then runs the block passes.
    pub(crate) fn run_block_gamut(&self, ctx: &mut Context, text: &str) -> String {
        if !ctx.enter() {
            return self.literal_paragraph(ctx, text);
        }
        let text = self.hash_html_blocks(ctx, text);
        let html = self.run_basic_block_gamut(ctx, &text);
        ctx.leave();
        html
    }

    /// Runs the block passes on text whose HTML blocks are already hashed.
    pub(crate) fn run_basic_block_gamut(&self, ctx: &mut Context, text: &str) -> String {
        let mut text = text.to_string();
        for pass in &self.block_gamut {
            trace!("block pass {:?}", pass);
            text = match pass {
                BlockPass::FencedCodeBlocks => self.do_fenced_code_blocks(ctx, &text),
                BlockPass::Headers => self.do_headers(ctx, &text),
                BlockPass::Tables => self.do_tables(ctx, &text),
                BlockPass::HorizontalRules => self.do_horizontal_rules(ctx, &text),
                BlockPass::Lists => self.do_lists(ctx, &text),
                BlockPass::DefinitionLists => self.do_definition_lists(ctx, &text),
                BlockPass::CodeBlocks => self.do_code_blocks(ctx, &text),
                BlockPass::BlockQuotes => self.do_block_quotes(ctx, &text),
            };
        }
        self.form_paragraphs(ctx, &text)
    }

    /// Renders `text` as one escaped paragraph. Used once the nesting guard
    /// has tripped.
    pub(crate) fn literal_paragraph(&self, ctx: &Context, text: &str) -> String {
        let text = ctx.unhash(trim_newlines(text));
        if text.is_empty() {
            return String::new();
        }
        format!("<p>{}</p>", escape_html(&text))
    }

    pub(crate) fn do_headers(&self, ctx: &mut Context, text: &str) -> String {
        let text = replace_all(&self.patterns.setext_header, text, |caps| {
            let content = group(caps, 1);
            let underline = group(caps, 3);
            // `-` under a lone dash is an empty list item, not a header.
            if underline == "-" && (content == "-" || content.starts_with("- ")) {
                return group(caps, 0).to_string();
            }
            let level = if underline.starts_with('=') { 1 } else { 2 };
            self.header(ctx, level, content, group(caps, 2))
        });

        replace_all(&self.patterns.atx_header, &text, |caps| {
            let level = group(caps, 1).len();
            self.header(ctx, level, group(caps, 2), group(caps, 3))
        })
    }

    fn header(&self, ctx: &mut Context, level: usize, content: &str, id: &str) -> String {
        let attribute = if id.is_empty() {
            String::new()
        } else {
            format!(" id=\"{id}\"")
        };
        let content = self.run_span_gamut(ctx, content);
        let block = format!("<h{level}{attribute}>{content}</h{level}>");
        format!("\n{}\n\n", ctx.hash(&block, Boundary::Block))
    }

    pub(crate) fn do_horizontal_rules(&self, ctx: &mut Context, text: &str) -> String {
        replace_all(&self.patterns.horizontal_rule, text, |_| {
            let rule = format!("<hr{}", self.config.empty_element_suffix);
            format!("\n{}\n", ctx.hash(&rule, Boundary::Block))
        })
    }

    /// Forms `<ul>` and `<ol>` lists. Outside a list, a list must start
    /// after a blank line; inside one, it may start on any line.
    pub(crate) fn do_lists(&self, ctx: &mut Context, text: &str) -> String {
        let mut text = text.to_string();
        for list in &self.patterns.lists {
            let re = if ctx.list_level > 0 {
                &list.nested
            } else {
                &list.top_level
            };
            text = replace_all(re, &text, |caps| self.list_block(ctx, list, group(caps, 1)));
        }
        text
    }

    fn list_block(&self, ctx: &mut Context, list: &ListPatterns, whole: &str) -> String {
        let block = if ctx.enter() {
            let items = self.process_list_items(ctx, list, &format!("{whole}\n"));
            ctx.leave();
            let tag = list.kind.tag();
            format!("<{tag}>\n{items}</{tag}>")
        } else {
            self.literal_paragraph(ctx, whole)
        };
        format!("\n{}\n\n", ctx.hash(&block, Boundary::Block))
    }

    fn process_list_items(&self, ctx: &mut Context, list: &ListPatterns, text: &str) -> String {
        ctx.list_level += 1;

        let trimmed = text.trim_end_matches('\n');
        let text = if text.len() - trimmed.len() >= 2 {
            format!("{trimmed}\n")
        } else {
            text.to_string()
        };

        let tab_width = self.config.tab_width;
        let items = replace_all(&list.item, &text, |caps| {
            let leading_line = !group(caps, 1).is_empty();
            let leading_space = group(caps, 2);
            let marker_space = group(caps, 3);
            let item = group(caps, 4);
            let tailing_blank_line = !group(caps, 5).is_empty();

            let html = if leading_line || tailing_blank_line || item.contains("\n\n") {
                let item = format!("{leading_space}{}{item}", " ".repeat(marker_space.len()));
                self.run_block_gamut(ctx, &format!("{}\n", outdent(&item, tab_width)))
            } else {
                let item = self.do_lists(ctx, &outdent(item, tab_width));
                self.run_span_gamut(ctx, item.trim_end_matches('\n'))
            };
            format!("<li>{html}</li>\n")
        });

        ctx.list_level -= 1;
        items
    }

    pub(crate) fn do_code_blocks(&self, ctx: &mut Context, text: &str) -> String {
        replace_all(&self.patterns.code_block, text, |caps| {
            let code = outdent(group(caps, 1), self.config.tab_width);
            let code = escape_code(&code);
            let block = format!("<pre><code>{}\n</code></pre>", trim_newlines(&code));
            format!("\n\n{}\n\n", ctx.hash(&block, Boundary::Block))
        })
    }

    pub(crate) fn do_fenced_code_blocks(&self, ctx: &mut Context, text: &str) -> String {
        replace_all(&self.patterns.fenced_code_block, text, |caps| {
            let code = escape_code(group(caps, 2));
            let body = code.trim_start_matches('\n');
            let breaks = code.len() - body.len();
            let br = format!("<br{}", self.config.empty_element_suffix);
            let block = format!("<pre><code>{}{body}</code></pre>", br.repeat(breaks));
            format!("\n\n{}\n\n", ctx.hash(&block, Boundary::Block))
        })
    }

    pub(crate) fn do_block_quotes(&self, ctx: &mut Context, text: &str) -> String {
        let patterns = &self.patterns;
        replace_all(&patterns.blockquote, text, |caps| {
            let quote = patterns.blockquote_marker.replace_all(group(caps, 1), "");
            let quote = self.run_block_gamut(ctx, &quote);
            let quote = indent_lines(&quote, "  ");
            // Leading spaces would change preformatted content.
            let quote = patterns
                .pre_region
                .replace_all(&quote, |pre: &regex::Captures<'_>| {
                    patterns.pre_indent.replace_all(&pre[0], "").into_owned()
                });
            let block = format!("<blockquote>\n{quote}\n</blockquote>");
            format!("\n{}\n\n", ctx.hash(&block, Boundary::Block))
        })
    }

    /// Wraps the remaining chunks in `<p>` and resolves every placeholder.
    pub(crate) fn form_paragraphs(&self, ctx: &mut Context, text: &str) -> String {
        let mut paragraphs = Vec::new();
        for chunk in self.patterns.paragraph_break.split(trim_newlines(text)) {
            if chunk.is_empty() {
                continue;
            }
            let html = self.run_span_gamut(ctx, chunk);
            let html = html.trim();
            if HashStore::starts_block(html) {
                paragraphs.push(html.to_string());
            } else {
                paragraphs.push(format!("<p>{html}</p>"));
            }
        }
        ctx.unhash(&paragraphs.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn blocks(config: Config, text: &str) -> String {
        let markdown = Markdown::new(config).unwrap();
        let mut ctx = Context::new(markdown.config());
        markdown.run_block_gamut(&mut ctx, text)
    }

    #[test]
    fn test_setext_and_atx_headers() {
        assert_eq!(
            blocks(Config::default(), "Title\n=====\n\nSub\n---\n\n### Three ###\n"),
            "<h1>Title</h1>\n\n<h2>Sub</h2>\n\n<h3>Three</h3>"
        );
    }

    #[test]
    fn test_header_ids() {
        assert_eq!(
            blocks(Config::default(), "Title {#top}\n=====\n\n## Sub ## {#sub}\n"),
            "<h1 id=\"top\">Title</h1>\n\n<h2 id=\"sub\">Sub</h2>"
        );
        assert_eq!(
            blocks(Config::basic(), "## Sub {#sub}\n"),
            "<h2>Sub {#sub}</h2>"
        );
    }

    fn convert(text: &str) -> String {
        Markdown::new(Config::default()).unwrap().transform(text)
    }

    #[test]
    fn test_dash_under_dash_item_is_a_list() {
        assert_eq!(convert("- \n-\n"), "<ul>\n<li></li>\n<li></li>\n</ul>\n");
        assert!(!convert("-\n-\n").contains("<h2>"));
        assert_eq!(
            convert("- \n-\n\ntext\n-\n"),
            "<ul>\n<li></li>\n<li></li>\n</ul>\n\n<h2>text</h2>\n"
        );
    }

    #[test]
    fn test_dash_under_text_is_a_header() {
        assert_eq!(convert("text\n-\n"), "<h2>text</h2>\n");
    }

    #[test]
    fn test_horizontal_rule() {
        assert_eq!(blocks(Config::default(), "a\n\n* * *\n\nb\n"), "<p>a</p>\n\n<hr />\n\n<p>b</p>");
    }

    #[test]
    fn test_tight_list() {
        assert_eq!(
            blocks(Config::default(), "* one\n* two\n"),
            "<ul>\n<li>one</li>\n<li>two</li>\n</ul>"
        );
    }

    #[test]
    fn test_loose_list() {
        assert_eq!(
            blocks(Config::default(), "1. one\n\n2. two\n"),
            "<ol>\n<li><p>one</p></li>\n<li><p>two</p></li>\n</ol>"
        );
    }

    #[test]
    fn test_nested_list() {
        assert_eq!(
            blocks(Config::default(), "* a\n    * b\n* c\n"),
            "<ul>\n<li>a<br />\n<br />\n<ul>\n<li>b</li>\n</ul></li>\n<li>c</li>\n</ul>"
        );
    }

    #[test]
    fn test_number_in_prose_is_not_a_list() {
        assert_eq!(
            blocks(Config::default(), "version\n8. oops\n"),
            "<p>version<br />\n8. oops</p>"
        );
    }

    #[test]
    fn test_code_block() {
        assert_eq!(
            blocks(Config::default(), "    <b>&</b>\n    x\n"),
            "<pre><code>&lt;b&gt;&amp;&lt;/b&gt;\nx\n</code></pre>"
        );
    }

    #[test]
    fn test_fenced_code_block() {
        assert_eq!(
            blocks(Config::default(), "~~~\n\n\na <b>\n~~~~\n"),
            "<pre><code><br /><br />a &lt;b&gt;\n</code></pre>"
        );
    }

    #[test]
    fn test_fence_needs_long_enough_close() {
        assert_eq!(
            blocks(Config::default(), "~~~~\ncode\n~~~\nmore\n~~~~\n"),
            "<pre><code>code\n~~~\nmore\n</code></pre>"
        );
    }

    #[test]
    fn test_block_quote() {
        assert_eq!(
            blocks(Config::default(), "> # Hi\n> text\n"),
            "<blockquote>\n  <h1>Hi</h1>\n  \n  <p>text</p>\n</blockquote>"
        );
    }

    #[test]
    fn test_block_quote_keeps_pre_content() {
        assert_eq!(
            blocks(Config::default(), ">     code\n>     more\n"),
            "<blockquote>\n<pre><code>code\nmore\n</code></pre>\n</blockquote>"
        );
    }

    #[test]
    fn test_indented_line_in_quote_is_not_code() {
        assert_eq!(
            blocks(Config::default(), ">    quoted\n"),
            "<blockquote>\n  <p>quoted</p>\n</blockquote>"
        );
    }

    #[test]
    fn test_paragraphs() {
        assert_eq!(
            blocks(Config::default(), "\n\none\n\n\ntwo *x*\n\n"),
            "<p>one</p>\n\n<p>two <em>x</em></p>"
        );
    }

    #[test]
    fn test_nesting_guard_renders_literally() {
        let mut config = Config::default();
        config.max_nesting_depth = 3;
        let markdown = Markdown::new(config).unwrap();
        let mut ctx = Context::new(markdown.config());
        let html = markdown.run_block_gamut(&mut ctx, "> > > > <deep> & *x*\n");
        assert_eq!(ctx.limit_hit, Some(3));
        assert!(html.contains("&lt;deep&gt; &amp; *x*"));
    }
}
