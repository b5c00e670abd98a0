//! The converter: document passes around the block gamut.

use crate::config::Config;
use crate::context::Context;
use crate::emphasis::DelimiterTable;
use crate::error::{MarkdownError, Result};
use crate::escape::normalize_link_id;
use crate::gamut::{self, BlockPass, DocumentPass, SpanPass};
use crate::patterns::{group, replace_all, Patterns};
use crate::text::{clear_blank_lines, detab, normalize, outdent};
use log::{debug, trace};

/// A Markdown to HTML converter.
///
/// Building one compiles every expression for its [`Config`]; converting
/// only reads it. Each call to [`Markdown::transform`] works on its own
/// scratch state, so one converter can serve any number of threads.
///
/// ```
/// use extramark::{Config, Markdown};
///
/// let markdown = Markdown::new(Config::default()).unwrap();
/// assert_eq!(markdown.transform("*hi*"), "<p><em>hi</em></p>\n");
/// ```
#[derive(Debug)]
pub struct Markdown {
    pub(crate) config: Config,
    pub(crate) patterns: Patterns,
    pub(crate) emphasis: DelimiterTable,
    pub(crate) strikethrough: DelimiterTable,
    pub(crate) document_gamut: Vec<DocumentPass>,
    pub(crate) block_gamut: Vec<BlockPass>,
    pub(crate) span_gamut: Vec<SpanPass>,
}

impl Markdown {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let patterns = Patterns::new(&config)?;
        let emphasis = DelimiterTable::emphasis(!config.is_extra())?;
        let strikethrough = DelimiterTable::strikethrough()?;
        let flavor = config.flavor;
        debug!("building {:?} converter", flavor);
        Ok(Self {
            config,
            patterns,
            emphasis,
            strikethrough,
            document_gamut: gamut::build(flavor),
            block_gamut: gamut::build(flavor),
            span_gamut: gamut::build(flavor),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Converts `text` to HTML.
    ///
    /// Never fails: content nested past the depth limit is rendered as
    /// escaped text. Use [`Markdown::try_transform`] to detect that case.
    pub fn transform(&self, text: &str) -> String {
        self.convert(text).0
    }

    /// Converts `text` to HTML, failing if the nesting depth limit was hit.
    pub fn try_transform(&self, text: &str) -> Result<String> {
        match self.convert(text) {
            (_, Some(limit)) => Err(MarkdownError::RecursionLimit { limit }),
            (html, None) => Ok(html),
        }
    }

    fn convert(&self, text: &str) -> (String, Option<usize>) {
        let mut ctx = Context::new(&self.config);

        let text = normalize(text);
        let text = detab(&text, self.config.tab_width);
        let text = self.hash_html_blocks(&mut ctx, &text);
        let mut text = clear_blank_lines(&text);

        for pass in &self.document_gamut {
            debug!("document pass {:?}", pass);
            text = match pass {
                DocumentPass::FencedCodeBlocks => self.do_fenced_code_blocks(&mut ctx, &text),
                DocumentPass::StripFootnotes => self.strip_footnotes(&mut ctx, &text),
                DocumentPass::StripLinkDefinitions => self.strip_link_definitions(&mut ctx, &text),
                DocumentPass::StripAbbreviations => self.strip_abbreviations(&mut ctx, &text),
                DocumentPass::BlockGamut => self.run_basic_block_gamut(&mut ctx, &text),
                DocumentPass::AppendFootnotes => self.append_footnotes(&mut ctx, &text),
            };
        }
        debug!("converted with {} placeholders", ctx.hashes.len());

        text.push('\n');
        (text, ctx.limit_hit)
    }

    /// Removes `[id]: url "title"` lines, recording them for reference links.
    fn strip_link_definitions(&self, ctx: &mut Context, text: &str) -> String {
        replace_all(&self.patterns.link_definition, text, |caps| {
            let id = normalize_link_id(group(caps, 1));
            let url = match caps.get(2) {
                Some(url) => url.as_str(),
                None => group(caps, 3),
            };
            trace!("link definition {:?} -> {:?}", id, url);
            ctx.urls.insert(id.clone(), url.to_string());
            match caps.get(4) {
                Some(title) => {
                    ctx.titles.insert(id, title.as_str().to_string());
                }
                None => {
                    ctx.titles.remove(&id);
                }
            }
            String::new()
        })
    }

    fn strip_footnotes(&self, ctx: &mut Context, text: &str) -> String {
        replace_all(&self.patterns.footnote_definition, text, |caps| {
            let id = format!("{}{}", self.config.footnote_id_prefix, group(caps, 1));
            let body = outdent(group(caps, 2), self.config.tab_width);
            ctx.footnotes.insert(id, body);
            String::new()
        })
    }

    fn strip_abbreviations(&self, ctx: &mut Context, text: &str) -> String {
        let text = replace_all(&self.patterns.abbreviation_definition, text, |caps| {
            ctx.add_abbreviation(group(caps, 1), group(caps, 2));
            String::new()
        });
        ctx.compile_abbreviations();
        text
    }

    /// Resolves footnote markers and appends the referenced footnotes in
    /// order of first reference.
    fn append_footnotes(&self, ctx: &mut Context, text: &str) -> String {
        let mut text = self.footnote_markers(ctx, text);
        if ctx.footnotes_ordered.is_empty() {
            return text;
        }

        text.push_str("\n\n<div class=\"footnotes\">\n");
        text.push_str(&format!("<hr{}\n", self.config.empty_element_suffix));
        text.push_str("<ol>\n\n");

        let backlink_attributes = self.footnote_attributes(
            "rev",
            &self.config.footnote_backlink_class,
            &self.config.footnote_backlink_title,
        );
        let mut num = 0;
        while let Some((id, footnote)) = ctx.footnotes_ordered.pop_front() {
            num += 1;
            let footnote = self.run_block_gamut(ctx, &format!("{footnote}\n\n"));
            let footnote = self.footnote_markers(ctx, &footnote);

            let attributes = backlink_attributes.replace("%%", &num.to_string());
            let id = self.encode_attribute(&id);
            let backlink = format!("<a href=\"#fnref:{id}\"{attributes}>&#8617;</a>");
            // The backlink joins the last paragraph, or gets one of its own.
            let footnote = match footnote.strip_suffix("</p>") {
                Some(body) => format!("{body}&#160;{backlink}</p>"),
                None => format!("{footnote}\n\n<p>{backlink}</p>"),
            };

            text.push_str(&format!("<li id=\"fn:{id}\">\n{footnote}\n</li>\n\n"));
        }

        text.push_str("</ol>\n</div>");
        text
    }

    /// Turns reference tokens into numbered links. A footnote is linked
    /// from its first reference only; later ones stay literal.
    fn footnote_markers(&self, ctx: &mut Context, text: &str) -> String {
        let link_attributes = self.footnote_attributes(
            "rel",
            &self.config.footnote_link_class,
            &self.config.footnote_link_title,
        );
        replace_all(&self.patterns.footnote_placeholder, text, |caps| {
            let raw_id = group(caps, 1)
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|index| ctx.footnote_refs.get(index))
                .cloned()
                .unwrap_or_default();
            let id = format!("{}{}", self.config.footnote_id_prefix, raw_id);
            let Some(footnote) = ctx.footnotes.remove(&id) else {
                return format!("[^{raw_id}]");
            };
            ctx.footnotes_ordered.push_back((id.clone(), footnote));

            let num = ctx.footnote_counter;
            ctx.footnote_counter += 1;
            let attributes = link_attributes.replace("%%", &num.to_string());
            let id = self.encode_attribute(&id);
            format!("<sup id=\"fnref:{id}\"><a href=\"#fn:{id}\"{attributes}>{num}</a></sup>")
        })
    }

    fn footnote_attributes(&self, relation: &str, class: &str, title: &str) -> String {
        let mut attributes = format!(" {relation}=\"footnote\"");
        if !class.is_empty() {
            attributes.push_str(&format!(" class=\"{}\"", self.encode_attribute(class)));
        }
        if !title.is_empty() {
            attributes.push_str(&format!(" title=\"{}\"", self.encode_attribute(title)));
        }
        attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Flavor;

    fn extra(text: &str) -> String {
        Markdown::new(Config::default()).unwrap().transform(text)
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(extra(""), "\n");
        assert_eq!(extra("\n\n  \n"), "\n");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = Config {
            tab_width: 0,
            ..Config::default()
        };
        assert!(matches!(
            Markdown::new(config),
            Err(MarkdownError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_line_endings_and_sentinels() {
        assert_eq!(extra("a\r\nb\u{1A}c\r"), "<p>a<br />\nbc</p>\n");
    }

    #[test]
    fn test_reference_links() {
        let html = extra("[Site][ID] and [id]\n\n[id]: http://example.com/  \"Title\"\n");
        assert_eq!(
            html,
            "<p><a href=\"http://example.com/\" title=\"Title\">Site</a> and \
             <a href=\"http://example.com/\" title=\"Title\">id</a></p>\n"
        );
    }

    #[test]
    fn test_later_link_definition_wins() {
        let html = extra("[a]\n\n[a]: /one \"One\"\n[a]: /two\n");
        assert_eq!(html, "<p><a href=\"/two\">a</a></p>\n");
    }

    #[test]
    fn test_predefined_links() {
        let mut config = Config::default();
        config.predefined_links.insert("Home".into(), "/".into());
        let markdown = Markdown::new(config).unwrap();
        assert_eq!(markdown.transform("[home]"), "<p><a href=\"/\">home</a></p>\n");
    }

    #[test]
    fn test_footnotes() {
        let html = extra("Text[^1] more[^x].\n\n[^1]: The note.\n");
        assert_eq!(
            html,
            "<p>Text<sup id=\"fnref:1\"><a href=\"#fn:1\" rel=\"footnote\">1</a></sup> more[^x].</p>\n\n\
             <div class=\"footnotes\">\n<hr />\n<ol>\n\n\
             <li id=\"fn:1\">\n<p>The note.&#160;<a href=\"#fnref:1\" rev=\"footnote\">&#8617;</a></p>\n</li>\n\n\
             </ol>\n</div>\n"
        );
    }

    #[test]
    fn test_footnote_referenced_twice_links_once() {
        let html = extra("a[^n] b[^n]\n\n[^n]: Note.\n");
        assert!(html.contains("a<sup id=\"fnref:n\">"));
        assert!(html.contains("b[^n]"));
        assert_eq!(html.matches("<li id=").count(), 1);
    }

    #[test]
    fn test_footnotes_numbered_by_first_reference() {
        let html = extra("b[^b] a[^a]\n\n[^a]: A.\n[^b]: B.\n");
        assert!(html.contains("<a href=\"#fn:b\" rel=\"footnote\">1</a>"));
        assert!(html.contains("<a href=\"#fn:a\" rel=\"footnote\">2</a>"));
        let b = html.find("<li id=\"fn:b\">").unwrap();
        let a = html.find("<li id=\"fn:a\">").unwrap();
        assert!(b < a);
    }

    #[test]
    fn test_footnote_attributes_number_each_note() {
        let mut config = Config::default();
        config.footnote_link_title = "Note %%".into();
        config.footnote_backlink_title = "Back to %%".into();
        config.footnote_backlink_class = "back".into();
        config.footnote_id_prefix = "p-".into();
        let html = Markdown::new(config)
            .unwrap()
            .transform("x[^a] y[^b]\n\n[^a]: A.\n\n[^b]: B.\n");
        assert!(html.contains("<sup id=\"fnref:p-a\"><a href=\"#fn:p-a\" rel=\"footnote\" title=\"Note 1\">1</a></sup>"));
        assert!(html.contains("title=\"Note 2\">2</a>"));
        assert!(html.contains("rev=\"footnote\" class=\"back\" title=\"Back to 1\""));
        assert!(html.contains("rev=\"footnote\" class=\"back\" title=\"Back to 2\""));
    }

    #[test]
    fn test_footnote_ending_in_block_gets_backlink_paragraph() {
        let html = extra("x[^c]\n\n[^c]:\n    ~~~\n    code\n    ~~~\n");
        assert!(html.contains("</code></pre>\n\n<p><a href=\"#fnref:c\" rev=\"footnote\">&#8617;</a></p>"));
    }

    #[test]
    fn test_abbreviations() {
        let html = extra("The HTML spec.\n\n*[HTML]: Hyper Text Markup Language\n*[spec]:\n");
        assert_eq!(
            html,
            "<p>The <abbr title=\"Hyper Text Markup Language\">HTML</abbr> <abbr>spec</abbr>.</p>\n"
        );
    }

    #[test]
    fn test_abbreviation_needs_whole_word() {
        let html = extra("HTMLX and HTML_B\n\n*[HTML]: Markup\n");
        assert_eq!(html, "<p>HTMLX and HTML_B</p>\n");
    }

    #[test]
    fn test_basic_flavor_ignores_extra_syntax() {
        let markdown = Markdown::new(Config::basic()).unwrap();
        assert_eq!(markdown.config().flavor, Flavor::Basic);
        assert_eq!(
            markdown.transform("x[^1] HTML\n\n*[HTML]: Markup\n"),
            "<p>x[^1] HTML</p>\n\n<p>*[HTML]: Markup</p>\n"
        );
    }

    #[test]
    fn test_try_transform_reports_depth_limit() {
        let config = Config {
            max_nesting_depth: 4,
            ..Config::default()
        };
        let markdown = Markdown::new(config).unwrap();
        let deep = "> > > > > > > > deep\n";
        assert!(matches!(
            markdown.try_transform(deep),
            Err(MarkdownError::RecursionLimit { limit: 4 })
        ));
        assert!(markdown.transform(deep).contains("deep"));
        assert_eq!(markdown.try_transform("> ok\n").unwrap(), "<blockquote>\n  <p>ok</p>\n</blockquote>\n");
    }

    #[test]
    fn test_converter_is_reusable() {
        let markdown = Markdown::new(Config::default()).unwrap();
        let first = markdown.transform("a[^1]\n\n[^1]: x\n\n*[a]: A\n");
        let second = markdown.transform("a[^1]\n");
        assert!(first.contains("footnotes"));
        assert_eq!(second, "<p>a[^1]</p>\n");
    }
}
