//! Compiled expressions for every pass, built once per configuration.
//!
//! The grammar leans on lookaround, backreferences and atomic groups, so
//! most expressions go through `fancy_regex`. Plain splitting and cleanup
//! use `regex`. Matching never panics: a backtracking-limit error is logged
//! and treated as "no match".

use crate::config::{Config, Flavor};
use crate::error::Result;
use fancy_regex::{Captures, Match, Regex};
use log::warn;

/// Tag-name alternations driving the HTML block scanner.
#[derive(Debug, Clone)]
pub(crate) struct TagSets {
    pub block: &'static str,
    pub context: &'static str,
    pub clean: Option<&'static str>,
    pub contain_span: &'static str,
    pub markdown_attribute: bool,
    pub fenced_code: bool,
}

impl TagSets {
    fn for_flavor(flavor: Flavor) -> Self {
        match flavor {
            Flavor::Basic => TagSets {
                block: "p|div|h[1-6]|blockquote|pre|table|dl|ol|ul|address|script|noscript|form|fieldset|iframe|math|hr",
                context: "ins|del",
                clean: None,
                contain_span: "p|h[1-6]|li|dd|dt|td|th|legend|address",
                markdown_attribute: false,
                fenced_code: false,
            },
            Flavor::Extra => TagSets {
                block: "p|div|h[1-6]|blockquote|pre|table|dl|ol|ul|address|form|fieldset|iframe|hr|legend",
                context: "script|noscript|math|ins|del",
                clean: Some("script|math"),
                contain_span: "p|h[1-6]|li|dd|dt|td|th|legend|address",
                markdown_attribute: true,
                fenced_code: true,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListKind {
    Unordered,
    Ordered,
}

impl ListKind {
    pub fn tag(self) -> &'static str {
        match self {
            ListKind::Unordered => "ul",
            ListKind::Ordered => "ol",
        }
    }

    fn marker(self) -> &'static str {
        match self {
            ListKind::Unordered => r"[*+-]",
            ListKind::Ordered => r"\d+[.]",
        }
    }

    fn other(self) -> ListKind {
        match self {
            ListKind::Unordered => ListKind::Ordered,
            ListKind::Ordered => ListKind::Unordered,
        }
    }
}

#[derive(Debug)]
pub(crate) struct ListPatterns {
    pub kind: ListKind,
    /// A list outside any other list: must follow a blank line.
    pub top_level: Regex,
    /// A list nested in an item: may start on any line.
    pub nested: Regex,
    pub item: Regex,
}

impl ListPatterns {
    fn new(kind: ListKind, less_than_tab: usize) -> Result<Self> {
        let marker = kind.marker();
        let other = kind.other().marker();
        let whole_list = format!(
            r"((([ ]{{0,{less_than_tab}}})({marker})[ ]+)[\s\S]+?(\z|\n{{2,}}(?=\S)(?![ ]*{marker}[ ]+)|(?=\n\3{other}[ ]+)))"
        );
        let top_level = Regex::new(&format!(r"(?m)(?:(?<=\n)\n|\A\n?){whole_list}"))?;
        let nested = Regex::new(&format!(r"(?m)^{whole_list}"))?;
        let item = Regex::new(&format!(
            r"(?m)(\n)?(^[ ]*)({marker}(?:[ ]+|(?=\n)))([\s\S]*?)(?:(\n+(?=\n))|\n)(?=\n*(\z|\2({marker})(?:[ ]+|(?=\n))))"
        ))?;
        Ok(Self {
            kind,
            top_level,
            nested,
            item,
        })
    }
}

#[derive(Debug)]
pub(crate) struct Patterns {
    pub tags: TagSets,

    // Document level.
    pub link_definition: Regex,
    pub footnote_definition: Regex,
    pub abbreviation_definition: Regex,
    pub footnote_placeholder: Regex,

    // Block level.
    pub setext_header: Regex,
    pub atx_header: Regex,
    pub horizontal_rule: Regex,
    pub lists: Vec<ListPatterns>,
    pub code_block: Regex,
    pub fenced_code_block: Regex,
    pub blockquote: Regex,
    pub blockquote_marker: regex::Regex,
    pub pre_region: regex::Regex,
    pub pre_indent: regex::Regex,
    pub table_leading_pipe: Regex,
    pub table_plain: Regex,
    pub table_row_leading_pipe: regex::Regex,
    pub table_row_trailing_pipe: regex::Regex,
    pub table_cell_separator: regex::Regex,
    pub definition_list: Regex,
    pub definition_term: Regex,
    pub definition_body: Regex,
    pub paragraph_break: regex::Regex,

    // Span level.
    pub span_token: Regex,
    pub image_reference: Regex,
    pub image_inline: Regex,
    pub anchor_reference: Regex,
    pub anchor_inline: Regex,
    pub anchor_shortcut: Regex,
    pub autolink_url: Regex,
    pub autolink_email: Regex,
    pub bare_ampersand: Regex,
    pub hard_break: Regex,
    pub footnote_reference: Regex,

    // HTML blocks.
    pub html_tag: Regex,
    pub markdown_attribute: Regex,
    pub newline_after_tag: Regex,
    pub block_tag_start: Regex,
    pub context_tag_start: Regex,
    pub clean_tag_start: Option<Regex>,
    pub contain_span_tag_start: Regex,
    pub auto_close_tag: Regex,
}

impl Patterns {
    pub fn new(config: &Config) -> Result<Self> {
        let tab_width = config.tab_width;
        let less = tab_width - 1;
        let brackets = nested_brackets(config.nested_brackets_depth);
        let parens = nested_parentheses(config.nested_url_parenthesis_depth);
        let tags = TagSets::for_flavor(config.flavor);
        let extra = config.is_extra();

        let (setext_header, atx_header) = if extra {
            (
                r"(?m)(^.+?)(?:[ ]+\{#([-_:a-zA-Z0-9]+)\})?[ ]*\n(=+|-+)[ ]*\n+".to_string(),
                r"(?m)^(#{1,6})[ ]*(.+?)[ ]*#*(?:[ ]+\{#([-_:a-zA-Z0-9]+)\})?[ ]*\n+".to_string(),
            )
        } else {
            (
                r"(?m)(^.+?)()[ ]*\n(=+|-+)[ ]*\n+".to_string(),
                r"(?m)^(#{1,6})[ ]*(.+?)[ ]*#*()\n+".to_string(),
            )
        };

        let escape_class: String = config
            .escape_chars()
            .chars()
            .map(|c| escape_literal(&c.to_string()))
            .collect();
        let mut span_token = format!(r"(\\[{escape_class}]|(?<![`\\])`+");
        if !config.no_markup {
            span_token.push_str(
                r#"|<!--[\s\S]*?-->|<\?[\s\S]*?\?>|<%[\s\S]*?%>|<[/!$]?[-a-zA-Z0-9:_]+(?>\s(?>[^"'>]+|"[^"]*"|'[^']*')*)?>"#,
            );
        }
        span_token.push(')');

        Ok(Self {
            link_definition: Regex::new(&format!(
                r#"(?m)^[ ]{{0,{less}}}\[(.+)\][ ]?:[ ]*\n?[ ]*(?:<(.+?)>|(\S+?))[ ]*\n?[ ]*(?:(?<=\s)["(](.*?)[")][ ]*)?(?:\n+|\z)"#
            ))?,
            footnote_definition: Regex::new(&format!(
                r"(?m)^[ ]{{0,{less}}}\[\^(.+?)\][ ]?:[ ]*\n?((?:.+|\n(?!\[\^.+?\]:\s)(?!\n+[ ]{{0,3}}\S))*)"
            ))?,
            abbreviation_definition: Regex::new(&format!(
                r"(?m)^[ ]{{0,{less}}}\*\[(.+?)\][ ]?:(.*)"
            ))?,
            footnote_placeholder: Regex::new("F\u{1A}fn([0-9]+)\u{1A}:")?,

            setext_header: Regex::new(&setext_header)?,
            atx_header: Regex::new(&atx_header)?,
            horizontal_rule: Regex::new(r"(?m)^[ ]{0,3}([-*_])(?>[ ]{0,2}\1){2,}[ ]*$")?,
            lists: vec![
                ListPatterns::new(ListKind::Unordered, less)?,
                ListPatterns::new(ListKind::Ordered, less)?,
            ],
            code_block: Regex::new(&format!(
                r"(?m)(?:\n\n|\A\n?)((?>[ ]{{{tab_width}}}.*\n+)+)((?=^[ ]{{0,{tab_width}}}\S)|\z)"
            ))?,
            fenced_code_block: Regex::new(
                r"(?m)(?:\n|\A)(~{3,})[ ]*\n((?>(?!\1~*[ ]*\n).*\n+)+)\1~*[ ]*\n",
            )?,
            blockquote: Regex::new(r"(?m)((?>^[ ]*>[ ]?.+\n(.+\n)*\n*)+)")?,
            blockquote_marker: regex::Regex::new(r"(?m)^[ ]*>[ ]?|^[ ]+$")?,
            pre_region: regex::Regex::new(r"(?s)\s*<pre>.+?</pre>")?,
            pre_indent: regex::Regex::new(r"(?m)^  ")?,
            table_leading_pipe: Regex::new(&format!(
                r"(?m)^[ ]{{0,{less}}}[|](.+)\n[ ]{{0,{less}}}[|]([ ]*[-:]+[-| :]*)\n((?>[ ]*[|].*\n)*)(?=\n|\z)"
            ))?,
            table_plain: Regex::new(&format!(
                r"(?m)^[ ]{{0,{less}}}(\S.*[|].*)\n[ ]{{0,{less}}}([-:]+[ ]*[|][-| :]*)\n((?>.*[|].*\n)*)(?=\n|\z)"
            ))?,
            table_row_leading_pipe: regex::Regex::new(r"(?m)^ *[|]")?,
            table_row_trailing_pipe: regex::Regex::new(r"(?m)[|] *$")?,
            table_cell_separator: regex::Regex::new(r" *[|] *")?,
            definition_list: Regex::new(&format!(
                r"(?m)(?>\A\n?|(?<=\n\n))(?>(([ ]{{0,{less}}}((?>.*\S.*\n)+)\n?[ ]{{0,{less}}}:[ ]+)[\s\S]+?(\z|\n{{2,}}(?=\S)(?![ ]{{0,{less}}}(?:\S.*\n)+?\n?[ ]{{0,{less}}}:[ ]+)(?![ ]{{0,{less}}}:[ ]+))))"
            ))?,
            definition_term: Regex::new(&format!(
                r"(?m)(?>\A\n?|\n\n+)([ ]{{0,{less}}}(?![:][ ]|[ ])(?>\S.*\n)+?)(?=\n?[ ]{{0,3}}:[ ])"
            ))?,
            definition_body: Regex::new(&format!(
                r"(?m)\n(\n+)?([ ]{{0,{less}}}[:][ ]+)([\s\S]+?)(?=\n+(?:[ ]{{0,{less}}}[:][ ]|<dt>|\z))"
            ))?,
            paragraph_break: regex::Regex::new(r"\n{2,}")?,

            span_token: Regex::new(&span_token)?,
            image_reference: Regex::new(&format!(
                r"(?s)(!\[({brackets})\][ ]?(?:\n[ ]*)?\[(.*?)\])"
            ))?,
            image_inline: Regex::new(&format!(
                r#"(?s)(!\[({brackets})\]\s?\([ \n]*(?:<(\S*)>|({parens}))[ \n]*((['"])(.*?)\6[ \n]*)?\))"#
            ))?,
            anchor_reference: Regex::new(&format!(
                r"(?s)(\[({brackets})\][ ]?(?:\n[ ]*)?\[(.*?)\])"
            ))?,
            anchor_inline: Regex::new(&format!(
                r#"(?s)(\[({brackets})\]\([ \n]*(?:<(.+?)>|({parens}))[ \n]*((['"])(.*?)\6[ \n]*)?\))"#
            ))?,
            anchor_shortcut: Regex::new(r"(\[([^\[\]]+)\])")?,
            autolink_url: Regex::new(r#"(?i)<((?:https?|ftp|dict):[^'">\s]+)>"#)?,
            autolink_email: Regex::new(
                r#"(?i)<(?:mailto:)?((?:[-!#$%&'*+/=?^_`.{|}~\w\x{80}-\x{10FFFF}]+|".*?")@(?:[-a-z0-9\x{80}-\x{10FFFF}]+(?:\.[-a-z0-9\x{80}-\x{10FFFF}]+)*\.[a-z]+|\[[\d.a-fA-F:]+\]))>"#,
            )?,
            bare_ampersand: Regex::new(r"&(?!#?[xX]?(?:[0-9a-fA-F]+|\w+);)")?,
            hard_break: Regex::new(r" {2,}\n|\n")?,
            footnote_reference: Regex::new(r"\[\^(.+?)\]")?,

            html_tag: Regex::new(
                r#"(?s)(</?[\w:$]+(?:(?=[\s"'/a-zA-Z0-9])(?>".*?"|'.*?'|.+?)*?)?>|<!--.*?-->|<\?.*?\?>|<%.*?%>|<!\[CDATA\[.*?\]\]>)"#,
            )?,
            markdown_attribute: Regex::new(
                r#"(?s)\s*markdown\s*=\s*(?>(["'])(.*?)\1|([^\s>]*))"#,
            )?,
            newline_after_tag: Regex::new(r"(?s)^(?>[ ]*<!--.*?-->)?[ ]*\n")?,
            block_tag_start: Regex::new(&format!(r"^<(?:{})\b", tags.block))?,
            context_tag_start: Regex::new(&format!(r"^<(?:{})\b", tags.context))?,
            clean_tag_start: tags
                .clean
                .map(|clean| Regex::new(&format!(r"^<(?:{clean})\b")))
                .transpose()?,
            contain_span_tag_start: Regex::new(&format!(r"^<(?:{})\b", tags.contain_span))?,
            auto_close_tag: Regex::new(r"^</?(?:hr|img)\b")?,
            tags,
        })
    }

    /// Scanner for the Markdown side of the HTML block hasher. Depends on
    /// the current indentation, the enclosing tag and span mode, so it is
    /// built on demand and cached per conversion.
    pub fn markdown_scanner(&self, indent: usize, enclosing: &str, span: bool, tab_width: usize) -> Result<Regex> {
        let tags = &self.tags;
        let mut names = format!("{}|{}", tags.block, tags.context);
        if let Some(clean) = tags.clean {
            names.push('|');
            names.push_str(clean);
        }
        names.push_str(r"|(?!\s)");
        names.push_str(&escape_literal(enclosing));

        // Attribute runs stop at a blank line, so a stray `<` never joins
        // the next paragraph.
        let mut pattern = format!(
            r#"(?s)(</?(?>{names})(?:(?=[\s"'/a-zA-Z0-9])(?>".*?"|'.*?'|(?!\n[ ]*\n).)*?)?>|<!--.*?-->|<\?.*?\?>|<%.*?%>|<!\[CDATA\[.*?\]\]>|`+"#
        );
        if !span {
            let code_indent = indent + tab_width;
            pattern.push_str(&format!(
                r"|(?:^[ ]*\n|^|\n[ ]*\n)[ ]{{{code_indent}}}[^\n]*\n(?>(?:[ ]{{{code_indent}}}[^\n]*|[ ]*)\n)*"
            ));
            if tags.fenced_code {
                pattern.push_str(&format!(r"|(?>^|\n)[ ]{{0,{indent}}}~~~+[ ]*\n"));
            }
        }
        pattern.push(')');
        Ok(Regex::new(&pattern)?)
    }
}

/// `[...]` link text with up to `depth` levels of balanced brackets.
fn nested_brackets(depth: usize) -> String {
    format!(
        "{}{}",
        r"(?>[^\[\]]+|\[".repeat(depth),
        r"\])*".repeat(depth)
    )
}

/// Link URL with up to `depth` levels of balanced parentheses.
fn nested_parentheses(depth: usize) -> String {
    format!(
        "{}{}",
        r"(?>[^()\s]+|\(".repeat(depth),
        r"(?>\)))*".repeat(depth)
    )
}

/// Escapes the characters that are special either in a pattern or inside a
/// character class.
pub(crate) fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if r"\.+*?()|[]{}^$-".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn log_match_error(re: &Regex, err: &fancy_regex::Error) {
    warn!("pattern {} gave up matching: {}", re.as_str(), err);
}

pub(crate) fn find<'t>(re: &Regex, text: &'t str) -> Option<Match<'t>> {
    match re.find(text) {
        Ok(found) => found,
        Err(err) => {
            log_match_error(re, &err);
            None
        }
    }
}

pub(crate) fn captures<'t>(re: &Regex, text: &'t str) -> Option<Captures<'t>> {
    match re.captures(text) {
        Ok(found) => found,
        Err(err) => {
            log_match_error(re, &err);
            None
        }
    }
}

pub(crate) fn is_match(re: &Regex, text: &str) -> bool {
    match re.is_match(text) {
        Ok(matched) => matched,
        Err(err) => {
            log_match_error(re, &err);
            false
        }
    }
}

/// Text of capture group `index`, empty when the group did not take part.
pub(crate) fn group<'t>(caps: &Captures<'t>, index: usize) -> &'t str {
    caps.get(index).map_or("", |m| m.as_str())
}

/// Replaces every non-overlapping match with the result of `replacer`.
///
/// Matches are searched from successive positions in the full text, so
/// anchors and lookbehinds see the text before the current position.
pub(crate) fn replace_all<F>(re: &Regex, text: &str, mut replacer: F) -> String
where
    F: FnMut(&Captures<'_>) -> String,
{
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut position = 0;

    while position <= text.len() {
        let caps = match re.captures_from_pos(text, position) {
            Ok(Some(caps)) => caps,
            Ok(None) => break,
            Err(err) => {
                log_match_error(re, &err);
                break;
            }
        };
        let Some(whole) = caps.get(0) else {
            break;
        };
        out.push_str(&text[copied..whole.start()]);
        out.push_str(&replacer(&caps));
        copied = whole.end();
        position = if whole.start() == whole.end() {
            match text[whole.end()..].chars().next() {
                Some(c) => whole.end() + c.len_utf8(),
                None => break,
            }
        } else {
            whole.end()
        };
    }

    out.push_str(&text[copied..]);
    out
}
