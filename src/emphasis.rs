//! Emphasis and strikethrough resolution.
//!
//! Both constructs share one automaton: markers of length one, two or
//! three are matched into nested single/double elements. The token
//! expression used at each step depends on which markers are open, so a
//! table of expressions is built per delimiter family.

use crate::context::Context;
use crate::error::Result;
use crate::hash::Boundary;
use crate::markdown::Markdown;
use crate::patterns::{escape_literal, find};
use fancy_regex::Regex;
use std::collections::HashMap;

/// Open marker characters: `(single, double)`.
type OpenState = (Option<char>, Option<char>);

#[derive(Debug)]
pub(crate) struct DelimiterTable {
    single_tag: &'static str,
    double_tag: &'static str,
    tokens: HashMap<OpenState, Regex>,
}

impl DelimiterTable {
    /// `*` and `_` emphasis. With `intraword_underscore` false, `_` markers
    /// may not touch a word character on their outer side.
    pub fn emphasis(intraword_underscore: bool) -> Result<Self> {
        Self::new(&['*', '_'], "em", "strong", |c| {
            c == '_' && !intraword_underscore
        })
    }

    /// `~` strikethrough and `~~` spoiler.
    pub fn strikethrough() -> Result<Self> {
        Self::new(&['~'], "s", "del", |_| false)
    }

    fn new(
        chars: &[char],
        single_tag: &'static str,
        double_tag: &'static str,
        word_bounded: impl Fn(char) -> bool,
    ) -> Result<Self> {
        let opener = |len: usize| -> String {
            let alternatives: Vec<String> = chars
                .iter()
                .map(|&c| {
                    let run = run(c, len);
                    let lit = escape_literal(&c.to_string());
                    if word_bounded(c) {
                        format!(r"(?<![a-zA-Z0-9_]){run}(?!{lit})")
                    } else {
                        format!(r"(?<!{lit}){run}(?!{lit})")
                    }
                })
                .collect();
            format!(r"(?:{})(?=\S|$)(?![.,:;]\s)", alternatives.join("|"))
        };
        let closer = |c: char, len: usize| -> String {
            let run = run(c, len);
            let lit = escape_literal(&c.to_string());
            if word_bounded(c) {
                format!(r"(?<!\s)(?<!{lit}){run}(?![a-zA-Z0-9_])")
            } else {
                format!(r"(?<!\s)(?<!{lit}){run}(?!{lit})")
            }
        };

        let states: Vec<Option<char>> = std::iter::once(None)
            .chain(chars.iter().copied().map(Some))
            .collect();
        let mut tokens = HashMap::new();
        for &single in &states {
            for &double in &states {
                let mut alternatives = Vec::with_capacity(3);
                match (single, double) {
                    (None, None) => alternatives.push(opener(3)),
                    (Some(a), Some(b)) if a == b => alternatives.push(closer(a, 3)),
                    _ => {}
                }
                alternatives.push(match single {
                    Some(c) => closer(c, 1),
                    None => opener(1),
                });
                alternatives.push(match double {
                    Some(c) => closer(c, 2),
                    None => opener(2),
                });
                let pattern = format!("({})", alternatives.join("|"));
                tokens.insert((single, double), Regex::new(&pattern)?);
            }
        }

        Ok(Self {
            single_tag,
            double_tag,
            tokens,
        })
    }
}

fn run(c: char, len: usize) -> String {
    escape_literal(&c.to_string()).repeat(len)
}

impl Markdown {
    /// Resolves the markers of one delimiter family in `text`.
    pub(crate) fn resolve_delimiters(
        &self,
        ctx: &mut Context,
        text: &str,
        table: &DelimiterTable,
    ) -> String {
        // Innermost level last; the bottom entry is the enclosing text.
        let mut tokens: Vec<String> = vec![String::new()];
        let mut texts: Vec<String> = vec![String::new()];
        let mut single: Option<char> = None;
        let mut double: Option<char> = None;
        let mut tree_char = false;
        let mut rest = text;

        loop {
            let Some(re) = table.tokens.get(&(single, double)) else {
                break;
            };
            let Some(found) = find(re, rest) else {
                push_top(&mut texts, rest);
                break;
            };
            push_top(&mut texts, &rest[..found.start()]);
            let token = found.as_str();
            rest = &rest[found.end()..];

            let Some(marker) = token.chars().next() else {
                break;
            };
            let len = token.len();

            if tree_char {
                if len == 3 {
                    tokens.pop();
                    let span = texts.pop().unwrap_or_default();
                    let html = self.wrap_span(ctx, table.single_tag, &span);
                    let html = format!("<{0}>{html}</{0}>", table.double_tag);
                    let key = ctx.hash(&html, Boundary::General);
                    push_top(&mut texts, &key);
                    single = None;
                    double = None;
                } else {
                    // Close the matching half and keep the rest open.
                    if let Some(top) = tokens.last_mut() {
                        *top = marker.to_string().repeat(3 - len);
                    }
                    let tag = if len == 2 {
                        double = None;
                        table.double_tag
                    } else {
                        single = None;
                        table.single_tag
                    };
                    let span = texts.pop().unwrap_or_default();
                    let html = self.wrap_span(ctx, tag, &span);
                    texts.push(ctx.hash(&html, Boundary::General));
                }
                tree_char = false;
            } else if len == 3 {
                if single.is_some() {
                    for _ in 0..2 {
                        let open = tokens.pop().unwrap_or_default();
                        let tag = if open.len() == 2 {
                            double = None;
                            table.double_tag
                        } else {
                            single = None;
                            table.single_tag
                        };
                        let span = texts.pop().unwrap_or_default();
                        let html = self.wrap_span(ctx, tag, &span);
                        let key = ctx.hash(&html, Boundary::General);
                        push_top(&mut texts, &key);
                    }
                } else {
                    single = Some(marker);
                    double = Some(marker);
                    tokens.push(token.to_string());
                    texts.push(String::new());
                    tree_char = true;
                }
            } else if len == 2 {
                if double.is_some() {
                    if tokens.last().is_some_and(|t| t.len() == 1) {
                        fold_top(&mut tokens, &mut texts);
                        single = None;
                    }
                    tokens.pop();
                    let span = texts.pop().unwrap_or_default();
                    let html = self.wrap_span(ctx, table.double_tag, &span);
                    let key = ctx.hash(&html, Boundary::General);
                    push_top(&mut texts, &key);
                    double = None;
                } else {
                    tokens.push(token.to_string());
                    texts.push(String::new());
                    double = Some(marker);
                }
            } else if single.is_some() {
                if tokens.last().is_some_and(|t| t.len() == 1) {
                    tokens.pop();
                    let span = texts.pop().unwrap_or_default();
                    let html = self.wrap_span(ctx, table.single_tag, &span);
                    let key = ctx.hash(&html, Boundary::General);
                    push_top(&mut texts, &key);
                    single = None;
                } else {
                    push_top(&mut texts, token);
                }
            } else {
                tokens.push(token.to_string());
                texts.push(String::new());
                single = Some(marker);
            }
        }

        // Unmatched openers go back to the text as literal markers.
        while tokens.last().is_some_and(|t| !t.is_empty()) {
            fold_top(&mut tokens, &mut texts);
        }
        texts.pop().unwrap_or_default()
    }

    fn wrap_span(&self, ctx: &mut Context, tag: &str, span: &str) -> String {
        let inner = self.run_span_gamut(ctx, span);
        format!("<{tag}>{inner}</{tag}>")
    }
}

fn push_top(texts: &mut [String], text: &str) {
    if let Some(top) = texts.last_mut() {
        top.push_str(text);
    }
}

/// Demotes the innermost opener and its text into the level below.
fn fold_top(tokens: &mut Vec<String>, texts: &mut Vec<String>) {
    let token = tokens.pop().unwrap_or_default();
    let text = texts.pop().unwrap_or_default();
    push_top(texts, &token);
    push_top(texts, &text);
}
