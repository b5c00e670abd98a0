//! Line-level text utilities shared by the passes.

use crate::hash::SENTINEL;

const BYTE_ORDER_MARK: char = '\u{FEFF}';

/// Strips the byte-order mark and placeholder sentinels, unifies line
/// endings and guarantees a trailing blank line.
pub(crate) fn normalize(input: &str) -> String {
    let input = input.strip_prefix(BYTE_ORDER_MARK).unwrap_or(input);
    let mut text = String::with_capacity(input.len() + 2);
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            SENTINEL => {}
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                text.push('\n');
            }
            _ => text.push(c),
        }
    }
    text.push_str("\n\n");
    text
}

/// Expands tabs to the next tab stop, counting columns in characters.
pub(crate) fn detab(text: &str, tab_width: usize) -> String {
    if !text.contains('\t') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len() + text.len() / 4);
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        if !line.contains('\t') {
            out.push_str(line);
            continue;
        }
        let mut column = 0;
        for (j, block) in line.split('\t').enumerate() {
            if j > 0 {
                let amount = tab_width - column % tab_width;
                out.extend(std::iter::repeat_n(' ', amount));
                column += amount;
            }
            out.push_str(block);
            column += block.chars().count();
        }
    }
    out
}

/// Empties lines made only of spaces.
pub(crate) fn clear_blank_lines(text: &str) -> String {
    map_lines(text, |line| {
        if !line.is_empty() && line.bytes().all(|b| b == b' ') {
            ""
        } else {
            line
        }
    })
}

/// Removes one level of indentation: a leading tab or up to `tab_width`
/// spaces on every line.
pub(crate) fn outdent(text: &str, tab_width: usize) -> String {
    map_lines(text, |line| match line.strip_prefix('\t') {
        Some(rest) => rest,
        None => strip_spaces(line, tab_width),
    })
}

/// Removes up to `max` leading spaces from every line.
pub(crate) fn outdent_spaces(text: &str, max: usize) -> String {
    map_lines(text, |line| strip_spaces(line, max))
}

/// Prefixes every line with `prefix`. A trailing newline does not start a
/// new line.
pub(crate) fn indent_lines(text: &str, prefix: &str) -> String {
    let mut out = String::with_capacity(text.len() + prefix.len() * 8);
    for line in text.split_inclusive('\n') {
        out.push_str(prefix);
        out.push_str(line);
    }
    if text.is_empty() {
        out.push_str(prefix);
    }
    out
}

/// Number of leading spaces on the last line of `text`.
pub(crate) fn last_line_indent(text: &str) -> usize {
    let last = text.rsplit('\n').next().unwrap_or(text);
    last.bytes().take_while(|&b| b == b' ').count()
}

/// Trims leading and trailing newlines only.
pub(crate) fn trim_newlines(text: &str) -> &str {
    text.trim_matches('\n')
}

fn strip_spaces(line: &str, max: usize) -> &str {
    let count = line.bytes().take(max).take_while(|&b| b == b' ').count();
    &line[count..]
}

fn map_lines<'a, F>(text: &'a str, mut f: F) -> String
where
    F: FnMut(&'a str) -> &'a str,
{
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(f(line));
    }
    out
}
