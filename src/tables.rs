//! Pipe tables.

use crate::context::Context;
use crate::hash::Boundary;
use crate::markdown::Markdown;
use crate::patterns::{group, replace_all};
use fancy_regex::Captures;

/// Column alignment, read from the header underline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Alignment {
    None,
    Left,
    Right,
    Center,
}

impl Alignment {
    /// `---:` is right, `:---:` center, `:---` left; anything else has no
    /// alignment.
    pub fn from_separator(separator: &str) -> Self {
        let cell = separator.trim_matches(' ');
        let (cell, left) = match cell.strip_prefix(':') {
            Some(rest) => (rest, true),
            None => (cell, false),
        };
        let (cell, right) = match cell.strip_suffix(':') {
            Some(rest) => (rest, true),
            None => (cell, false),
        };
        if cell.is_empty() || !cell.bytes().all(|b| b == b'-') {
            return Alignment::None;
        }
        match (left, right) {
            (true, true) => Alignment::Center,
            (true, false) => Alignment::Left,
            (false, true) => Alignment::Right,
            (false, false) => Alignment::None,
        }
    }

    fn attribute(self) -> &'static str {
        match self {
            Alignment::None => "",
            Alignment::Left => " align=\"left\"",
            Alignment::Right => " align=\"right\"",
            Alignment::Center => " align=\"center\"",
        }
    }
}

impl Markdown {
    pub(crate) fn do_tables(&self, ctx: &mut Context, text: &str) -> String {
        let patterns = &self.patterns;
        let text = replace_all(&patterns.table_leading_pipe, text, |caps| {
            let content = patterns.table_row_leading_pipe.replace_all(group(caps, 3), "");
            self.table(ctx, caps, &content)
        });
        replace_all(&patterns.table_plain, &text, |caps| {
            self.table(ctx, caps, group(caps, 3))
        })
    }

    fn table(&self, ctx: &mut Context, caps: &Captures<'_>, content: &str) -> String {
        let patterns = &self.patterns;
        let trailing = &patterns.table_row_trailing_pipe;
        let separator = &patterns.table_cell_separator;

        let head = trailing.replace_all(group(caps, 1), "");
        let underline = trailing.replace_all(group(caps, 2), "");
        let content = trailing.replace_all(content, "");

        let alignments: Vec<Alignment> = separator
            .split(&underline)
            .map(Alignment::from_separator)
            .collect();
        let attribute =
            |n: usize| alignments.get(n).copied().unwrap_or(Alignment::None).attribute();

        // Code spans and tags are hashed first so their pipes do not split.
        let head = self.parse_span(ctx, &head);
        let headers: Vec<&str> = separator.split(&head).collect();
        let col_count = headers.len();

        let mut html = String::from("<table>\n<thead>\n<tr>\n");
        for (n, header) in headers.iter().enumerate() {
            let cell = self.run_span_gamut(ctx, header.trim());
            html.push_str(&format!("  <th{}>{cell}</th>\n", attribute(n)));
        }
        html.push_str("</tr>\n</thead>\n<tbody>\n");

        let content = content.trim_matches('\n');
        if !content.is_empty() {
            for row in content.split('\n') {
                let row = self.parse_span(ctx, row);
                let mut cells: Vec<&str> = separator.splitn(&row, col_count).collect();
                cells.resize(col_count, "");
                html.push_str("<tr>\n");
                for (n, cell) in cells.iter().enumerate() {
                    let cell = self.run_span_gamut(ctx, cell.trim());
                    html.push_str(&format!("  <td{}>{cell}</td>\n", attribute(n)));
                }
                html.push_str("</tr>\n");
            }
        }
        html.push_str("</tbody>\n</table>");

        format!("{}\n", ctx.hash(&html, Boundary::Block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn blocks(text: &str) -> String {
        let markdown = Markdown::new(Config::default()).unwrap();
        let mut ctx = Context::new(markdown.config());
        markdown.run_block_gamut(&mut ctx, text)
    }

    #[test]
    fn test_alignment_from_separator() {
        assert_eq!(Alignment::from_separator(" --- "), Alignment::None);
        assert_eq!(Alignment::from_separator(":---"), Alignment::Left);
        assert_eq!(Alignment::from_separator("---: "), Alignment::Right);
        assert_eq!(Alignment::from_separator(" :-: "), Alignment::Center);
        assert_eq!(Alignment::from_separator("::"), Alignment::None);
        assert_eq!(Alignment::from_separator("- -:"), Alignment::None);
    }

    #[test]
    fn test_plain_table() {
        assert_eq!(
            blocks("a | b\n--|--:\n1 | *2*\n"),
            "<table>\n<thead>\n<tr>\n  <th>a</th>\n  <th align=\"right\">b</th>\n</tr>\n</thead>\n\
             <tbody>\n<tr>\n  <td>1</td>\n  <td align=\"right\"><em>2</em></td>\n</tr>\n</tbody>\n</table>"
        );
    }

    #[test]
    fn test_leading_pipe_table() {
        assert_eq!(
            blocks("| a | b |\n|:-:|---|\n| 1 |\n"),
            "<table>\n<thead>\n<tr>\n  <th align=\"center\">a</th>\n  <th>b</th>\n</tr>\n</thead>\n\
             <tbody>\n<tr>\n  <td align=\"center\">1</td>\n  <td></td>\n</tr>\n</tbody>\n</table>"
        );
    }

    #[test]
    fn test_pipe_in_code_span_does_not_split() {
        let html = blocks("a | b\n--|--\n`x|y` | z\n");
        assert!(html.contains("<td><code>x|y</code></td>"));
        assert!(html.contains("<td>z</td>"));
    }

    #[test]
    fn test_extra_cells_stay_in_last_column() {
        let html = blocks("a | b\n--|--\n1 | 2 | 3\n");
        assert!(html.contains("<td>2 | 3</td>"));
    }

    #[test]
    fn test_header_only_table_has_empty_body() {
        assert_eq!(
            blocks("a | b\n--|--\n"),
            "<table>\n<thead>\n<tr>\n  <th>a</th>\n  <th>b</th>\n</tr>\n</thead>\n<tbody>\n</tbody>\n</table>"
        );
    }
}
