//! Definition lists: one or more term lines followed by `:`-marked
//! definitions.

use crate::context::Context;
use crate::hash::Boundary;
use crate::markdown::Markdown;
use crate::patterns::{group, replace_all};
use crate::text::outdent;

impl Markdown {
    pub(crate) fn do_definition_lists(&self, ctx: &mut Context, text: &str) -> String {
        replace_all(&self.patterns.definition_list, text, |caps| {
            let items = self.process_definition_items(ctx, group(caps, 1));
            let block = format!("<dl>\n{}\n</dl>", items.trim());
            format!("{}\n\n", ctx.hash(&block, Boundary::Block))
        })
    }

    fn process_definition_items(&self, ctx: &mut Context, list: &str) -> String {
        let trimmed = list.trim_end_matches('\n');
        let list = if list.len() - trimmed.len() >= 2 {
            format!("{trimmed}\n")
        } else {
            list.to_string()
        };

        let list = replace_all(&self.patterns.definition_term, &list, |caps| {
            let mut terms = String::new();
            for term in group(caps, 1).trim().split('\n') {
                let term = self.run_span_gamut(ctx, term.trim());
                terms.push_str(&format!("\n<dt>{term}</dt>"));
            }
            terms.push('\n');
            terms
        });

        let tab_width = self.config.tab_width;
        replace_all(&self.patterns.definition_body, &list, |caps| {
            let leading_line = !group(caps, 1).is_empty();
            let marker_space = group(caps, 2);
            let definition = group(caps, 3);

            let html = if leading_line || definition.contains("\n\n") {
                let definition = format!("{}{definition}", " ".repeat(marker_space.len()));
                let html =
                    self.run_block_gamut(ctx, &outdent(&format!("{definition}\n\n"), tab_width));
                format!("\n{html}\n")
            } else {
                self.run_span_gamut(ctx, &outdent(definition.trim_end(), tab_width))
            };
            format!("\n<dd>{html}</dd>\n")
        })
    }
}
