//! Ordered pass tables.
//!
//! Each gamut is a fixed list of passes with a priority. The flavor decides
//! which passes take part; the list is sorted once when the engine is built.

use crate::config::Flavor;

pub(crate) trait Pass: Copy + 'static {
    const ALL: &'static [Self];

    fn priority(self) -> i32;

    /// Passes that only exist in the Extra flavor.
    fn extra_only(self) -> bool;
}

/// Passes over the whole document, around the block gamut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DocumentPass {
    FencedCodeBlocks,
    StripFootnotes,
    StripLinkDefinitions,
    StripAbbreviations,
    BlockGamut,
    AppendFootnotes,
}

impl Pass for DocumentPass {
    const ALL: &'static [Self] = &[
        DocumentPass::FencedCodeBlocks,
        DocumentPass::StripFootnotes,
        DocumentPass::StripLinkDefinitions,
        DocumentPass::StripAbbreviations,
        DocumentPass::BlockGamut,
        DocumentPass::AppendFootnotes,
    ];

    fn priority(self) -> i32 {
        match self {
            DocumentPass::FencedCodeBlocks => 5,
            DocumentPass::StripFootnotes => 15,
            DocumentPass::StripLinkDefinitions => 20,
            DocumentPass::StripAbbreviations => 25,
            DocumentPass::BlockGamut => 30,
            DocumentPass::AppendFootnotes => 50,
        }
    }

    fn extra_only(self) -> bool {
        !matches!(
            self,
            DocumentPass::StripLinkDefinitions | DocumentPass::BlockGamut
        )
    }
}

/// Passes that turn lines into block elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockPass {
    FencedCodeBlocks,
    Headers,
    Tables,
    HorizontalRules,
    Lists,
    DefinitionLists,
    CodeBlocks,
    BlockQuotes,
}

impl Pass for BlockPass {
    const ALL: &'static [Self] = &[
        BlockPass::FencedCodeBlocks,
        BlockPass::Headers,
        BlockPass::Tables,
        BlockPass::HorizontalRules,
        BlockPass::Lists,
        BlockPass::DefinitionLists,
        BlockPass::CodeBlocks,
        BlockPass::BlockQuotes,
    ];

    fn priority(self) -> i32 {
        match self {
            BlockPass::FencedCodeBlocks => 5,
            BlockPass::Headers => 10,
            BlockPass::Tables => 15,
            BlockPass::HorizontalRules => 20,
            BlockPass::Lists => 40,
            BlockPass::DefinitionLists => 45,
            BlockPass::CodeBlocks => 50,
            BlockPass::BlockQuotes => 60,
        }
    }

    fn extra_only(self) -> bool {
        matches!(
            self,
            BlockPass::FencedCodeBlocks | BlockPass::Tables | BlockPass::DefinitionLists
        )
    }
}

/// Passes applied inside a block's inline content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SpanPass {
    ParseSpan,
    Images,
    Anchors,
    AutoLinks,
    AmpsAndAngles,
    Emphasis,
    Strikethrough,
    FootnoteReferences,
    HardBreaks,
    Abbreviations,
}

impl Pass for SpanPass {
    const ALL: &'static [Self] = &[
        SpanPass::ParseSpan,
        SpanPass::Images,
        SpanPass::Anchors,
        SpanPass::AutoLinks,
        SpanPass::AmpsAndAngles,
        SpanPass::Emphasis,
        SpanPass::Strikethrough,
        SpanPass::FootnoteReferences,
        SpanPass::HardBreaks,
        SpanPass::Abbreviations,
    ];

    fn priority(self) -> i32 {
        match self {
            SpanPass::ParseSpan => -30,
            SpanPass::Images => 10,
            SpanPass::Anchors => 20,
            SpanPass::AutoLinks => 30,
            SpanPass::AmpsAndAngles => 40,
            SpanPass::Emphasis => 50,
            SpanPass::Strikethrough => 60,
            SpanPass::FootnoteReferences => 65,
            SpanPass::HardBreaks => 70,
            SpanPass::Abbreviations => 80,
        }
    }

    fn extra_only(self) -> bool {
        matches!(self, SpanPass::FootnoteReferences | SpanPass::Abbreviations)
    }
}

/// The passes of `P` enabled for `flavor`, in ascending priority.
pub(crate) fn build<P: Pass>(flavor: Flavor) -> Vec<P> {
    let mut passes: Vec<P> = P::ALL
        .iter()
        .copied()
        .filter(|pass| flavor == Flavor::Extra || !pass.extra_only())
        .collect();
    passes.sort_by_key(|pass| pass.priority());
    passes
}
