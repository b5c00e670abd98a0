use crate::config::Config;
use crate::error::Result;
use crate::escape::normalize_link_id;
use crate::hash::{Boundary, HashStore};
use crate::patterns::{escape_literal, Patterns};
use fancy_regex::Regex;
use log::warn;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

/// Scratch state for one conversion.
///
/// Built fresh by every call and dropped at the end of it, so a shared
/// [`crate::Markdown`] never carries state from one document to the next.
#[derive(Debug)]
pub(crate) struct Context {
    pub hashes: HashStore,
    pub urls: HashMap<String, String>,
    pub titles: HashMap<String, String>,

    /// Footnote definitions not referenced yet, keyed by prefixed id.
    pub footnotes: HashMap<String, String>,
    /// Referenced footnotes in emission order.
    pub footnotes_ordered: VecDeque<(String, String)>,
    /// Raw ids of footnote references, indexed by placeholder number.
    pub footnote_refs: Vec<String>,
    pub footnote_counter: usize,

    pub abbreviations: HashMap<String, String>,
    pub abbreviation_words: Vec<String>,
    pub abbreviation_pattern: Option<Regex>,

    pub in_anchor: bool,
    pub list_level: usize,

    depth: usize,
    max_depth: usize,
    pub limit_hit: Option<usize>,

    scanners: HashMap<(usize, String, bool), Rc<Regex>>,
    /// Start addresses, within the text being hashed, of HTML elements
    /// already found to never close.
    pub unbalanced: HashSet<usize>,
}

impl Context {
    pub fn new(config: &Config) -> Self {
        let mut context = Self {
            hashes: HashStore::default(),
            urls: config
                .predefined_links
                .iter()
                .map(|(id, url)| (normalize_link_id(id), url.clone()))
                .collect(),
            titles: config
                .predefined_titles
                .iter()
                .map(|(id, title)| (normalize_link_id(id), title.clone()))
                .collect(),
            footnotes: HashMap::new(),
            footnotes_ordered: VecDeque::new(),
            footnote_refs: Vec::new(),
            footnote_counter: 1,
            abbreviations: HashMap::new(),
            abbreviation_words: Vec::new(),
            abbreviation_pattern: None,
            in_anchor: false,
            list_level: 0,
            depth: 0,
            max_depth: config.max_nesting_depth,
            limit_hit: None,
            scanners: HashMap::new(),
            unbalanced: HashSet::new(),
        };
        if config.is_extra() {
            for (word, description) in &config.predefined_abbreviations {
                context.add_abbreviation(word, description);
            }
        }
        context
    }

    pub fn hash(&mut self, fragment: &str, boundary: Boundary) -> String {
        self.hashes.insert(fragment, boundary)
    }

    pub fn unhash(&self, text: &str) -> String {
        self.hashes.resolve(text)
    }

    pub fn add_abbreviation(&mut self, word: &str, description: &str) {
        self.abbreviation_words.push(word.to_string());
        self.abbreviations
            .insert(word.to_string(), description.trim().to_string());
        self.abbreviation_pattern = None;
    }

    /// Compiles the alternation of every known abbreviation word.
    pub fn compile_abbreviations(&mut self) {
        if self.abbreviation_words.is_empty() {
            self.abbreviation_pattern = None;
            return;
        }
        let words: Vec<String> = self
            .abbreviation_words
            .iter()
            .map(|word| escape_literal(word))
            .collect();
        let pattern = format!(r"(?<![\w\x1A])(?:{})(?![\w\x1A])", words.join("|"));
        match Regex::new(&pattern) {
            Ok(re) => self.abbreviation_pattern = Some(re),
            Err(err) => {
                warn!("abbreviations disabled, pattern failed to compile: {}", err);
                self.abbreviation_pattern = None;
            }
        }
    }

    /// Enters one nesting level. Returns `false` once the configured limit
    /// is reached; the caller then renders its input literally.
    pub fn enter(&mut self) -> bool {
        if self.depth >= self.max_depth {
            if self.limit_hit.is_none() {
                warn!(
                    "nesting depth limit of {} reached, rendering the rest literally",
                    self.max_depth
                );
                self.limit_hit = Some(self.max_depth);
            }
            return false;
        }
        self.depth += 1;
        true
    }

    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Markdown-side HTML scanner for the given nesting situation.
    pub fn scanner(
        &mut self,
        patterns: &Patterns,
        indent: usize,
        enclosing: &str,
        span: bool,
        tab_width: usize,
    ) -> Result<Rc<Regex>> {
        let key = (indent, enclosing.to_string(), span);
        if let Some(re) = self.scanners.get(&key) {
            return Ok(Rc::clone(re));
        }
        let re = Rc::new(patterns.markdown_scanner(indent, enclosing, span, tab_width)?);
        self.scanners.insert(key, Rc::clone(&re));
        Ok(re)
    }
}
