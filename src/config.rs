use crate::error::{MarkdownError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Feature set selected for a converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flavor {
    /// Classic Markdown syntax only.
    Basic,
    /// Markdown plus fenced code, tables, definition lists, footnotes,
    /// abbreviations, header ids and `markdown="1"` HTML blocks.
    #[default]
    Extra,
}

/// Converter configuration.
///
/// Read once when a [`crate::Markdown`] is built; never mutated while a
/// conversion is running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub flavor: Flavor,
    /// Columns per tab stop, also the indentation of a code block.
    pub tab_width: usize,
    /// Suffix closing empty elements such as `<br />`. Use `">"` for HTML output.
    pub empty_element_suffix: String,
    /// Escape every raw HTML tag instead of passing it through.
    pub no_markup: bool,
    /// Escape every `&`, even when it starts a character entity.
    pub no_entities: bool,
    pub predefined_links: BTreeMap<String, String>,
    pub predefined_titles: BTreeMap<String, String>,
    pub footnote_id_prefix: String,
    /// Title of footnote links; `%%` is replaced by the footnote number.
    pub footnote_link_title: String,
    pub footnote_backlink_title: String,
    pub footnote_link_class: String,
    pub footnote_backlink_class: String,
    pub predefined_abbreviations: BTreeMap<String, String>,
    /// Levels of balanced brackets accepted inside link text.
    pub nested_brackets_depth: usize,
    /// Levels of balanced parentheses accepted inside a link URL.
    pub nested_url_parenthesis_depth: usize,
    /// Maximum recursion depth for nested blocks, spans and HTML regions.
    pub max_nesting_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            flavor: Flavor::Extra,
            tab_width: 4,
            empty_element_suffix: " />".to_string(),
            no_markup: false,
            no_entities: false,
            predefined_links: BTreeMap::new(),
            predefined_titles: BTreeMap::new(),
            footnote_id_prefix: String::new(),
            footnote_link_title: String::new(),
            footnote_backlink_title: String::new(),
            footnote_link_class: String::new(),
            footnote_backlink_class: String::new(),
            predefined_abbreviations: BTreeMap::new(),
            nested_brackets_depth: 6,
            nested_url_parenthesis_depth: 4,
            max_nesting_depth: 32,
        }
    }
}

impl Config {
    pub fn basic() -> Self {
        Self {
            flavor: Flavor::Basic,
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tab_width == 0 {
            return Err(MarkdownError::invalid_config("tab_width must be at least 1"));
        }
        if self.nested_brackets_depth == 0 || self.nested_url_parenthesis_depth == 0 {
            return Err(MarkdownError::invalid_config(
                "nested bracket and parenthesis depths must be at least 1",
            ));
        }
        if self.max_nesting_depth == 0 {
            return Err(MarkdownError::invalid_config(
                "max_nesting_depth must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn is_extra(&self) -> bool {
        self.flavor == Flavor::Extra
    }

    /// Characters that a backslash turns into literal text.
    pub fn escape_chars(&self) -> &'static str {
        match self.flavor {
            Flavor::Basic => "\\`*_{}[]()>#+-~.!",
            Flavor::Extra => "\\`*_{}[]()>#+-~.!:|",
        }
    }
}
