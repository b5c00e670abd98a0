//! A Markdown and Markdown Extra to HTML converter.

mod block;
pub mod config;
mod context;
mod deflist;
mod emphasis;
pub mod error;
mod escape;
mod gamut;
mod hash;
mod html_block;
mod markdown;
mod patterns;
mod span;
mod tables;
mod text;

pub use config::{Config, Flavor};
pub use error::{MarkdownError, Result};
pub use markdown::Markdown;

use log::error;
use std::sync::LazyLock;

static DEFAULT_CONVERTER: LazyLock<Option<Markdown>> = LazyLock::new(|| {
    Markdown::new(Config::default())
        .map_err(|err| error!("default converter failed to build: {}", err))
        .ok()
});

/// Convert Markdown Extra text to HTML with the default configuration
pub fn markdown_to_html(markdown: &str) -> String {
    convert_or_empty(DEFAULT_CONVERTER.as_ref(), markdown)
}

/// Output is always newline-terminated, even without a converter.
fn convert_or_empty(converter: Option<&Markdown>, markdown: &str) -> String {
    converter.map_or_else(|| "\n".to_string(), |converter| converter.transform(markdown))
}

/// Convert text to HTML with `config`, building a converter for the call
pub fn markdown_to_html_with(markdown: &str, config: &Config) -> Result<String> {
    Markdown::new(config.clone())?.try_transform(markdown)
}
