//! HTML transformer backed by `scraper`.

use crate::pipeline::error::TransformError;
use crate::pipeline::Transformer;
use scraper::{Html, Selector};
use std::sync::LazyLock;

static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("Invalid selector"));
static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("Invalid selector"));
static BODY_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("Invalid selector"));

/// Summary of a parsed HTML page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HtmlDocument {
    /// Trimmed contents of the first `<title>`, if present and non-empty
    pub title: Option<String>,
    /// `href` values of all anchors, in document order
    pub links: Vec<String>,
    /// Length in bytes of the body's visible text, whitespace-collapsed
    pub text_length: usize,
}

/// Parses HTML text into an [`HtmlDocument`].
///
/// Malformed markup is accepted the way browsers accept it. Only input that
/// is empty or all whitespace is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlParser;

impl HtmlParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, html: &str) -> Result<HtmlDocument, TransformError> {
        if html.trim().is_empty() {
            return Err(TransformError::new("empty document"));
        }

        let document = Html::parse_document(html);

        let title = document
            .select(&TITLE_SELECTOR)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty());

        let links = document
            .select(&LINK_SELECTOR)
            .filter_map(|el| el.value().attr("href"))
            .map(str::to_string)
            .collect();

        let text_length = document
            .select(&BODY_SELECTOR)
            .flat_map(|body| body.text())
            .flat_map(str::split_whitespace)
            .map(|word| word.len() + 1)
            .sum::<usize>()
            .saturating_sub(1);

        Ok(HtmlDocument {
            title,
            links,
            text_length,
        })
    }
}

impl Transformer for HtmlParser {
    type Content = String;
    type Output = HtmlDocument;

    fn transform(&self, content: String) -> Result<HtmlDocument, TransformError> {
        self.parse(&content)
    }
}
