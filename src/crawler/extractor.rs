//! Content extraction
//!
//! Turns a fetched body into the structured content of an [`ExtractedPage`]:
//! - Title and meta description
//! - Outbound links (absolute, normalized, in document order)
//! - Markdown of the main content with boilerplate removed
//! - Word count, images and code blocks
//!
//! HTML goes through `scraper` and `htmd`. Plain text and markdown bodies are
//! taken as they are.

use crate::config::mime_essence;
use crate::job::{reading_time_minutes, CodeBlock, ExtractedPage, ImageRef};
use crate::url::{resolve_url, NormalizedUrl};
use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;
use thiserror::Error;
use url::Url;

/// Elements removed before the main content is converted
const BOILERPLATE: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "aside", "form", "iframe", "svg",
    "template",
];

/// Candidates for the main content element, most specific first
const CONTENT_ROOTS: &[&str] = &["main", "article", "[role='main']", "body"];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("{0}")]
    ParseFailure(String),
}

/// Content extracted from one response body
#[derive(Debug, Clone, Default)]
pub struct ExtractedContent {
    pub title: String,
    pub description: Option<String>,
    pub markdown: String,
    pub word_count: u64,
    pub links: Vec<NormalizedUrl>,
    pub images: Vec<ImageRef>,
    pub code_blocks: Vec<CodeBlock>,
}

impl ExtractedContent {
    /// Combines the content with fetch metadata into a page record
    pub fn into_page(
        self,
        url: &NormalizedUrl,
        depth: u32,
        http_status: u16,
        content_type: &str,
        fetched_at: DateTime<Utc>,
    ) -> ExtractedPage {
        ExtractedPage {
            url: url.to_string(),
            depth,
            title: self.title,
            description: self.description,
            markdown: self.markdown,
            raw_word_count: self.word_count,
            reading_time_minutes: reading_time_minutes(self.word_count),
            links: self.links.iter().map(|l| l.to_string()).collect(),
            images: self.images,
            code_blocks: self.code_blocks,
            http_status,
            content_type: content_type.to_string(),
            fetched_at,
        }
    }
}

/// Extracts structured content from a response body
///
/// # Arguments
///
/// * `body` - The decoded response body
/// * `content_type` - The response Content-Type (parameters allowed)
/// * `base_url` - Final URL of the response, used to resolve relative links
///
/// # Returns
///
/// * `Ok(ExtractedContent)` - Extracted content
/// * `Err(ExtractError::UnsupportedContentType)` - Not HTML, markdown or text
/// * `Err(ExtractError::ParseFailure)` - Empty body
///
/// # Example
///
/// ```no_run
/// use crawl_engine::crawler::extract;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let content = extract(html, "text/html", &base_url).unwrap();
/// assert_eq!(content.title, "Test");
/// ```
pub fn extract(body: &str, content_type: &str, base_url: &Url) -> Result<ExtractedContent, ExtractError> {
    let essence = mime_essence(content_type);
    let kind = match essence.as_str() {
        "" | "text/html" | "application/xhtml+xml" => BodyKind::Html,
        "text/markdown" | "text/x-markdown" => BodyKind::Markdown,
        "text/plain" => BodyKind::Text,
        _ => return Err(ExtractError::UnsupportedContentType(essence)),
    };

    if body.trim().is_empty() {
        return Err(ExtractError::ParseFailure("empty body".to_string()));
    }

    Ok(match kind {
        BodyKind::Html => extract_html(body, base_url),
        BodyKind::Markdown => extract_markdown(body, base_url),
        BodyKind::Text => extract_text(body),
    })
}

enum BodyKind {
    Html,
    Markdown,
    Text,
}

fn extract_html(body: &str, base_url: &Url) -> ExtractedContent {
    let mut document = Html::parse_document(body);

    // Links come from the whole page, navigation included
    let title = extract_title(&document);
    let description = extract_description(&document);
    let links = extract_links(&document, base_url);

    strip_boilerplate(&mut document);

    let root = content_root(&document);
    let markdown = html_to_markdown(&root.html());
    let word_count = count_words(root.text());

    ExtractedContent {
        title,
        description,
        markdown,
        word_count,
        links,
        images: extract_images(root, base_url),
        code_blocks: extract_code_blocks(root),
    }
}

fn selector(s: &str) -> Option<Selector> {
    Selector::parse(s).ok()
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// `<title>`, falling back to the first `<h1>`
fn extract_title(document: &Html) -> String {
    ["title", "h1"]
        .iter()
        .filter_map(|s| selector(s))
        .find_map(|sel| {
            document
                .select(&sel)
                .map(element_text)
                .find(|text| !text.is_empty())
        })
        .unwrap_or_default()
}

fn extract_description(document: &Html) -> Option<String> {
    ["meta[name='description']", "meta[property='og:description']"]
        .iter()
        .filter_map(|s| selector(s))
        .find_map(|sel| {
            document
                .select(&sel)
                .filter_map(|el| el.value().attr("content"))
                .map(str::trim)
                .find(|content| !content.is_empty())
                .map(str::to_string)
        })
}

/// Extracts all followable links from the document
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` anywhere in the document
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` and `data:` links
/// - Fragment-only links
/// - Anything that does not normalize to an http(s) URL
///
/// `rel="nofollow"` links are followed.
fn extract_links(document: &Html, base_url: &Url) -> Vec<NormalizedUrl> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    let mut push = |href: &str| {
        if let Some(url) = resolve_link(href, base_url) {
            if seen.insert(url.clone()) {
                links.push(url);
            }
        }
    };

    if let Some(a_selector) = selector("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }
            if let Some(href) = element.value().attr("href") {
                push(href);
            }
        }
    }

    if let Some(canonical_selector) = selector("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(href) = element.value().attr("href") {
                push(href);
            }
        }
    }

    links
}

fn resolve_link(href: &str, base_url: &Url) -> Option<NormalizedUrl> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    resolve_url(base_url, href).ok()
}

fn strip_boilerplate(document: &mut Html) {
    for tag in BOILERPLATE {
        let Some(sel) = selector(tag) else {
            continue;
        };
        let ids: Vec<_> = document.select(&sel).map(|el| el.id()).collect();
        for id in ids {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
            }
        }
    }
}

fn content_root(document: &Html) -> ElementRef<'_> {
    CONTENT_ROOTS
        .iter()
        .filter_map(|s| selector(s))
        .find_map(|sel| document.select(&sel).next())
        .unwrap_or_else(|| document.root_element())
}

fn html_to_markdown(html: &str) -> String {
    let markdown = htmd::convert(html).unwrap_or_else(|_| {
        // Fallback: strip tags and keep the text
        let fragment = Html::parse_fragment(html);
        element_text(fragment.root_element())
    });
    markdown.trim().to_string()
}

fn count_words<'a>(text: impl Iterator<Item = &'a str>) -> u64 {
    text.map(|t| t.split_whitespace().count() as u64).sum()
}

fn extract_images(root: ElementRef<'_>, base_url: &Url) -> Vec<ImageRef> {
    let Some(img_selector) = selector("img[src]") else {
        return Vec::new();
    };

    root.select(&img_selector)
        .filter_map(|img| {
            let src = img.value().attr("src")?.trim();
            if src.is_empty() || src.starts_with("data:") {
                return None;
            }
            let src = base_url.join(src).ok()?.to_string();
            let alt = img
                .value()
                .attr("alt")
                .map(str::trim)
                .filter(|alt| !alt.is_empty())
                .map(str::to_string);
            Some(ImageRef { src, alt })
        })
        .collect()
}

fn extract_code_blocks(root: ElementRef<'_>) -> Vec<CodeBlock> {
    let Some(pre_selector) = selector("pre") else {
        return Vec::new();
    };

    root.select(&pre_selector)
        .filter_map(|pre| {
            let code: String = pre.text().collect();
            let code = code.trim_matches('\n').to_string();
            if code.trim().is_empty() {
                return None;
            }
            Some(CodeBlock {
                language: code_language(pre),
                code,
            })
        })
        .collect()
}

/// Language declared on `<pre>` or its `<code>` child
///
/// Recognizes `language-*` and `lang-*` classes and `data-lang`.
fn code_language(pre: ElementRef<'_>) -> Option<String> {
    let code = selector("code").and_then(|sel| pre.select(&sel).next());

    for element in code.into_iter().chain(std::iter::once(pre)) {
        let value = element.value();
        if let Some(lang) = value.attr("data-lang").map(str::trim).filter(|l| !l.is_empty()) {
            return Some(lang.to_ascii_lowercase());
        }
        let declared = value.classes().find_map(|class| {
            class
                .strip_prefix("language-")
                .or_else(|| class.strip_prefix("lang-"))
        });
        if let Some(lang) = declared.filter(|l| !l.is_empty()) {
            return Some(lang.to_ascii_lowercase());
        }
    }

    None
}

fn markdown_link_regex() -> Option<&'static Regex> {
    static LINK: OnceLock<Option<Regex>> = OnceLock::new();
    LINK.get_or_init(|| Regex::new(r"\]\(\s*<?([^)\s>]+)>?(?:\s+[^)]*)?\)").ok())
        .as_ref()
}

fn extract_markdown(body: &str, base_url: &Url) -> ExtractedContent {
    let title = body
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("# "))
        .map(|t| t.trim().to_string())
        .unwrap_or_default();

    let mut seen = HashSet::new();
    let links = markdown_link_regex()
        .map(|re| {
            re.captures_iter(body)
                .filter_map(|caps| caps.get(1))
                .filter_map(|m| resolve_link(m.as_str(), base_url))
                .filter(|url| seen.insert(url.clone()))
                .collect()
        })
        .unwrap_or_default();

    ExtractedContent {
        title,
        description: None,
        markdown: body.trim().to_string(),
        word_count: count_words(std::iter::once(body)),
        links,
        images: Vec::new(),
        code_blocks: fenced_code_blocks(body),
    }
}

fn extract_text(body: &str) -> ExtractedContent {
    let title = body
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string();

    ExtractedContent {
        title,
        markdown: body.trim().to_string(),
        word_count: count_words(std::iter::once(body)),
        ..Default::default()
    }
}

/// Code blocks opened by ``` or ~~~ fences
fn fenced_code_blocks(markdown: &str) -> Vec<CodeBlock> {
    let mut blocks = Vec::new();
    let mut open: Option<(&str, Option<String>, Vec<&str>)> = None;

    for line in markdown.lines() {
        let trimmed = line.trim_start();
        match open.take() {
            None => {
                let fence = ["```", "~~~"].into_iter().find(|f| trimmed.starts_with(f));
                if let Some(fence) = fence {
                    let language = trimmed[fence.len()..]
                        .split_whitespace()
                        .next()
                        .map(|l| l.to_ascii_lowercase());
                    open = Some((fence, language, Vec::new()));
                }
            }
            Some((fence, language, mut lines)) => {
                if trimmed.starts_with(fence) {
                    blocks.push(CodeBlock {
                        language,
                        code: lines.join("\n"),
                    });
                } else {
                    lines.push(line);
                    open = Some((fence, language, lines));
                }
            }
        }
    }

    // An unterminated fence runs to the end of the document
    if let Some((_, language, lines)) = open {
        blocks.push(CodeBlock {
            language,
            code: lines.join("\n"),
        });
    }

    blocks
}
