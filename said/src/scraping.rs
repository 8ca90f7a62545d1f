use anyhow::{Context, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use std::io::Cursor;
use tracing::{debug, warn};

/// Renders an HTML fragment as plain text. Falls back to the input when the
/// fragment cannot be rendered.
pub fn html_to_text(html: &str) -> String {
    match html2text::from_read(html.as_bytes(), 10_000) {
        Ok(text) => text,
        Err(e) => {
            warn!("scraping: failed to render HTML fragment as text: {}", e);
            html.to_string()
        }
    }
}

/// Scrapes the text of an article from the given URL.
/// Returns an empty string when nothing readable was found.
pub async fn scrape_article_text(client: &Client, url: &str) -> Result<String> {
    let response = client.get(url).send().await.context("failed to fetch article page")?;

    let status = response.status();
    if !status.is_success() {
        return Err(anyhow::anyhow!("article fetch failed with status: {}", status));
    }

    let html = response.text().await.context("failed to read response body")?;
    let url_obj = url::Url::parse(url).context("failed to parse article URL")?;

    // Readability needs a reader and a base URL to resolve relative links
    let mut reader = Cursor::new(html.as_bytes());
    match readability::extractor::extract(&mut reader, &url_obj) {
        Ok(product) if !product.content.trim().is_empty() => {
            let text = html_to_text(&product.content);
            debug!("scraping: readability extracted {} chars from {}", text.len(), url);
            return Ok(text);
        }
        Ok(_) => debug!("scraping: readability found no content in {}", url),
        Err(e) => warn!("scraping: readability failed for {}: {}", url, e),
    }

    Ok(extract_with_selectors(&html))
}

/// Heuristic extraction: the first content container that renders to text,
/// then every paragraph on the page.
pub fn extract_with_selectors(html: &str) -> String {
    let document = Html::parse_document(html);

    let selectors = ["article", "main", ".post-content", ".entry-content", "#content"];
    for selector_str in selectors {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = document.select(&selector).next() {
                let text = html_to_text(&element.html());
                if !text.trim().is_empty() {
                    debug!("scraping: found content using selector '{}'", selector_str);
                    return text;
                }
            }
        }
    }

    if let Ok(p_selector) = Selector::parse("p") {
        let paragraphs: Vec<String> = document
            .select(&p_selector)
            .map(|element| html_to_text(&element.html()))
            .filter(|text| !text.trim().is_empty())
            .collect();

        if !paragraphs.is_empty() {
            debug!("scraping: fell back to {} <p> tags", paragraphs.len());
            return paragraphs.join("\n\n");
        }
    }

    String::new()
}
