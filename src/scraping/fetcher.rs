use crate::core::error::FetchError;
use crate::extraction::literal;
use crate::scraping::content::{
    collect_links, extract_page_content, is_static_asset, netloc, summarize_text,
};
use crate::types::{EntityKind, PageResult, PageStatus};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use scraper::Html;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Per-request knobs shared by every fetch of one crawl.
#[derive(Clone, Debug)]
pub struct FetchOptions {
    pub headers: HeaderMap,
    pub timeout: Duration,
    pub max_links: usize,
    pub snippet_chars: usize,
    pub same_domain: bool,
    /// Network location of the crawl root; children elsewhere are dropped when `same_domain`.
    pub root_netloc: String,
}

/// A fetched page plus the child URLs worth handing to the frontier.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub result: PageResult,
    pub child_urls: Vec<String>,
}

impl FetchedPage {
    pub fn is_error(&self) -> bool {
        self.result.status.is_error()
    }
}

pub enum RawPage {
    Html { status: u16, body: String },
    NonHtml,
}

/// GET `url` with the pooled client. Non-2xx and transport failures become `FetchError`.
/// No retries here: most failures are permanent and the scheduler decides what to do.
pub async fn fetch_raw(
    client: &reqwest::Client,
    url: &str,
    headers: &HeaderMap,
    timeout: Duration,
) -> Result<RawPage, FetchError> {
    let response = client
        .get(url)
        .headers(headers.clone())
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                FetchError::new(url, format!("timed out after {}s", timeout.as_secs()))
            } else {
                FetchError::new(url, e.to_string())
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::new(
            url,
            format!("HTTP {} for {}", status.as_u16(), url),
        ));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();
    if !content_type.contains("text/html") {
        debug!("Skipping non-html {} ({})", url, content_type);
        return Ok(RawPage::NonHtml);
    }

    let body = response
        .text()
        .await
        .map_err(|e| FetchError::new(url, format!("body read failed: {}", e)))?;

    Ok(RawPage::Html {
        status: status.as_u16(),
        body,
    })
}

/// Fetch one crawl page. Never fails: errors come back as a `PageResult`
/// with status `error` and the message attached.
pub async fn fetch_page(client: &reqwest::Client, url: &str, opts: &FetchOptions) -> FetchedPage {
    match fetch_raw(client, url, &opts.headers, opts.timeout).await {
        Ok(RawPage::NonHtml) => FetchedPage {
            result: PageResult::non_html(url),
            child_urls: Vec::new(),
        },
        Ok(RawPage::Html { status, body }) => process_html(url, status, &body, opts),
        Err(e) => {
            warn!("Failed to fetch {}: {}", url, e.message);
            FetchedPage {
                result: PageResult::failed(url, e.message),
                child_urls: Vec::new(),
            }
        }
    }
}

/// Parse a fetched body into a `PageResult` and pick the child URLs to enqueue.
pub fn process_html(url: &str, status: u16, body: &str, opts: &FetchOptions) -> FetchedPage {
    let Ok(base_url) = Url::parse(url) else {
        return FetchedPage {
            result: PageResult::failed(url, format!("invalid URL: {}", url)),
            child_urls: Vec::new(),
        };
    };

    let document = Html::parse_document(body);
    let links = collect_links(&document, &base_url, opts.max_links);
    let content = extract_page_content(&document);
    let fields = literal::extract_literal_fields(&content.text, EntityKind::College);

    let child_urls = links
        .iter()
        .map(|l| l.url.clone())
        .filter(|href| !is_static_asset(href))
        .filter(|href| {
            !opts.same_domain || netloc(href).as_deref() == Some(opts.root_netloc.as_str())
        })
        .collect();

    FetchedPage {
        result: PageResult {
            url: url.to_string(),
            status: PageStatus::Code(status),
            error: String::new(),
            title: content.title,
            heading: content.heading,
            text: summarize_text(&content.text, opts.snippet_chars),
            fields,
            links,
        },
        child_urls,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(same_domain: bool) -> FetchOptions {
        FetchOptions {
            headers: HeaderMap::new(),
            timeout: Duration::from_secs(5),
            max_links: 80,
            snippet_chars: 1600,
            same_domain,
            root_netloc: "uni.edu".to_string(),
        }
    }

    #[test]
    fn test_process_html_filters_children() {
        let body = r#"<html><head><title>Uni</title></head><body><main>
            <h1>Welcome</h1><p>Phone: (555) 123-4567</p>
            <a href="/about">About</a><a href="/logo.png">Logo</a>
            <a href="https://other.org/x">Elsewhere</a></main></body></html>"#;

        let page = process_html("https://uni.edu/", 200, body, &opts(true));
        assert_eq!(page.result.status, PageStatus::Code(200));
        assert_eq!(page.result.title, "Uni");
        assert_eq!(page.result.heading, "Welcome");
        assert_eq!(page.result.fields.get("Phone").map(String::as_str), Some("(555) 123-4567"));
        assert_eq!(page.result.links.len(), 3);
        assert_eq!(page.child_urls, vec!["https://uni.edu/about".to_string()]);

        let page = process_html("https://uni.edu/", 200, body, &opts(false));
        assert_eq!(page.child_urls.len(), 2);
    }

    #[test]
    fn test_snippet_is_bounded() {
        let long: String = (0..400).map(|i| format!("<p>line number {}</p>", i)).collect();
        let body = format!("<html><body><main>{}</main></body></html>", long);
        let mut o = opts(true);
        o.snippet_chars = 100;
        let page = process_html("https://uni.edu/", 200, &body, &o);
        assert!(page.result.text.ends_with("\n..."));
        assert!(page.result.text.chars().count() <= 104);
    }
}
