use crate::types::Link;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Elements whose text never counts as page content.
const NOISE_TAGS: &[&str] = &["script", "style", "noscript", "svg", "img", "video", "audio", "template"];

/// Layout chrome stripped before looking for the main region.
const BOILERPLATE_TAGS: &[&str] = &["header", "footer", "nav", "form", "aside"];

const STATIC_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp", ".ico", ".css", ".js", ".pdf", ".zip",
    ".rar", ".tar", ".gz", ".mp4", ".mp3", ".avi",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContent {
    pub title: String,
    pub heading: String,
    pub text: String,
}

/// Normalize a URL for the frontier: http(s) only, host required, fragment stripped.
///
/// Returns `None` for anything unusable instead of failing, so one malformed
/// href never aborts a crawl. Applying it twice gives the same result.
pub fn normalize_url(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let mut parsed = Url::parse(raw).ok()?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return None;
    }
    if parsed.host_str().map(str::is_empty).unwrap_or(true) {
        return None;
    }
    parsed.set_fragment(None);
    Some(parsed.to_string())
}

/// Network location (host plus explicit non-default port) used for same-domain checks.
pub fn netloc(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    Some(match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}

/// Images, stylesheets, scripts, archives and media are never fetched.
pub fn is_static_asset(raw: &str) -> bool {
    let path = match Url::parse(raw) {
        Ok(u) => u.path().to_ascii_lowercase(),
        Err(_) => raw.split(['?', '#']).next().unwrap_or("").to_ascii_lowercase(),
    };
    STATIC_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Trim every line and drop the blank ones.
pub fn clean_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Cut `text` to at most `limit` characters, preferring the last line break,
/// and mark the cut with a trailing `"\n..."`.
pub fn summarize_text(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let truncated: String = text.chars().take(limit).collect();
    let kept = match truncated.rfind('\n') {
        Some(cut) if cut > 0 => &truncated[..cut],
        _ => truncated.as_str(),
    };
    format!("{}\n...", kept)
}

/// Truncate on a char boundary without any marker.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        text.chars().take(limit).collect()
    }
}

fn tag_name(el: &ElementRef<'_>) -> String {
    el.value().name().to_ascii_lowercase()
}

/// Depth-first text walk. Each text node lands on its own line.
fn walk_text(
    el: ElementRef<'_>,
    skip_boilerplate: bool,
    skip: Option<ElementRef<'_>>,
    out: &mut String,
) {
    for child in el.children() {
        if skip.map(|s| *s) == Some(child) {
            continue;
        }
        match child.value() {
            Node::Text(t) => {
                out.push_str(t);
                out.push('\n');
            }
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    let name = tag_name(&child_el);
                    if NOISE_TAGS.contains(&name.as_str()) {
                        continue;
                    }
                    if skip_boilerplate && BOILERPLATE_TAGS.contains(&name.as_str()) {
                        continue;
                    }
                    walk_text(child_el, skip_boilerplate, skip, out);
                }
            }
            _ => {}
        }
    }
}

fn inside_boilerplate(el: &ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| BOILERPLATE_TAGS.contains(&tag_name(&a).as_str()))
}

fn first_in_region<'a>(region: ElementRef<'a>, selector: &str) -> Option<ElementRef<'a>> {
    let sel = Selector::parse(selector).ok()?;
    region.select(&sel).find(|el| !inside_boilerplate(el))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip boilerplate and pull out title, primary heading and body text.
///
/// The body comes from `main`, else `article`, else `body`. The first
/// `h1`/`h2`/`h3` of that region is returned as `heading` and left out of
/// `text`. When the narrowed region has no text the whole document is used,
/// boilerplate included, so a page with any text never comes back empty.
pub fn extract_page_content(document: &Html) -> PageContent {
    let root = document.root_element();

    let title = first_in_region(root, "title")
        .map(|t| collapse_whitespace(&t.text().collect::<String>()))
        .unwrap_or_default();

    let region = ["main", "article", "body"]
        .iter()
        .find_map(|sel| first_in_region(root, sel))
        .unwrap_or(root);

    let heading_el = ["h1", "h2", "h3"]
        .iter()
        .find_map(|sel| first_in_region(region, sel));
    let heading = heading_el
        .map(|h| collapse_whitespace(&h.text().collect::<Vec<_>>().join(" ")))
        .unwrap_or_default();

    let mut raw = String::new();
    walk_text(region, true, heading_el, &mut raw);
    let mut text = clean_text(&raw);

    if text.is_empty() {
        let mut whole = String::new();
        walk_text(root, false, None, &mut whole);
        text = clean_text(&whole);
    }

    PageContent {
        title,
        heading,
        text,
    }
}

/// Collect up to `max_links` unique absolute links from `a[href]`.
pub fn collect_links(document: &Html, base_url: &Url, max_links: usize) -> Vec<Link> {
    let mut links = Vec::new();
    let mut seen_urls = HashSet::new();

    let Ok(selector) = Selector::parse("a[href]") else {
        return links;
    };

    for element in document.select(&selector) {
        if links.len() >= max_links {
            break;
        }
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
        {
            continue;
        }

        let Some(absolute) = base_url
            .join(href)
            .ok()
            .and_then(|u| normalize_url(u.as_str()))
        else {
            continue;
        };

        if seen_urls.insert(absolute.clone()) {
            links.push(Link {
                url: absolute,
                text: collapse_whitespace(&element.text().collect::<Vec<_>>().join(" ")),
            });
        }
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url_strips_fragment_and_rejects_junk() {
        assert_eq!(
            normalize_url("https://example.edu/admissions#apply").as_deref(),
            Some("https://example.edu/admissions")
        );
        assert_eq!(normalize_url("ftp://example.edu/file"), None);
        assert_eq!(normalize_url("not a url"), None);
        assert_eq!(normalize_url(""), None);
    }

    #[test]
    fn test_normalize_url_is_idempotent() {
        for u in [
            "https://Example.edu",
            "http://example.edu:8080/a/../b?x=1#frag",
            "https://example.edu/path with space",
            "https://example.edu/?q=%20",
        ] {
            let once = normalize_url(u).unwrap();
            assert_eq!(normalize_url(&once).as_deref(), Some(once.as_str()), "{}", u);
        }
    }

    #[test]
    fn test_static_assets() {
        assert!(is_static_asset("https://x.edu/logo.PNG"));
        assert!(is_static_asset("https://x.edu/app.js?v=3"));
        assert!(!is_static_asset("https://x.edu/admissions"));
        assert!(!is_static_asset("https://x.edu/json-api"));
    }

    #[test]
    fn test_summarize_text_cuts_at_newline() {
        let text = "line one\nline two\nline three";
        assert_eq!(summarize_text(text, 100), text);
        assert_eq!(summarize_text(text, 12), "line one\n...");
    }

    #[test]
    fn test_extract_removes_boilerplate_and_heading() {
        let html = Html::parse_document(
            r#"<html><head><title> State University </title><script>var x=1;</script></head>
            <body><nav>Home | About</nav>
            <main><h1>Admissions</h1><p>Apply by March 1.</p><aside>Ad</aside></main>
            <footer>Copyright</footer></body></html>"#,
        );
        let content = extract_page_content(&html);
        assert_eq!(content.title, "State University");
        assert_eq!(content.heading, "Admissions");
        assert_eq!(content.text, "Apply by March 1.");
    }

    #[test]
    fn test_nav_only_page_falls_back_to_whole_document() {
        let html = Html::parse_document(
            "<html><nav>Graduate Admissions</nav><footer>Contact: 555-123-4567</footer></html>",
        );
        let content = extract_page_content(&html);
        assert_eq!(content.text, "Graduate Admissions\nContact: 555-123-4567");
    }

    #[test]
    fn test_collect_links_resolves_dedupes_and_caps() {
        let html = Html::parse_document(
            r##"<a href="/a">A</a><a href="/a#top">A again</a><a href="#x">skip</a>
            <a href="mailto:x@y.edu">mail</a><a href="javascript:void(0)">js</a>
            <a href=" b ">  B
            link </a><a href="/c">C</a>"##,
        );
        let base = Url::parse("https://x.edu/dir/").unwrap();
        let links = collect_links(&html, &base, 2);
        assert_eq!(
            links,
            vec![
                Link {
                    url: "https://x.edu/a".to_string(),
                    text: "A".to_string()
                },
                Link {
                    url: "https://x.edu/dir/b".to_string(),
                    text: "B link".to_string()
                },
            ]
        );
    }
}
