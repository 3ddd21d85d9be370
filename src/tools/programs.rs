use crate::core::error::FetchError;
use crate::scraping::fetcher::{fetch_raw, RawPage};
use regex::Regex;
use reqwest::header::HeaderMap;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::info;

const MIN_TITLE_CHARS: usize = 4;
const MAX_TITLE_CHARS: usize = 160;
const MAX_TITLES: usize = 250;

fn program_title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b(?:(?:M\.?S\.?|MSc|Master(?:'s)?|B\.?S\.?|BSc|Bachelor(?:'s)?|Ph\.?D\.?|Doctor(?:ate)?|MBA|MPH|MFA|LLM)\b.*|.*\b(?:in|of)\s+[A-Z][A-Za-z&\-/\s]{2,})",
        )
        .expect("program title regex")
    })
}

/// Does this text look like a degree program title ("MS in Data Science",
/// "Bachelor of Arts", "Doctorate of Nursing Practice")?
pub fn looks_like_program_title(text: &str) -> bool {
    let len = text.chars().count();
    (MIN_TITLE_CHARS..=MAX_TITLE_CHARS).contains(&len) && program_title_re().is_match(text)
}

/// Candidate program titles from headings, links and list items, in document
/// order, de-duplicated case-insensitively.
pub fn detect_program_titles(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("h1, h2, h3, h4, a, li") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut titles = Vec::new();
    for element in document.select(&selector) {
        let text = element
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !looks_like_program_title(&text) {
            continue;
        }
        if seen.insert(text.to_lowercase()) {
            titles.push(text);
            if titles.len() >= MAX_TITLES {
                break;
            }
        }
    }
    titles
}

/// Fetch a programs listing page and return the detected titles.
pub async fn extract_program_titles(
    client: &reqwest::Client,
    url: &str,
    headers: &HeaderMap,
    timeout: Duration,
) -> Result<Vec<String>, FetchError> {
    match fetch_raw(client, url, headers, timeout).await? {
        RawPage::Html { body, .. } => {
            let titles = detect_program_titles(&body);
            info!("Detected {} program titles on {}", titles.len(), url);
            Ok(titles)
        }
        RawPage::NonHtml => Err(FetchError::new(
            url,
            format!("{} is not an HTML page", url),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_patterns() {
        assert!(looks_like_program_title("MS in Computer Science"));
        assert!(looks_like_program_title("Bachelor's Degree"));
        assert!(looks_like_program_title("Master of Public Health"));
        assert!(looks_like_program_title("Graduate Certificate in Nursing"));
        assert!(!looks_like_program_title("Apply now"));
        assert!(!looks_like_program_title("MBA"));
        assert!(!looks_like_program_title("School of"));
    }

    #[test]
    fn test_detect_dedupes_and_skips_noise() {
        let html = r#"<html><body>
            <h1>Graduate Programs</h1>
            <ul>
              <li><a href="/cs">MS in Computer Science</a></li>
              <li><a href="/ds">MSc Data Science</a></li>
              <li>Contact us</li>
            </ul>
            <a href="/cs2">ms in computer science</a>
            <h3>PhD Biology</h3>
        </body></html>"#;
        let titles = detect_program_titles(html);
        assert_eq!(
            titles,
            vec![
                "MS in Computer Science".to_string(),
                "MSc Data Science".to_string(),
                "PhD Biology".to_string(),
            ]
        );
    }
}
