//! `web_search` backend: scrape the DuckDuckGo HTML results page.
//!
//! Limits:
//! - Hard request timeout (default 20s)
//! - Browser User-Agent; the HTML endpoint refuses bare client agents
//! - No retries; network and status failures propagate to the caller

use std::time::Duration;

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tc_domain::config::SearchConfig;
use tc_domain::error::{Error, Result};

/// One organic search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    pub description: Option<String>,
}

pub struct WebSearch {
    client: reqwest::Client,
    cfg: SearchConfig,
}

impl WebSearch {
    pub fn new(cfg: SearchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Http(format!("build search client: {e}")))?;
        Ok(Self { client, cfg })
    }

    pub fn default_num_results(&self) -> usize {
        self.cfg.default_num_results
    }

    /// Run `query` and return at most `num_results` hits in page order.
    pub async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchResult>> {
        let url = format!("{}?q={}", self.cfg.endpoint, urlencoding::encode(query));
        tracing::debug!(url = %url, "web search request");

        let resp = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, &self.cfg.user_agent)
            .send()
            .await
            .map_err(|e| search_error(&e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Http(format!(
                "search endpoint returned HTTP {}",
                status.as_u16()
            )));
        }

        let body = resp.text().await.map_err(|e| search_error(&e))?;
        let results = parse_results(&body, num_results)?;
        tracing::info!(query = %query, hits = results.len(), "web search finished");
        Ok(results)
    }
}

fn search_error(e: &reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(format!("search: {e}"))
    } else {
        Error::Http(format!("search: {e}"))
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Other(format!("invalid selector {css:?}: {e:?}")))
}

fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Parse a results page. Hits without a title or link are skipped before
/// the `num_results` cap is applied.
pub fn parse_results(html: &str, num_results: usize) -> Result<Vec<SearchResult>> {
    let doc = Html::parse_document(html);
    let result_sel = selector("div.result")?;
    let title_sel = selector("a.result__a")?;
    let snippet_sel = selector("a.result__snippet")?;

    let mut out = Vec::new();
    for block in doc.select(&result_sel) {
        if out.len() >= num_results {
            break;
        }
        let Some(anchor) = block.select(&title_sel).next() else {
            continue;
        };
        let title = element_text(&anchor);
        let href = anchor.value().attr("href").unwrap_or("").trim();
        if title.is_empty() || href.is_empty() {
            continue;
        }
        let description = block
            .select(&snippet_sel)
            .next()
            .map(|s| element_text(&s));

        out.push(SearchResult {
            title,
            link: unwrap_redirect(href),
            description,
        });
    }
    Ok(out)
}

/// Turn a `duckduckgo.com/l/?uddg=<target>&rut=...` redirect into the
/// target URL. Anything else is returned unchanged.
pub fn unwrap_redirect(link: &str) -> String {
    if !link.contains("duckduckgo.com/l/?uddg=") {
        return link.to_string();
    }
    let encoded = link.split_once("uddg=").map(|(_, rest)| rest).unwrap_or("");
    let decoded = urlencoding::decode_binary(encoded.as_bytes());
    let decoded = String::from_utf8_lossy(&decoded);
    match decoded.split_once("&rut=") {
        Some((target, _)) => target.to_string(),
        None => decoded.into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<html><body>
<div class="results">
  <div class="result results_links web-result">
    <h2><a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.rust-lang.org%2Flearn%3Fa%3D1&amp;rut=abc123">Learn Rust</a></h2>
    <a class="result__snippet" href="x">The <b>Rust</b> book and more.</a>
  </div>
  <div class="result">
    <a class="result__a" href="">No link here</a>
  </div>
  <div class="result">
    <a class="result__a" href="https://doc.rust-lang.org/std/">   </a>
  </div>
  <div class="result">
    <a class="result__a" href="https://crates.io/">crates.io</a>
  </div>
  <div class="result">
    <a class="result__a" href="https://docs.rs/">Docs.rs</a>
    <a class="result__snippet">Documentation host</a>
  </div>
</div>
</body></html>"#;

    #[test]
    fn parses_unwraps_and_skips_incomplete_hits() {
        let results = parse_results(PAGE, 5).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].title, "Learn Rust");
        assert_eq!(results[0].link, "https://www.rust-lang.org/learn?a=1");
        assert_eq!(results[0].description.as_deref(), Some("The Rust book and more."));
        assert_eq!(results[1].link, "https://crates.io/");
        assert_eq!(results[1].description, None);
        assert_eq!(results[2].title, "Docs.rs");
    }

    #[test]
    fn cap_counts_only_complete_hits() {
        let results = parse_results(PAGE, 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].title, "crates.io");
    }

    #[test]
    fn zero_results_requested() {
        assert!(parse_results(PAGE, 0).unwrap().is_empty());
    }

    #[test]
    fn empty_page_has_no_hits() {
        assert!(parse_results("<html></html>", 5).unwrap().is_empty());
    }

    #[test]
    fn direct_links_are_kept_verbatim() {
        assert_eq!(
            unwrap_redirect("https://example.com/a%20b"),
            "https://example.com/a%20b"
        );
    }

    #[test]
    fn redirect_without_rut_is_fully_decoded() {
        assert_eq!(
            unwrap_redirect("https://duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2F"),
            "https://example.com/"
        );
    }

    #[test]
    fn wrapped_links_unwrap_to_the_original() {
        let originals = [
            "https://example.com/search?q=rust&page=2",
            "https://example.com/a%20b/c?x=1%202",
            "https://de.wikipedia.org/wiki/Krebstiere_(Übersicht)",
            "https://例え.jp/パス?キー=値&b=2#frag",
        ];
        for original in originals {
            let wrapped = format!(
                "//duckduckgo.com/l/?uddg={}&rut=0a1b2c3d",
                urlencoding::encode(original)
            );
            assert_eq!(unwrap_redirect(&wrapped), original, "wrapped as {wrapped}");
        }
    }
}
