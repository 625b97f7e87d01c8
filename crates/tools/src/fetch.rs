//! `read_webpage` backend: fetch a URL with strict limits and reduce the
//! HTML to readable text.
//!
//! Limits:
//! - Hard timeout (default 20s)
//! - Max response size (default 5MB)
//! - Max text output (default 300k chars)
//! - Redirect limit (5 hops)
//!
//! Failures never escape: they come back as an `Error reading webpage: ...`
//! string so the model can see what went wrong.

use std::time::Duration;

use futures_util::StreamExt;
use scraper::{ElementRef, Html, Node};
use tc_domain::config::FetchConfig;
use tc_domain::error::{Error, Result};

/// Subtrees that carry page chrome rather than content.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "nav", "header", "footer"];

pub struct WebFetch {
    client: reqwest::Client,
    cfg: FetchConfig,
}

impl WebFetch {
    pub fn new(cfg: FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Http(format!("build fetch client: {e}")))?;
        Ok(Self { client, cfg })
    }

    pub fn preview_chars(&self) -> usize {
        self.cfg.preview_chars
    }

    /// Fetch `url` and return its readable text, or an error description.
    pub async fn fetch(&self, url: &str) -> String {
        match self.fetch_inner(url).await {
            Ok(text) => {
                tracing::info!(url = %url, chars = text.chars().count(), "webpage read");
                text
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "webpage read failed");
                format!("Error reading webpage: {e}")
            }
        }
    }

    async fn fetch_inner(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, &self.cfg.user_agent)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        // Error pages still carry readable text; the status is only logged.
        let status = resp.status();
        if !status.is_success() {
            tracing::debug!(
                url = %url,
                status = status.as_u16(),
                "non-success status, reading body anyway"
            );
        }

        // Stream body with hard byte cap; anything past it is dropped.
        let mut stream = resp.bytes_stream();
        let mut buf: Vec<u8> = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::Http(e.to_string()))?;
            let room = self.cfg.max_bytes - buf.len();
            if chunk.len() > room {
                buf.extend_from_slice(&chunk[..room]);
                tracing::debug!(url = %url, max_bytes = self.cfg.max_bytes, "body capped");
                break;
            }
            buf.extend_from_slice(&chunk);
        }

        let html = String::from_utf8_lossy(&buf);
        Ok(html_to_text(&html, self.cfg.max_text_chars))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HTML → text
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Extract readable text from an HTML document.
///
/// Links survive as `[ text ]( href )` so the model can follow them.
pub fn html_to_text(html: &str, max_chars: usize) -> String {
    let doc = Html::parse_document(html);
    let mut raw = String::new();
    collect_text(doc.root_element(), &mut raw);

    let text = collapse_whitespace(&raw);
    if text.chars().count() > max_chars {
        text.chars().take(max_chars).collect()
    } else {
        text
    }
}

fn collect_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) => {
                let name = e.name();
                if SKIPPED_ELEMENTS.contains(&name) {
                    continue;
                }
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                match e.attr("href") {
                    Some(href) if name == "a" && !href.is_empty() => {
                        let mut label = String::new();
                        collect_text(child_el, &mut label);
                        out.push_str(&format!("[ {label} ]( {href} )"));
                    }
                    _ => collect_text(child_el, out),
                }
            }
            _ => {}
        }
    }
}

/// Strip each line, split on double spaces, and join the non-empty pieces
/// with single spaces.
fn collapse_whitespace(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .flat_map(|line| line.split("  "))
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Crab Facts</title><style>body { color: red; }</style></head>
<body>
  <header>Site banner</header>
  <nav><a href="/home">Home</a></nav>
  <h1>Crabs</h1>
  <p>Crabs walk   sideways.</p>
  <p>See <a href="https://example.com/crabs">more crabs</a> here.</p>
  <p><a href="">empty link</a> and <a>no href</a></p>
  <script>var tracking = 1;</script>
  <footer>Copyright</footer>
</body>
</html>"#;

    #[test]
    fn strips_chrome_and_renders_links() {
        let text = html_to_text(PAGE, 10_000);
        assert!(text.contains("Crab Facts"));
        assert!(text.contains("Crabs walk sideways."));
        assert!(text.contains("See [ more crabs ]( https://example.com/crabs ) here."));
        assert!(text.contains("empty link and no href"));
        for hidden in ["Site banner", "Home", "tracking", "Copyright", "color: red"] {
            assert!(!text.contains(hidden), "{hidden} should be stripped: {text}");
        }
    }

    #[test]
    fn output_is_single_spaced() {
        let text = html_to_text(PAGE, 10_000);
        assert!(!text.contains("  "));
        assert!(!text.contains('\n'));
        assert_eq!(text, text.trim());
    }

    #[test]
    fn truncates_by_characters() {
        let html = format!("<p>{}</p>", "é".repeat(50));
        let text = html_to_text(&html, 10);
        assert_eq!(text.chars().count(), 10);
    }

    #[test]
    fn link_label_skips_scripts() {
        let html = r#"<p><a href="/docs">Docs<script>track()</script><style>a{}</style></a></p>"#;
        assert_eq!(html_to_text(html, 1_000), "[ Docs ]( /docs )");
    }

    #[test]
    fn collapse_keeps_single_spaces_inside_chunks() {
        assert_eq!(collapse_whitespace("  a b  \n\n  c    d \n"), "a b c d");
    }

    #[tokio::test]
    async fn invalid_url_reports_error_text() {
        let fetcher = WebFetch::new(FetchConfig::default()).unwrap();
        let text = fetcher.fetch("not a url").await;
        assert!(text.starts_with("Error reading webpage:"), "{text}");
    }

    /// Serve one HTTP response on a local port and return its URL.
    async fn serve_once(status: &'static str, body: String) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut req = [0u8; 4096];
            let _ = socket.read(&mut req).await;
            let head = format!(
                "HTTP/1.1 {status}\r\nContent-Type: text/html\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = socket.write_all(head.as_bytes()).await;
            // The client hangs up early once its byte cap is reached.
            let _ = socket.write_all(body.as_bytes()).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}/")
    }

    #[tokio::test]
    async fn error_status_page_text_is_returned() {
        let url = serve_once(
            "404 Not Found",
            r#"<p>Page moved, see <a href="/new">new page</a></p>"#.to_string(),
        )
        .await;
        let fetcher = WebFetch::new(FetchConfig::default()).unwrap();
        let text = fetcher.fetch(&url).await;
        assert_eq!(text, "Page moved, see [ new page ]( /new )");
    }

    #[tokio::test]
    async fn oversized_body_is_truncated_not_rejected() {
        let body = format!("<p>{}</p>", "crab ".repeat(100_000));
        let url = serve_once("200 OK", body).await;
        let cfg = FetchConfig {
            max_bytes: 64 * 1024,
            max_text_chars: 1_000,
            ..FetchConfig::default()
        };
        let fetcher = WebFetch::new(cfg).unwrap();
        let text = fetcher.fetch(&url).await;
        assert!(!text.starts_with("Error reading webpage"), "{text}");
        assert_eq!(text.chars().count(), 1_000);
        assert!(text.starts_with("crab crab"));
    }
}
