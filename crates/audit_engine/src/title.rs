use std::time::Duration;

use audit_logging::{audit_debug, audit_trace};
use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use scraper::{Html, Selector};

/// Only the head of the page is needed to find a title.
const TITLE_MAX_BYTES: usize = 512 * 1024;

/// Best-effort `<title>` lookup for a tested page.
///
/// Every failure (timeout, non-2xx, missing tag) yields `None`; a title is
/// never worth failing a status check over.
#[derive(Debug, Clone)]
pub struct TitleResolver {
    http: reqwest::Client,
    timeout: Duration,
}

impl TitleResolver {
    pub fn new(http: reqwest::Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    pub async fn resolve(&self, url: &str) -> Option<String> {
        match tokio::time::timeout(self.timeout, self.fetch(url)).await {
            Ok(title) => title,
            Err(_) => {
                audit_debug!("Title lookup timed out url={}", url);
                None
            }
        }
    }

    async fn fetch(&self, url: &str) -> Option<String> {
        let response = self
            .http
            .get(url)
            .header("accept", "text/html,application/xhtml+xml")
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            audit_trace!("Title lookup status={} url={}", response.status(), url);
            return None;
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.ok()?;
            let room = TITLE_MAX_BYTES.saturating_sub(bytes.len());
            bytes.extend_from_slice(&chunk[..chunk.len().min(room)]);
            if bytes.len() >= TITLE_MAX_BYTES {
                break;
            }
        }

        extract_title(&decode_html(&bytes, content_type.as_deref()))
    }
}

/// Decodes page bytes: BOM, then Content-Type charset, then detection.
/// Malformed sequences are replaced rather than rejected.
pub fn decode_html(bytes: &[u8], content_type: Option<&str>) -> String {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return encoding.decode(bytes).0.into_owned();
    }
    if let Some(encoding) = content_type
        .and_then(charset_label)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
    {
        return encoding.decode(bytes).0.into_owned();
    }
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, true).decode(bytes).0.into_owned()
}

fn charset_label(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|part| {
        let (name, value) = part.trim().split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim_matches(&[' ', '"', '\''][..]).to_string())
    })
}

/// First non-blank `<title>`, whitespace collapsed.
pub fn extract_title(html: &str) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let doc = Html::parse_document(html);
    doc.select(&selector)
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .find(|text| !text.is_empty())
}
