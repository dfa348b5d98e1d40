use audit_core::{Metrics, Phase, SiteInfo, StatusSnapshot};
use audit_logging::{audit_debug, audit_info, audit_warn};
use chrono::{DateTime, SecondsFormat};
use serde_json::Value;
use url::Url;

use crate::config::{AuditConfig, LocationPreset};
use crate::error::{map_json_error, map_reqwest_error};
use crate::title::TitleResolver;
use crate::ApiError;

const API_KEY_HEADER: &str = "X-WPT-API-KEY";

/// Accepted submission, as returned to the submitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub test_id: String,
    pub json_url: Option<String>,
}

/// Thin WebPageTest client: submit a run, read its status.
#[derive(Debug, Clone)]
pub struct WptClient {
    base_url: String,
    api_key: Option<String>,
    http: reqwest::Client,
    titles: TitleResolver,
}

impl WptClient {
    pub fn new(config: &AuditConfig) -> Result<Self, ApiError> {
        let http = config.http.build_client()?;
        Ok(Self {
            base_url: config.wpt_base_url.trim_end_matches('/').to_string(),
            api_key: config.wpt_api_key.clone(),
            titles: TitleResolver::new(http.clone(), config.title_timeout),
            http,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Url::parse(&format!("{}/{}", self.base_url, path))
            .map_err(|err| ApiError::invalid(format!("bad test runner URL: {err}")))
    }

    pub async fn submit(&self, url: &str, location: LocationPreset) -> Result<Submission, ApiError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(ApiError::NotConfigured {
                what: "WPT_API_KEY".to_string(),
                status: 500,
            });
        };

        let mut endpoint = self.endpoint("runtest.php")?;
        endpoint
            .query_pairs_mut()
            .append_pair("url", url)
            .append_pair("runs", "1")
            .append_pair("fvonly", "1")
            .append_pair("video", "0")
            .append_pair("f", "json")
            .append_pair("location", location.id());

        audit_info!("Submitting test url={} location={}", url, location.id());
        let response = self
            .http
            .post(endpoint)
            .header("accept", "application/json")
            .header(API_KEY_HEADER, api_key)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            audit_warn!("Submission rejected upstream status={}", status);
            return Err(ApiError::upstream(
                502,
                format!("WPT request failed ({})", status.as_u16()),
            ));
        }
        let json: Value = serde_json::from_str(&body).map_err(map_json_error)?;
        parse_submission(&json)
    }

    /// Current status of `job_id`; the page title is looked up once finished.
    pub async fn status(&self, job_id: &str) -> Result<StatusSnapshot, ApiError> {
        let mut endpoint = self.endpoint("jsonResult.php")?;
        endpoint
            .query_pairs_mut()
            .append_pair("test", job_id)
            .append_pair("f", "json");

        let response = self
            .http
            .get(endpoint)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(map_reqwest_error)?;
        if !response.status().is_success() {
            audit_warn!("Status fetch failed job={} status={}", job_id, response.status());
            return Err(ApiError::upstream(502, "Status fetch failed"));
        }
        let body = response.text().await.map_err(map_reqwest_error)?;
        let json: Value = serde_json::from_str(&body).map_err(map_json_error)?;

        let mut snapshot = parse_status(&json);
        audit_debug!("Status job={} phase={}", job_id, snapshot.phase);
        if snapshot.phase == Phase::Finished && snapshot.site.site_title.is_none() {
            if let Some(site_url) = snapshot.site.site_url.clone() {
                snapshot.site.site_title = self.titles.resolve(&site_url).await;
            }
        }
        Ok(snapshot)
    }
}

pub fn parse_submission(json: &Value) -> Result<Submission, ApiError> {
    let accepted = json.get("statusCode").and_then(Value::as_u64) == Some(200);
    let test_id = json
        .pointer("/data/testId")
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty());

    match (accepted, test_id) {
        (true, Some(test_id)) => Ok(Submission {
            test_id: test_id.to_string(),
            json_url: text(json.pointer("/data/jsonUrl")),
        }),
        _ => {
            let message = text(json.get("statusText"))
                .unwrap_or_else(|| "WebPageTest did not return a testId".to_string());
            audit_warn!("Submission not accepted: {}", message);
            Err(ApiError::upstream(502, message))
        }
    }
}

pub fn phase_for_status_code(code: Option<u64>) -> Phase {
    match code {
        Some(100 | 101) => Phase::Queued,
        Some(102..=199) => Phase::Running,
        Some(200) => Phase::Finished,
        Some(code) if code >= 400 => Phase::Error,
        _ => Phase::Queued,
    }
}

/// Folds a `jsonResult.php` payload into a snapshot.
pub fn parse_status(json: &Value) -> StatusSnapshot {
    let phase = phase_for_status_code(json.get("statusCode").and_then(Value::as_u64));
    let data = json.get("data").unwrap_or(&Value::Null);

    let site = SiteInfo {
        site_url: text(data.get("url")).or_else(|| text(data.get("testUrl"))),
        site_title: None,
        run_at: data
            .get("completed")
            .and_then(Value::as_i64)
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        summary_url: text(data.get("summary")),
        json_url: text(data.get("jsonUrl")),
    };

    StatusSnapshot {
        phase,
        status_text: text(json.get("statusText")),
        metrics: match phase {
            Phase::Finished => parse_first_view(data),
            _ => None,
        },
        site,
    }
}

fn parse_first_view(data: &Value) -> Option<Metrics> {
    let view = data
        .pointer("/runs/1/firstView")
        .or_else(|| data.pointer("/median/firstView"))
        .filter(|v| v.is_object())?;

    let lcp_ms = largest_contentful_paint(view).or_else(|| {
        data.pointer("/lighthouse/audits/largest-contentful-paint/numericValue")
            .and_then(millis)
    });
    let requests = match view.get("requests") {
        Some(Value::Array(items)) => items.len() as u64,
        Some(other) => millis(other).unwrap_or(0),
        None => 0,
    };

    Some(Metrics {
        ttfb_ms: number(view, "TTFB"),
        fcp_ms: number(view, "firstContentfulPaint"),
        speed_index_ms: number(view, "SpeedIndex"),
        lcp_ms,
        requests,
        transferred_bytes: number(view, "bytesIn"),
        on_load_ms: number(view, "loadTime"),
        fully_loaded_ms: number(view, "fullyLoaded"),
    })
}

/// `chromeUserTiming` is an object in some payloads and a list of
/// `{name, time}` pairs in others.
fn largest_contentful_paint(view: &Value) -> Option<u64> {
    match view.get("chromeUserTiming")? {
        Value::Object(map) => map.get("LargestContentfulPaint").and_then(millis),
        Value::Array(items) => items
            .iter()
            .filter(|item| item.get("name").and_then(Value::as_str) == Some("LargestContentfulPaint"))
            .filter_map(|item| item.get("time").and_then(millis))
            .last(),
        _ => None,
    }
}

fn number(view: &Value, key: &str) -> u64 {
    view.get(key).and_then(millis).unwrap_or(0)
}

fn millis(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|v| v.is_finite())
            .map(|v| v.max(0.0).round() as u64)
    })
}

fn text(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
