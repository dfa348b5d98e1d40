use std::fmt::Write as _;
use std::time::SystemTime;

use audit_core::{AuditViewModel, Impact, Metrics, RecentTest};
use chrono::{DateTime, Local};

pub(crate) fn format_ms(ms: u64) -> String {
    if ms < 1000 {
        format!("{ms} ms")
    } else {
        format!("{:.2} s", ms as f64 / 1000.0)
    }
}

pub(crate) fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.2} MB", b / KB / KB)
    }
}

fn elapsed(started_at: Option<SystemTime>) -> Option<String> {
    let secs = started_at?.elapsed().ok()?.as_secs();
    Some(format!("{:02}:{:02}", secs / 60, secs % 60))
}

/// One line per narration change while the job runs.
pub(crate) fn progress_line(view: &AuditViewModel) -> String {
    let phase = view.phase.map(|p| p.as_str()).unwrap_or("pending");
    match elapsed(view.started_at) {
        Some(clock) => format!("[{clock}] {phase:<8} {}", view.status_text),
        None => format!("{phase:<8} {}", view.status_text),
    }
}

fn metric_rows(metrics: &Metrics) -> Vec<(&'static str, String)> {
    vec![
        ("Time to first byte", format_ms(metrics.ttfb_ms)),
        ("First contentful paint", format_ms(metrics.fcp_ms)),
        (
            "Largest contentful paint",
            metrics.lcp_ms.map(format_ms).unwrap_or_else(|| "n/a".into()),
        ),
        ("Speed index", format_ms(metrics.speed_index_ms)),
        ("Requests", metrics.requests.to_string()),
        ("Transferred", format_bytes(metrics.transferred_bytes)),
        ("Load event", format_ms(metrics.on_load_ms)),
        ("Fully loaded", format_ms(metrics.fully_loaded_ms)),
    ]
}

fn impact_label(impact: Option<Impact>) -> &'static str {
    match impact {
        Some(Impact::Critical) => "critical",
        Some(Impact::Serious) => "serious",
        Some(Impact::Moderate) => "moderate",
        Some(Impact::Minor) => "minor",
        None => "unknown",
    }
}

/// Final report for a settled job.
pub(crate) fn report(view: &AuditViewModel) -> String {
    let mut out = String::new();
    let job = view.job_id.as_deref().unwrap_or("-");

    if let Some(error) = &view.error {
        let _ = writeln!(out, "Test {job} failed: {error}");
        if let Some(url) = &view.retry_url {
            let _ = writeln!(out, "Retry with: audit_app run {url}");
        }
        return out;
    }

    let Some(data) = &view.data else {
        let _ = writeln!(out, "Test {job}: {}", view.status_text);
        return out;
    };

    let title = data.site.site_title.as_deref().unwrap_or("Untitled page");
    let _ = writeln!(out, "{title}");
    if let Some(url) = &data.site.site_url {
        let _ = writeln!(out, "{url}");
    }
    let mut meta = vec![format!("test {job}")];
    if let Some(run_at) = &data.site.run_at {
        meta.push(format!("run at {run_at}"));
    }
    if view.is_historical {
        meta.push("previous run".to_string());
    } else if let Some(started) = view.started_at {
        let started: DateTime<Local> = started.into();
        meta.push(format!("started {}", started.format("%H:%M:%S")));
    }
    let _ = writeln!(out, "{}", meta.join(" · "));
    if let Some(summary) = &data.site.summary_url {
        let _ = writeln!(out, "Full results: {summary}");
    }

    let _ = writeln!(out, "\nMetrics");
    for (label, value) in metric_rows(&data.metrics) {
        let _ = writeln!(out, "  {label:<26}{value}");
    }

    let _ = writeln!(out, "\nRecommendations");
    for line in &view.recommendations {
        let _ = writeln!(out, "  - {line}");
    }

    let _ = writeln!(out, "\nAccessibility");
    match (&view.a11y.value, &view.a11y.error) {
        (Some(report), _) => {
            let s = report.summary;
            let _ = writeln!(
                out,
                "  {} violations, {} passes, {} incomplete, {} inapplicable",
                s.violations, s.passes, s.incomplete, s.inapplicable
            );
            for violation in &report.violations {
                let _ = writeln!(
                    out,
                    "  [{}] {} ({} nodes)",
                    impact_label(violation.impact),
                    violation.help,
                    violation.nodes.len()
                );
            }
        }
        (None, Some(error)) => {
            let _ = writeln!(out, "  unavailable: {error}");
        }
        (None, None) => {
            let _ = writeln!(out, "  not run");
        }
    }

    match (&view.ai.value, &view.ai.error) {
        (Some(suggestions), _) => {
            let _ = writeln!(out, "\nAI suggestions");
            for suggestion in suggestions {
                let _ = writeln!(out, "  - {suggestion}");
            }
        }
        (None, Some(error)) => {
            let _ = writeln!(out, "\nAI suggestions unavailable: {error}");
        }
        (None, None) => {}
    }
    out
}

pub(crate) fn recent_line(entry: &RecentTest) -> String {
    let label = entry
        .title
        .as_deref()
        .or(entry.url.as_deref())
        .unwrap_or("(unknown page)");
    match &entry.run_at {
        Some(run_at) => format!("{:<28}{label}  {run_at}", entry.test_id),
        None => format!("{:<28}{label}", entry.test_id),
    }
}
