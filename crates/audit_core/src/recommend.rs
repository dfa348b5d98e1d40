use crate::Metrics;

const TWO_MIB: u64 = 2 * 1024 * 1024;

/// Rule-based suggestions derived from the metrics alone.
pub fn recommendations(metrics: &Metrics) -> Vec<&'static str> {
    let mut recs = Vec::new();

    if metrics.ttfb_ms > 800 {
        recs.push("Reduce server TTFB: enable caching (CDN, edge cache), optimize server rendering, and review origin latency.");
    }
    if metrics.fcp_ms > 1800 {
        recs.push("Improve FCP: inline critical CSS, defer non-critical JS, preload key assets (fonts, hero image).");
    }
    if metrics.lcp_ms.unwrap_or(0) > 2500 {
        recs.push("Improve LCP: optimize hero media (compress/resize), set `fetchpriority=\"high\"` on the LCP image, and preconnect to critical origins.");
    }
    if metrics.speed_index_ms > 3400 {
        recs.push("Lower Speed Index: reduce render-blocking resources, split bundles, and prioritize above-the-fold content.");
    }
    if metrics.requests > 75 {
        recs.push("Reduce request count: combine assets where sensible, defer 3rd-parties, and lazy-load below-the-fold scripts.");
    }
    if metrics.transferred_bytes > TWO_MIB {
        recs.push("Cut page weight: compress images (AVIF/WebP), enable brotli/gzip, and trim unused CSS/JS.");
    }

    if recs.is_empty() {
        recs.push("Looks good! Consider adding Core Web Vitals monitoring for ongoing assurance.");
    }
    recs
}
