use once_cell::sync::Lazy;
use prometheus::{register_int_counter, Encoder, IntCounter, TextEncoder};

// Prometheus metrics (default registry)
pub static REFRESH_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "portal_session_refresh_total",
        "Token refresh attempts"
    )
    .expect("register refresh_total")
});

pub static REFRESH_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "portal_session_refresh_failures_total",
        "Token refreshes that ended the session"
    )
    .expect("register refresh_failures_total")
});

pub static RETRIES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "portal_session_retries_total",
        "Requests retried after a 401"
    )
    .expect("register retries_total")
});

pub static BACKEND_UNAVAILABLE_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "portal_backend_unavailable_total",
        "Requests that got no HTTP response"
    )
    .expect("register backend_unavailable_total")
});

pub static SESSIONS_CLEARED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "portal_sessions_cleared_total",
        "Times the stored session was removed"
    )
    .expect("register sessions_cleared_total")
});

pub static SEARCH_CACHE_HITS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "portal_search_cache_hits_total",
        "Autocomplete lookups served from cache"
    )
    .expect("register search_cache_hits_total")
});

pub static SEARCH_CACHE_MISSES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "portal_search_cache_misses_total",
        "Autocomplete lookups sent to the backend"
    )
    .expect("register search_cache_misses_total")
});

/// Render the default registry in the Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# metrics encode error: {e}");
    }
    String::from_utf8(buffer).unwrap_or_default()
}
