use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};

/// Records request count and latency for every route.
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path])
        .observe(duration);

    response
}

/// Collapses dynamic path segments (UUIDs, numeric ids, date keys) into
/// placeholders so the `path` label cardinality stays bounded.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if is_uuid_like(segment) || is_numeric_id(segment) {
                "{id}"
            } else if is_date_key(segment) {
                "{date}"
            } else {
                segment
            }
        })
        .collect::<Vec<&str>>()
        .join("/")
}

fn is_uuid_like(s: &str) -> bool {
    s.len() == 36 && s.chars().all(|c| c.is_ascii_hexdigit() || c == '-')
}

fn is_numeric_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn is_date_key(s: &str) -> bool {
    s.len() == 10 && crate::utils::time::is_valid_date_key(s)
}

#[cfg(test)]
mod tests {
    use super::normalize_path;

    #[test]
    fn uuid_segments_collapse() {
        assert_eq!(
            normalize_path("/api/v1/page-sessions/0191d2a0-9df1-7c10-a2b4-112233445566/activity"),
            "/api/v1/page-sessions/{id}/activity"
        );
    }

    #[test]
    fn date_segments_collapse() {
        assert_eq!(
            normalize_path("/api/v1/time-logs/2026-03-07"),
            "/api/v1/time-logs/{date}"
        );
    }

    #[test]
    fn static_paths_pass_through() {
        assert_eq!(normalize_path("/health"), "/health");
    }
}
