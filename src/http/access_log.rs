//! Request access logging.
//!
//! One structured event per request with the method, URI, decoded query
//! parameters, status and latency.

use std::time::Instant;

use axum::{body::Body, http::Request, middleware::Next, response::Response};

pub async fn access_log(request: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let params = query_params(uri.query());

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        params = ?params,
        status = response.status().as_u16(),
        latency_ms = started.elapsed().as_millis() as u64,
        "Access"
    );
    response
}

fn query_params(query: Option<&str>) -> Vec<(String, String)> {
    query
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_params_decoded() {
        assert_eq!(
            query_params(Some("path=%2Fa%2Fb&method=GET")),
            vec![
                ("path".to_string(), "/a/b".to_string()),
                ("method".to_string(), "GET".to_string()),
            ]
        );
        assert!(query_params(None).is_empty());
    }
}
