use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Where a plain-HTTP request should go instead, when the edge says it
/// arrived over HTTP
fn https_location(headers: &HeaderMap, path_and_query: &str) -> Option<String> {
    let proto = headers.get("x-forwarded-proto")?.to_str().ok()?;
    if !proto.eq_ignore_ascii_case("http") {
        return None;
    }

    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get(header::HOST))?
        .to_str()
        .ok()?;

    Some(format!("https://{}{}", host, path_and_query))
}

/// Permanent redirect to HTTPS, installed outside development
pub async fn redirect_to_https(request: Request, next: Next) -> Response {
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    match https_location(request.headers(), path_and_query) {
        Some(location) => {
            (StatusCode::PERMANENT_REDIRECT, [(header::LOCATION, location)]).into_response()
        }
        None => next.run(request).await,
    }
}
