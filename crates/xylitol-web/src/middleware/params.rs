//! Request parameter capture for the `[Receive]` line

use axum::body::{Body, Bytes, HttpBody};
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::{header, HeaderMap, Method};
use futures::{future, stream, StreamExt};
use http_body_util::BodyExt;
use std::collections::BTreeMap;

/// Largest body that is buffered for capture (32MB).
pub const MAX_CAPTURE_BYTES: u64 = 32 << 20;

/// Capture the request's parameters as text and hand back an equivalent
/// request for the downstream handler.
///
/// - non-POST: the raw query string
/// - POST form bodies (urlencoded or multipart): `{"key":["value",..]}`
/// - any other POST body: the body as UTF-8 text
///
/// Bodies are read whether or not they declare a size. Once more than
/// [`MAX_CAPTURE_BYTES`] have arrived, reading stops: the handler receives
/// the buffered prefix followed by the unread remainder, and capture is
/// empty. Parse failures also capture as empty.
pub async fn capture_params(request: Request) -> (Request, String) {
    if request.method() != Method::POST {
        let query = request.uri().query().unwrap_or_default().to_string();
        return (request, query);
    }

    // Declared too large: pass through without reading anything.
    if request.body().size_hint().lower() > MAX_CAPTURE_BYTES {
        return (request, String::new());
    }

    let (parts, body) = request.into_parts();
    let bytes = match buffer_body(body).await {
        Buffered::Complete(bytes) => bytes,
        Buffered::Overflow(body) | Buffered::Failed(body) => {
            return (Request::from_parts(parts, body), String::new())
        }
    };

    let captured = match media_type(&parts.headers).as_str() {
        "application/x-www-form-urlencoded" => {
            encode_form(url::form_urlencoded::parse(&bytes).into_owned())
        }
        "multipart/form-data" | "application/form-data" => {
            multipart_fields(&parts.headers, bytes.clone())
                .await
                .unwrap_or_default()
        }
        _ => String::from_utf8_lossy(&bytes).into_owned(),
    };

    (Request::from_parts(parts, Body::from(bytes)), captured)
}

enum Buffered {
    /// The whole body, at most [`MAX_CAPTURE_BYTES`]
    Complete(Bytes),
    /// The buffered prefix chained with the unread rest of the stream
    Overflow(Body),
    /// Whatever arrived before the body errored
    Failed(Body),
}

async fn buffer_body(mut body: Body) -> Buffered {
    let mut buffered = Vec::new();
    loop {
        match body.frame().await {
            None => return Buffered::Complete(Bytes::from(buffered)),
            Some(Err(_)) => return Buffered::Failed(Body::from(buffered)),
            Some(Ok(frame)) => {
                // Trailers carry no parameters.
                let Ok(data) = frame.into_data() else {
                    continue;
                };
                buffered.extend_from_slice(&data);
                if buffered.len() as u64 > MAX_CAPTURE_BYTES {
                    let prefix = stream::once(future::ready(Ok::<_, axum::Error>(
                        Bytes::from(buffered),
                    )));
                    let rest = prefix.chain(body.into_data_stream());
                    return Buffered::Overflow(Body::from_stream(rest));
                }
            }
        }
    }
}

/// Content type without parameters, lower-cased.
fn media_type(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

/// Serialize form pairs as a JSON object of value lists with sorted keys.
fn encode_form(pairs: impl IntoIterator<Item = (String, String)>) -> String {
    let mut values: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in pairs {
        values.entry(key).or_default().push(value);
    }
    serde_json::to_string(&values).unwrap_or_default()
}

/// Text fields of a buffered multipart body. File parts are skipped.
async fn multipart_fields(headers: &HeaderMap, bytes: Bytes) -> Option<String> {
    let content_type = headers.get(header::CONTENT_TYPE)?.clone();
    let request = Request::builder()
        .method(Method::POST)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(bytes))
        .ok()?;
    let mut multipart = Multipart::from_request(request, &()).await.ok()?;

    let mut pairs = Vec::new();
    while let Some(field) = multipart.next_field().await.ok()? {
        if field.file_name().is_some() {
            continue;
        }
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        pairs.push((name, field.text().await.ok()?));
    }
    Some(encode_form(pairs))
}
