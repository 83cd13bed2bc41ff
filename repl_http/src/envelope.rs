use http::StatusCode;
use hyper::{Body, Response};
use serde::Serialize;
use serde_json::Value;

use crate::error::HttpError;

/// The one JSON shape every route returns: `{success, error, error_ext,
/// warning, ...}`, with route-specific fields flattened alongside.
/// `success` is `0`/`1`, matching the source wire format, rather than a
/// bool, so existing clients that switch on the integer keep working.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    success: u8,
    error: String,
    error_ext: Value,
    warning: String,
    #[serde(flatten)]
    body: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(body: T) -> Self {
        Self {
            success: 1,
            error: String::new(),
            error_ext: Value::Object(Default::default()),
            warning: String::new(),
            body: Some(body),
        }
    }
}

impl Envelope<()> {
    pub fn error(message: impl Into<String>, error_ext: Value) -> Self {
        Self {
            success: 0,
            error: message.into(),
            error_ext,
            warning: String::new(),
            body: None,
        }
    }
}

/// Serializes `body` as a `200 OK` envelope response.
pub fn ok_response<T: Serialize>(body: T) -> Response<Body> {
    json_response(StatusCode::OK, &Envelope::ok(body))
}

/// A `200 OK` envelope with no route-specific fields, for routes whose
/// only outcome worth reporting is `success`.
pub fn ok_empty_response() -> Response<Body> {
    ok_response(serde_json::Map::<String, Value>::new())
}

/// Maps an [`HttpError`] to its status code and error envelope.
pub fn error_response(err: &HttpError) -> Response<Body> {
    json_response(err.status(), &err.to_envelope())
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    let payload = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload))
        .expect("static response parts are always valid")
}
