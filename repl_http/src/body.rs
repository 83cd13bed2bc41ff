use hyper::body::to_bytes;
use hyper::{Body, Request};
use serde::de::DeserializeOwned;

use crate::error::HttpError;

/// Reads and JSON-decodes a request body. Empty bodies decode as if `{}`
/// had been sent, matching how the representative routes accept an absent
/// body for parameterless calls.
pub async fn read_json<T: DeserializeOwned + Default>(req: Request<Body>) -> Result<T, HttpError> {
    let bytes = to_bytes(req.into_body()).await.map_err(|err| HttpError::BadRequest { message: err.to_string() })?;
    if bytes.is_empty() {
        return Ok(T::default());
    }
    serde_json::from_slice(&bytes).map_err(|err| HttpError::BadRequest { message: err.to_string() })
}

pub fn query_param<'a>(query: Option<&'a str>, name: &str) -> Option<std::borrow::Cow<'a, str>> {
    let query = query?;
    serde_urlencoded::from_str::<Vec<(String, String)>>(query)
        .ok()?
        .into_iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| std::borrow::Cow::Owned(v))
}
