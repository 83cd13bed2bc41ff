use std::sync::Arc;

use hyper::{Body, Request, Response};
use serde::Serialize;

use crate::envelope::ok_response;
use crate::error::HttpError;
use crate::router::PathParams;
use crate::state::AppState;

#[derive(Serialize)]
struct HealthBody {
    controller_id: u64,
    host: String,
    pid: u32,
}

pub async fn health(state: Arc<AppState>, _req: Request<Body>, _params: PathParams) -> Result<Response<Body>, HttpError> {
    let identity = &state.controller.identity;
    Ok(ok_response(HealthBody { controller_id: identity.id.get(), host: identity.host.clone(), pid: identity.pid }))
}
