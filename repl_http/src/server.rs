use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server};
use observability_deps::tracing::{error, info};

use crate::envelope::error_response;
use crate::router::Router;
use crate::state::AppState;

/// Binds and serves the route table until `shutdown` resolves.
pub async fn serve(addr: SocketAddr, state: Arc<AppState>, router: Arc<Router>, shutdown: impl std::future::Future<Output = ()>) -> hyper::Result<()> {
    let make_svc = make_service_fn(move |_conn| {
        let state = Arc::clone(&state);
        let router = Arc::clone(&router);
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let state = Arc::clone(&state);
                let router = Arc::clone(&router);
                async move { Ok::<_, Infallible>(dispatch(state, router, req).await) }
            }))
        }
    });

    info!(%addr, "repl_http listening");
    Server::bind(&addr).serve(make_svc).with_graceful_shutdown(shutdown).await
}

async fn dispatch(state: Arc<AppState>, router: Arc<Router>, req: Request<Body>) -> Response<Body> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let (handler, auth, params) = match router.resolve(&method, &path) {
        Ok(resolved) => resolved,
        Err(err) => return error_response(&err),
    };

    let presented = req
        .headers()
        .get("x-auth-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    if let Err(err) = state.auth.check(auth, presented.as_deref()) {
        return error_response(&err);
    }

    match handler(Arc::clone(&state), req, params).await {
        Ok(resp) => resp,
        Err(err) => {
            error!(%method, %path, %err, "request failed");
            error_response(&err)
        }
    }
}
