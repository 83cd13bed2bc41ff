use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::Method;
use hyper::{Body, Request, Response};

use crate::auth::AuthTier;
use crate::error::HttpError;
use crate::state::AppState;

pub type PathParams = HashMap<String, String>;

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Response<Body>, HttpError>> + Send>>;

pub type Handler = Arc<dyn Fn(Arc<AppState>, Request<Body>, PathParams) -> HandlerFuture + Send + Sync>;

struct Route {
    method: Method,
    segments: Vec<Segment>,
    auth: AuthTier,
    handler: Handler,
}

enum Segment {
    Literal(String),
    Param(String),
}

/// Dispatches by `(method, path)` against a table built once at startup,
/// generalizing `service_grpc_*`'s per-module registration pattern to HTTP.
/// Paths may contain `:name` segments, bound into [`PathParams`] for the
/// handler.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route<F, Fut>(&mut self, method: Method, path: &str, auth: AuthTier, handler: F) -> &mut Self
    where
        F: Fn(Arc<AppState>, Request<Body>, PathParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<Body>, HttpError>> + Send + 'static,
    {
        let segments = path
            .trim_matches('/')
            .split('/')
            .map(|s| match s.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(s.to_string()),
            })
            .collect();
        self.routes.push(Route {
            method,
            segments,
            auth,
            handler: Arc::new(move |state, req, params| Box::pin(handler(state, req, params))),
        });
        self
    }

    /// Finds the best match for `method`/`path`: an exact method+path match
    /// if one exists, else `Err(MethodNotAllowed)` if some other method
    /// matches the path, else `Err(NotFound)`.
    pub fn resolve(&self, method: &Method, path: &str) -> Result<(Handler, AuthTier, PathParams), HttpError> {
        let requested: Vec<&str> = path.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect();
        let mut path_matched = false;

        for route in &self.routes {
            let Some(params) = match_segments(&route.segments, &requested) else { continue };
            if &route.method == method {
                return Ok((Arc::clone(&route.handler), route.auth, params));
            }
            path_matched = true;
        }

        if path_matched {
            Err(HttpError::MethodNotAllowed { method: method.clone() })
        } else {
            Err(HttpError::NotFound)
        }
    }
}

fn match_segments(segments: &[Segment], requested: &[&str]) -> Option<PathParams> {
    if segments.len() != requested.len() {
        return None;
    }
    let mut params = PathParams::new();
    for (segment, actual) in segments.iter().zip(requested.iter()) {
        match segment {
            Segment::Literal(expected) => {
                if expected != actual {
                    return None;
                }
            }
            Segment::Param(name) => {
                params.insert(name.clone(), actual.to_string());
            }
        }
    }
    Some(params)
}
