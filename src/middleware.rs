use std::any::Any;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tower_http::catch_panic::CatchPanicLayer;
use tracing::error;

type PanicHandler = fn(Box<dyn Any + Send + 'static>) -> Response;

/// Catches a panic raised while serving a request so the server keeps
/// running. The request gets an empty 500.
pub fn recovery() -> CatchPanicLayer<PanicHandler> {
    CatchPanicLayer::custom(recover as PanicHandler)
}

fn recover(err: Box<dyn Any + Send + 'static>) -> Response {
    let panic = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    };
    error!(panic = %panic, "Recover!:");

    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}
