use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use warp::http::{header, StatusCode};
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::error::RegistryError;
use crate::state::AppState;

pub mod api;
pub mod params;
pub mod reply;
pub mod stats;


/// Body served by the retired version 2 endpoints.
pub const DEPRECATION_NOTICE: [&str; 6] =
    ["API", "Deprecated", "Please", "update", "your", "software"];

/// Serves the registry on connections accepted from a shared listener until
/// `shutdown` resolves.
pub async fn serve<S>(state: Arc<AppState>, listener: Arc<TcpListener>, shutdown: S)
where
    S: Future<Output = ()> + Send + 'static,
{
    let incoming = Box::pin(futures::stream::unfold(listener, |listener| async move {
        let accepted = listener.accept().await.map(|(stream, _)| stream);
        Some((accepted, listener))
    }));

    warp::serve(create_routes(state))
        .serve_incoming_with_graceful_shutdown(incoming, shutdown)
        .await;
}

pub fn create_routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let cors_origin = state.config.api.cors_allow_origin.clone();

    let redirect = warp::path::end()
        .and(warp::get())
        .map(|| {
            warp::reply::with_header(StatusCode::FOUND, header::LOCATION, "/3").into_response()
        });

    let health = warp::path!("health")
        .and(warp::get())
        .map(|| {
            reply::ok(
                &serde_json::json!({
                    "status": "healthy",
                    "service": "plugin-registry"
                }),
                None,
            )
        });

    let metrics = warp::path!("metrics")
        .and(warp::get())
        .and(api::with_state(state.clone()))
        .map(|state: Arc<AppState>| {
            warp::reply::with_header(
                state.metrics.render(),
                header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )
            .into_response()
        });

    api::routes(state.clone())
        .or(stats::routes(state))
        .unify()
        .or(deprecated_routes())
        .unify()
        .or(redirect)
        .unify()
        .or(health)
        .unify()
        .or(metrics)
        .unify()
        .recover(handle_rejection)
        .with(warp::reply::with::header(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            cors_origin,
        ))
}

fn deprecated_routes() -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let v2 = warp::path!("2" / "bukkit" / "plugins")
        .or(warp::path!("2" / "authors"))
        .unify()
        .or(warp::path!("2" / "categories"))
        .unify();
    let api2 = warp::path!("api2" / "bukkit" / "plugins")
        .or(warp::path!("api2" / "authors"))
        .unify()
        .or(warp::path!("api2" / "categories"))
        .unify();

    v2.or(api2)
        .unify()
        .and(warp::get())
        .and(api::query_params())
        .map(|query: params::Params| reply::ok(&DEPRECATION_NOTICE, query.callback().as_deref()))
}

async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    if err.is_not_found() {
        return Ok(reply::not_found(None));
    }

    if let Some(e) = err.find::<RegistryError>() {
        return Ok(reply::bad_request(&e.to_string(), None));
    }

    if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        return Ok(reply::respond(
            &serde_json::json!({ "error": "Method not allowed" }),
            None,
            StatusCode::METHOD_NOT_ALLOWED,
        ));
    }

    tracing::debug!("Unhandled rejection: {:?}", err);
    Ok(reply::respond(
        &serde_json::json!({ "error": "Bad request" }),
        None,
        StatusCode::BAD_REQUEST,
    ))
}
