use std::sync::Arc;
use warp::reply::Response;
use warp::{Filter, Rejection};

use super::api::{query_params, with_state};
use super::params::{decode_segment, Params};
use super::reply;
use crate::error::StoreError;
use crate::state::AppState;

/// Usage statistics under `/stats`. A failing store query answers 500.
pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let naughty = warp::path!("stats" / "naughty_list")
        .and(warp::get())
        .and(query_params())
        .and(with_state(state.clone()))
        .and_then(naughty_list);

    let todays = warp::path!("stats" / "todays_trends")
        .and(warp::get())
        .and(query_params())
        .and(with_state(state.clone()))
        .and_then(todays_trends);

    let trend = warp::path!("stats" / "trend" / u64)
        .and(warp::get())
        .and(query_params())
        .and(with_state(state.clone()))
        .and_then(trend);

    let named = warp::path!("stats" / "trend" / u64 / String)
        .and(warp::get())
        .and(query_params())
        .and(with_state(state))
        .and_then(trend_for);

    naughty
        .or(todays)
        .unify()
        .or(trend)
        .unify()
        .or(named)
        .unify()
}

fn respond<T: serde::Serialize>(
    result: Result<T, StoreError>,
    params: &Params,
    state: &AppState,
    what: &str,
) -> Response {
    match result {
        Ok(body) => reply::ok(&body, params.callback().as_deref()),
        Err(e) => {
            tracing::warn!("Stats query '{}' failed: {}", what, e);
            state.metrics.record_store_error();
            reply::internal_error()
        }
    }
}

async fn naughty_list(params: Params, state: Arc<AppState>) -> Result<Response, Rejection> {
    state.metrics.record_request("stats");
    let result = state.registry.naughty_list().await;
    Ok(respond(result, &params, &state, "naughty_list"))
}

async fn todays_trends(params: Params, state: Arc<AppState>) -> Result<Response, Rejection> {
    state.metrics.record_request("stats");
    let result = state.registry.todays_trends().await;
    Ok(respond(result, &params, &state, "todays_trends"))
}

async fn trend(days: u64, params: Params, state: Arc<AppState>) -> Result<Response, Rejection> {
    state.metrics.record_request("stats");
    let result = state.registry.trend(days).await;
    Ok(respond(result, &params, &state, "trend"))
}

async fn trend_for(
    days: u64,
    names: String,
    params: Params,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    state.metrics.record_request("stats");
    let names = decode_segment(names);
    let names: Vec<&str> = names.split(',').filter(|n| !n.is_empty()).collect();
    let result = state.registry.trend_for(days, &names).await;
    Ok(respond(result, &params, &state, "trend"))
}
