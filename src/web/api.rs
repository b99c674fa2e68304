use std::collections::HashMap;
use std::sync::Arc;
use warp::reply::Response;
use warp::{Filter, Rejection};

use super::params::{decode_segment, Params};
use super::reply;
use crate::state::AppState;

/// Largest urlencoded body accepted on the POST routes.
const FORM_LIMIT: u64 = 64 * 1024;

/// The version 3 API under `/3`.
pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    index_route(state.clone())
        .or(geninfo_routes(state.clone()))
        .unify()
        .or(plugin_routes(state.clone()))
        .unify()
        .or(author_routes(state.clone()))
        .unify()
        .or(category_routes(state.clone()))
        .unify()
        .or(update_route(state.clone()))
        .unify()
        .or(search_route(state))
        .unify()
}

pub(crate) fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || state.clone())
}

pub(crate) fn query_params(
) -> impl Filter<Extract = (Params,), Error = Rejection> + Clone {
    warp::query::<HashMap<String, String>>().map(Params::new)
}

/// Query string plus an optional urlencoded body.
fn form_params() -> impl Filter<Extract = (Params,), Error = Rejection> + Clone {
    let form = warp::body::content_length_limit(FORM_LIMIT)
        .and(warp::body::form::<HashMap<String, String>>())
        .or(warp::any().map(HashMap::new))
        .unify();

    warp::query::<HashMap<String, String>>()
        .and(form)
        .map(Params::merged)
}

fn get_or_post() -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::get().or(warp::post()).unify()
}

fn index_route(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("3")
        .and(warp::get())
        .and(query_params())
        .and(with_state(state))
        .and_then(index)
}

fn geninfo_routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let list = warp::path!("3" / "geninfo")
        .and(warp::get())
        .and(query_params())
        .and(with_state(state.clone()))
        .and_then(list_geninfo);

    let get = warp::path!("3" / "geninfo" / String)
        .and(warp::get())
        .and(query_params())
        .and(with_state(state))
        .and_then(get_geninfo);

    list.or(get).unify()
}

fn plugin_routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let all = warp::path!("3" / "plugins").map(|| None::<String>);
    let by_server = warp::path!("3" / "plugins" / String).map(|server: String| Some(server));
    let list = all
        .or(by_server)
        .unify()
        .and(warp::get())
        .and(query_params())
        .and(with_state(state.clone()))
        .and_then(list_plugins);

    let latest = warp::path!("3" / "plugins" / String / String)
        .map(|server: String, slug: String| (server, slug, None::<String>));
    let versioned = warp::path!("3" / "plugins" / String / String / String)
        .map(|server: String, slug: String, version: String| (server, slug, Some(version)));
    let details = latest
        .or(versioned)
        .unify()
        .untuple_one()
        .and(warp::get())
        .and(query_params())
        .and(with_state(state))
        .and_then(plugin_details);

    list.or(details).unify()
}

fn author_routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let list = warp::path!("3" / "authors")
        .and(warp::get())
        .and(query_params())
        .and(with_state(state.clone()))
        .and_then(list_authors);

    let plugins = warp::path!("3" / "authors" / String)
        .map(|name: String| (None::<String>, name))
        .or(warp::path!("3" / "authors" / String / String)
            .map(|server: String, name: String| (Some(server), name)))
        .unify()
        .untuple_one()
        .and(warp::get())
        .and(query_params())
        .and(with_state(state))
        .and_then(author_plugins);

    list.or(plugins).unify()
}

fn category_routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let list = warp::path!("3" / "categories")
        .and(warp::get())
        .and(query_params())
        .and(with_state(state.clone()))
        .and_then(list_categories);

    let plugins = warp::path!("3" / "categories" / String)
        .map(|name: String| (None::<String>, name))
        .or(warp::path!("3" / "categories" / String / String)
            .map(|server: String, name: String| (Some(server), name)))
        .unify()
        .untuple_one()
        .and(warp::get())
        .and(query_params())
        .and(with_state(state))
        .and_then(category_plugins);

    list.or(plugins).unify()
}

fn update_route(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("3" / "updates")
        .and(get_or_post())
        .and(form_params())
        .and(with_state(state))
        .and_then(updates)
}

fn search_route(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("3" / "search")
        .and(get_or_post())
        .and(form_params())
        .and(with_state(state))
        .and_then(search)
}

async fn index(params: Params, state: Arc<AppState>) -> Result<Response, Rejection> {
    state.metrics.record_request("index");
    let geninfo = state.registry.list_geninfo(Some(1)).await;

    Ok(reply::ok(
        &serde_json::json!({
            "version": 3,
            "service": "plugin-registry",
            "geninfo": geninfo,
        }),
        params.callback().as_deref(),
    ))
}

async fn list_geninfo(params: Params, state: Arc<AppState>) -> Result<Response, Rejection> {
    state.metrics.record_request("geninfo");
    let generations = state.registry.list_geninfo(params.number("size")).await;
    Ok(reply::ok(&generations, params.callback().as_deref()))
}

async fn get_geninfo(
    id: String,
    params: Params,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    state.metrics.record_request("geninfo");
    let callback = params.callback();
    Ok(match state.registry.get_geninfo(&decode_segment(id)).await {
        Some(generation) => reply::ok(&generation, callback.as_deref()),
        None => reply::not_found(callback.as_deref()),
    })
}

async fn list_plugins(
    server: Option<String>,
    params: Params,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    state.metrics.record_request("plugins");
    let server = server.map(decode_segment);
    let request = params.query_request(&state.config.api.default_sort);
    let plugins = state
        .registry
        .list_plugins(server.as_deref(), &request)
        .await;
    Ok(reply::ok(&plugins, params.callback().as_deref()))
}

async fn plugin_details(
    server: String,
    slug: String,
    version: Option<String>,
    params: Params,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    state.metrics.record_request("plugin_details");
    let callback = params.callback();
    let (server, slug) = (decode_segment(server), decode_segment(slug));
    let version = version.map(decode_segment);
    let plugin = state
        .registry
        .plugin_details(&server, &slug, version.as_deref(), &params.fields())
        .await;

    Ok(match plugin {
        Some(plugin) => reply::ok(&plugin, callback.as_deref()),
        None => {
            tracing::debug!("No plugin '{}' on server '{}'", slug, server);
            reply::not_found(callback.as_deref())
        }
    })
}

async fn list_authors(params: Params, state: Arc<AppState>) -> Result<Response, Rejection> {
    state.metrics.record_request("authors");
    let authors = state.registry.list_authors().await;
    Ok(reply::ok(&authors, params.callback().as_deref()))
}

async fn author_plugins(
    server: Option<String>,
    name: String,
    params: Params,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    state.metrics.record_request("author_plugins");
    let (server, name) = (server.map(decode_segment), decode_segment(name));
    let request = params.query_request(&state.config.api.default_sort);
    let plugins = state
        .registry
        .list_author_plugins(server.as_deref(), &name, &request)
        .await;
    Ok(reply::ok(&plugins, params.callback().as_deref()))
}

async fn list_categories(params: Params, state: Arc<AppState>) -> Result<Response, Rejection> {
    state.metrics.record_request("categories");
    let categories = state.registry.list_categories().await;
    Ok(reply::ok(&categories, params.callback().as_deref()))
}

async fn category_plugins(
    server: Option<String>,
    name: String,
    params: Params,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    state.metrics.record_request("category_plugins");
    let (server, name) = (server.map(decode_segment), decode_segment(name));
    let request = params.query_request(&state.config.api.default_sort);
    let plugins = state
        .registry
        .list_category_plugins(server.as_deref(), &name, &request)
        .await;
    Ok(reply::ok(&plugins, params.callback().as_deref()))
}

async fn updates(params: Params, state: Arc<AppState>) -> Result<Response, Rejection> {
    state.metrics.record_request("updates");
    let found = state
        .registry
        .plugins_up_to_date(&params.slugs(), params.update_server())
        .await;
    Ok(reply::ok(&found, params.callback().as_deref()))
}

async fn search(params: Params, state: Arc<AppState>) -> Result<Response, Rejection> {
    state.metrics.record_request("search");
    let callback = params.callback();

    let filters = match params.filters() {
        Ok(filters) => filters,
        Err(e) => {
            tracing::debug!("Rejecting search: {}", e);
            return Ok(reply::bad_request(&e.to_string(), callback.as_deref()));
        }
    };

    let request = params.query_request(&state.config.api.default_sort);
    let plugins = state.registry.search(&filters, &request).await;
    Ok(reply::ok(&plugins, callback.as_deref()))
}
