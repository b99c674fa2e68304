use serde::Serialize;
use warp::http::{header, StatusCode};
use warp::reply::Response;
use warp::Reply;

/// Query parameters naming a JSONP callback, in lookup order.
const CALLBACK_PARAMS: [&str; 2] = ["callback", "jsonp"];

/// Serializes `body` as JSON, or as `callback(<json>);` with an
/// `application/javascript` content type when a callback was requested.
pub fn respond<T: Serialize>(body: &T, callback: Option<&str>, status: StatusCode) -> Response {
    let json = match serde_json::to_string(body) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Failed to serialize response: {}", e);
            return warp::reply::with_status(String::new(), StatusCode::INTERNAL_SERVER_ERROR)
                .into_response();
        }
    };

    let (payload, content_type) = match callback {
        Some(callback) => (format!("{}({});", callback, json), "application/javascript"),
        None => (json, "application/json"),
    };

    let reply = warp::reply::with_header(payload, header::CONTENT_TYPE, content_type);
    warp::reply::with_status(reply, status).into_response()
}

pub fn ok<T: Serialize>(body: &T, callback: Option<&str>) -> Response {
    respond(body, callback, StatusCode::OK)
}

pub fn not_found(callback: Option<&str>) -> Response {
    respond(
        &serde_json::json!({ "error": "Not found" }),
        callback,
        StatusCode::NOT_FOUND,
    )
}

pub fn bad_request(message: &str, callback: Option<&str>) -> Response {
    respond(
        &serde_json::json!({ "error": message }),
        callback,
        StatusCode::BAD_REQUEST,
    )
}

/// Bodiless 500, as the stats endpoints answer on store failure.
pub fn internal_error() -> Response {
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

/// First non-empty callback parameter, if any.
pub fn callback_name<'a, I>(params: I) -> Option<String>
where
    I: IntoIterator<Item = (&'a String, &'a String)> + Clone,
{
    CALLBACK_PARAMS.iter().find_map(|wanted| {
        params
            .clone()
            .into_iter()
            .find(|(name, value)| name.as_str() == *wanted && !value.is_empty())
            .map(|(_, value)| value.clone())
    })
}
