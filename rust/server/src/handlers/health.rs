use serde_json::json;
use warp::reply::{self, Response};
use warp::Reply;

pub fn health() -> Response {
    reply::json(&json!({ "status": "ok" })).into_response()
}
