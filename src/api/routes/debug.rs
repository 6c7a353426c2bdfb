use axum::extract::{OriginalUri, RawQuery};
use axum::http::Method;
use axum::Json;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EchoParams {
    pub username: Option<String>,
    pub player_id: Option<String>,
    /// Every query key, in request order, without repeats
    pub all: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct EchoResponse {
    pub method: String,
    pub url: String,
    pub query: Map<String, Value>,
    pub params: EchoParams,
}

/// Echo how the request arrived. Repeated keys keep the last value.
pub async fn echo(
    method: Method,
    OriginalUri(uri): OriginalUri,
    RawQuery(raw): RawQuery,
) -> Json<EchoResponse> {
    let mut query = Map::new();
    let mut all = Vec::new();
    for (key, value) in url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
        if !query.contains_key(key.as_ref()) {
            all.push(key.to_string());
        }
        query.insert(key.into_owned(), Value::String(value.into_owned()));
    }

    let lookup = |name: &str| query.get(name).and_then(Value::as_str).map(str::to_string);
    let params = EchoParams {
        username: lookup("username"),
        player_id: lookup("playerId"),
        all,
    };

    Json(EchoResponse {
        method: method.to_string(),
        url: uri.to_string(),
        query,
        params,
    })
}
