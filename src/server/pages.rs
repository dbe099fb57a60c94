use axum::{
    http::{ header, HeaderValue },
    response::Html,
    routing::get,
    Router,
};
use tower_http::set_header::SetResponseHeaderLayer;

const INDEX_HTML: &str = include_str!("../../static/index.html");
const CHAT_HTML: &str = include_str!("../../static/chat.html");

/// Landing page, chat page and liveness probe.
pub fn page_router() -> Router {
    let chat = Router::new()
        .route("/chat", get(|| async { Html(CHAT_HTML) }))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store")
        ));

    Router::new()
        .route("/", get(|| async { Html(INDEX_HTML) }))
        .route("/healthz", get(|| async { "ok" }))
        .merge(chat)
}
