use super::*;
use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use shared::domain::CompanyId;
use std::collections::HashMap;
use tokio::net::TcpListener;

async fn ws_route(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let company = if params.get("token").map(String::as_str) == Some("tok-1") {
        1
    } else {
        0
    };
    ws.on_upgrade(move |socket| push_events(socket, company))
}

async fn push_events(mut socket: WebSocket, company: i64) {
    let event = ServerEvent::ComplianceScoreInvalidated {
        company_id: CompanyId(company),
    };
    let text = serde_json::to_string(&event).expect("json");
    let _ = socket.send(WsMessage::Text("not json".into())).await;
    let _ = socket.send(WsMessage::Text(text)).await;
    let _ = socket.send(WsMessage::Close(None)).await;
}

async fn spawn_ws_server() -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new().route("/ws", get(ws_route));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

#[test]
fn ws_url_swaps_scheme_and_carries_token() {
    let url = ws_url("https://reviews.test/base", "a b").expect("url");
    assert_eq!(url.as_str(), "wss://reviews.test/ws?token=a+b");
    let url = ws_url("http://127.0.0.1:8443", "t").expect("url");
    assert_eq!(url.as_str(), "ws://127.0.0.1:8443/ws?token=t");
}

#[test]
fn ws_url_rejects_other_schemes() {
    assert!(matches!(
        ws_url("ftp://reviews.test", "t"),
        Err(ClientError::Stream(_))
    ));
}

#[tokio::test]
async fn stream_yields_events_and_skips_malformed_frames() {
    let server_url = spawn_ws_server().await;
    let mut stream = EventStream::connect(&server_url, "tok-1")
        .await
        .expect("connect");

    let event = tokio::time::timeout(std::time::Duration::from_secs(5), stream.next())
        .await
        .expect("timely event")
        .expect("event");
    assert_eq!(
        event,
        ServerEvent::ComplianceScoreInvalidated {
            company_id: CompanyId(1)
        }
    );

    let end = tokio::time::timeout(std::time::Duration::from_secs(5), stream.next())
        .await
        .expect("stream end");
    assert!(end.is_none());
}
