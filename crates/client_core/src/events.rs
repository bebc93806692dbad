use futures::StreamExt;
use shared::protocol::ServerEvent;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};
use url::Url;

use crate::error::ClientError;

/// Live `/ws` subscription for the signed-in employee's company.
pub struct EventStream {
    rx: mpsc::Receiver<ServerEvent>,
    task: JoinHandle<()>,
}

impl EventStream {
    pub async fn connect(server_url: &str, token: &str) -> Result<Self, ClientError> {
        let ws_url = ws_url(server_url, token)?;
        let (ws_stream, _) = connect_async(ws_url.as_str())
            .await
            .map_err(|e| ClientError::Stream(format!("failed to connect websocket: {e}")))?;
        let (_, mut ws_reader) = ws_stream.split();

        let (tx, rx) = mpsc::channel(64);
        let task = tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => {
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => warn!(error = %err, "ignoring malformed server event"),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        warn!(error = %err, "event stream closed with error");
                        break;
                    }
                }
            }
            debug!("event stream reader finished");
        });

        Ok(Self { rx, task })
    }

    /// Next event, or `None` once the server closes the stream.
    pub async fn next(&mut self) -> Option<ServerEvent> {
        self.rx.recv().await
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn ws_url(server_url: &str, token: &str) -> Result<Url, ClientError> {
    let mut url = Url::parse(server_url.trim())
        .map_err(|e| ClientError::Stream(format!("invalid server url '{server_url}': {e}")))?;
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => {
            return Err(ClientError::Stream(format!(
                "server url must start with http:// or https://, got {other}://"
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| ClientError::Stream("could not derive websocket url".into()))?;
    url.set_path("/ws");
    url.query_pairs_mut().clear().append_pair("token", token);
    Ok(url)
}

#[cfg(test)]
#[path = "tests/events_tests.rs"]
mod tests;
