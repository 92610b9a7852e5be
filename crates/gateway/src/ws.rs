//! WebSocket JSON-RPC 2.0 transport.
//!
//! Accepts connections at `/ws` and routes JSON-RPC requests to the
//! `GatewayHandler`. The ingestion shared secret travels in the
//! `?secret=` query parameter of the connection URL: a wrong secret is
//! rejected at the handshake with 401, an absent one yields an
//! unprivileged connection that can call every method except
//! `ingest.batch`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::handler::GatewayHandler;
use crate::protocol::{code, RpcRequest, RpcResponse};

/// Run the gateway server.
///
/// Listens on the given port and upgrades HTTP connections at `/ws` to
/// WebSocket. Each incoming text message is one JSON-RPC 2.0 request.
pub async fn run_server(
    port: u16,
    handler: Arc<GatewayHandler>,
    webhook_secret: Option<String>,
) -> std::io::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    info!("gateway listening on ws://0.0.0.0:{}/ws", port);

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let handler = handler.clone();
                let secret = webhook_secret.clone();
                tokio::spawn(async move {
                    let (ws_stream, privileged) = match accept_ws(stream, secret.as_deref()).await {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            debug!("WebSocket handshake failed from {}: {}", peer, e);
                            return;
                        }
                    };

                    debug!(privileged, "WebSocket client connected: {}", peer);
                    handle_connection(ws_stream, handler, peer, privileged).await;
                    debug!("WebSocket client disconnected: {}", peer);
                });
            }
            Err(e) => {
                error!("Failed to accept TCP connection: {}", e);
            }
        }
    }
}

/// Perform the WebSocket handshake with path and secret validation.
///
/// Returns the stream plus whether the connection is privileged for
/// ingestion.
async fn accept_ws(
    stream: tokio::net::TcpStream,
    webhook_secret: Option<&str>,
) -> Result<
    (
        tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
        bool,
    ),
    tokio_tungstenite::tungstenite::Error,
> {
    let privileged = Arc::new(AtomicBool::new(false));
    let privileged_in_callback = privileged.clone();
    let expected = webhook_secret.map(str::to_owned);

    let ws_stream = tokio_tungstenite::accept_hdr_async(
        stream,
        move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            let uri = req.uri();
            let path = uri.path();
            if path != "/ws" && path != "/ws/" {
                let mut err = ErrorResponse::new(Some("Not Found".into()));
                *err.status_mut() = StatusCode::NOT_FOUND;
                return Err(err);
            }

            let presented = uri.query().unwrap_or("").split('&').find_map(|pair| {
                let (k, v) = pair.split_once('=')?;
                (k == "secret").then(|| v.to_string())
            });

            match (expected.as_deref(), presented.as_deref()) {
                // Correct secret: privileged connection.
                (Some(expected), Some(presented)) if presented == expected => {
                    privileged_in_callback.store(true, Ordering::Relaxed);
                    Ok(resp)
                }
                // Wrong secret against a configured one: reject outright.
                (Some(_), Some(_)) => {
                    let mut err = ErrorResponse::new(Some("Unauthorized".into()));
                    *err.status_mut() = StatusCode::UNAUTHORIZED;
                    Err(err)
                }
                // No secret presented, or none configured: unprivileged.
                _ => Ok(resp),
            }
        },
    )
    .await?;

    Ok((ws_stream, privileged.load(Ordering::Relaxed)))
}

async fn handle_connection(
    ws_stream: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    handler: Arc<GatewayHandler>,
    peer: std::net::SocketAddr,
    privileged: bool,
) {
    let (mut sink, mut stream) = ws_stream.split();

    while let Some(msg) = stream.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                debug!("WebSocket read error from {}: {}", peer, e);
                break;
            }
        };

        match msg {
            Message::Text(text) => {
                let response = match serde_json::from_str::<RpcRequest>(&text) {
                    Ok(req) => {
                        debug!("RPC: {} (id={})", req.method, req.id);
                        match handler.dispatch(&req.method, req.params, privileged).await {
                            Ok(result) => RpcResponse::success(req.id, result),
                            Err(e) => RpcResponse::error(req.id, e.code, e.message),
                        }
                    }
                    Err(e) => {
                        warn!("Invalid JSON-RPC from {}: {}", peer, e);
                        RpcResponse::error(
                            serde_json::Value::Null,
                            code::PARSE_ERROR,
                            format!("Parse error: {}", e),
                        )
                    }
                };

                let json = serde_json::to_string(&response).unwrap_or_default();
                if sink.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
            Message::Ping(data) => {
                if sink.send(Message::Pong(data)).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
}
