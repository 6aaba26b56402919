use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
};

pub async fn ws_handler(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(handle_socket)
}

async fn handle_socket(mut socket: WebSocket) {
    log::info!("socket connected");
    while let Some(msg) = socket.recv().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                log::warn!("socket error: {e}");
                break;
            }
        };
        match msg {
            Message::Text(text) if text == "ping" => {
                if socket.send(Message::Text("pong".into())).await.is_err() {
                    break;
                }
            }
            Message::Text(text) => log::warn!("unexpected text message: {text}"),
            Message::Close(_) => break,
            _ => {}
        }
    }
    log::info!("socket disconnected");
}
