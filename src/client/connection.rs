use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};

use super::ClientError;
use crate::{
    relay::{ClientEvent, SendMessage, ServerEvent},
    store::MessageRecord,
};

/// Client end of one relay socket.
pub struct RelayConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl RelayConnection {
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (stream, _) = tokio_tungstenite::connect_async(url).await?;
        Ok(Self { stream })
    }

    pub async fn join(&mut self, order_id: &str) -> Result<(), ClientError> {
        self.emit(&ClientEvent::JoinRoom(order_id.to_owned())).await
    }

    pub async fn send_message(&mut self, order_id: &str, message: MessageRecord) -> Result<(), ClientError> {
        self.emit(&ClientEvent::SendMessage(SendMessage {
            order_id: order_id.to_owned(),
            message,
        }))
        .await
    }

    async fn emit(&mut self, event: &ClientEvent) -> Result<(), ClientError> {
        let text = serde_json::to_string(event)?;
        self.stream.send(Message::Text(text.into())).await?;
        Ok(())
    }

    /// Next event from the relay, or `None` once the socket is gone.
    pub async fn next_event(&mut self) -> Option<ServerEvent> {
        while let Some(frame) = self.stream.next().await {
            let text = match frame {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => continue,
            };

            match serde_json::from_str(text.as_str()) {
                Ok(event) => return Some(event),
                Err(err) => tracing::debug!(%err, "ignoring unreadable relay frame"),
            }
        }
        None
    }

    pub async fn close(mut self) -> Result<(), ClientError> {
        self.stream.close(None).await?;
        Ok(())
    }
}
