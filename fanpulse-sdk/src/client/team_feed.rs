//! WebSocket subscription to one team's processed updates.

use futures_util::StreamExt;
use futures_util::stream::SplitStream;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use super::ClientError;
use crate::objects::ws::WsServerMessage;

type WsRead = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Live feed of [`WsServerMessage`]s for a single team.
///
/// ```ignore
/// let mut feed = TeamFeed::connect(&base, "KC").await?;
/// while let Some(msg) = feed.next_message().await? {
///     println!("{msg:?}");
/// }
/// ```
pub struct TeamFeed {
    read: WsRead,
}

impl TeamFeed {
    /// Connect to `{base}/api/v1/teams/{team_id}/ws`. An `http(s)` base URL
    /// is rewritten to `ws(s)`.
    pub async fn connect(base_url: &Url, team_id: &str) -> Result<Self, ClientError> {
        let mut url = base_url.join(&format!(
            "/api/v1/teams/{}/ws",
            urlencoding::encode(team_id)
        ))?;
        let scheme = match url.scheme() {
            "https" => Some("wss"),
            "http" => Some("ws"),
            _ => None,
        };
        if let Some(scheme) = scheme {
            // http -> ws and https -> wss are always permitted by `url`.
            let _ = url.set_scheme(scheme);
        }

        let (stream, _) = connect_async(url.as_str()).await?;
        let (_, read) = stream.split();
        Ok(Self { read })
    }

    /// Wait for the next server message. Returns `Ok(None)` once the server
    /// closes the connection.
    pub async fn next_message(&mut self) -> Result<Option<WsServerMessage>, ClientError> {
        while let Some(frame) = self.read.next().await {
            match frame? {
                Message::Text(text) => return Ok(Some(serde_json::from_str(&text)?)),
                Message::Close(_) => return Ok(None),
                _ => continue,
            }
        }
        Ok(None)
    }
}
