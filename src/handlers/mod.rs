use crate::connection::MessageWriter;
use crate::protocol::constants::*;
use crate::protocol::{status_info, CommandMessage};
use crate::stream::{MediaStream, Packet, StreamRegistry};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Control-plane request handed to `Handler::on_command`.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub transaction_id: u32,
    pub command: String,
    /// Remote address of the peer
    pub host: String,
    pub app: String,
    pub stream_path: String,
    pub stream_type: String,
    /// Query parameters carried in the stream name
    pub query: HashMap<String, String>,
}

/// What an embedding program plugs into the server: a control-plane hook
/// and a data-plane hook. `ServeMux` is the default implementation.
#[async_trait]
pub trait Handler: Send + Sync {
    /// A recognised command arrived; answer through the writer.
    async fn on_command(&self, writer: MessageWriter, request: Request) -> Result<()>;

    /// A published media or metadata packet arrived.
    async fn on_data(&self, app: &str, stream_path: &str, packet: Arc<Packet>) -> Result<()>;
}

/// Handler for a single command name, registered on a `ServeMux`.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, writer: MessageWriter, request: Request) -> Result<()>;
}

/// Routes commands by name to registered handlers and answers the
/// lifecycle commands with the standard responses when nothing is
/// registered: connect succeeds, publish claims the stream path, play
/// attaches a delivery task to the published stream.
pub struct ServeMux {
    commands: HashMap<String, Arc<dyn CommandHandler>>,
    streams: Arc<StreamRegistry>,
}

impl ServeMux {
    pub fn new(streams: Arc<StreamRegistry>) -> Self {
        ServeMux {
            commands: HashMap::new(),
            streams,
        }
    }

    /// Register a handler for a command name, replacing any default.
    pub fn handle_command(&mut self, name: impl Into<String>, handler: Arc<dyn CommandHandler>) {
        self.commands.insert(name.into(), handler);
    }
}

#[async_trait]
impl Handler for ServeMux {
    async fn on_command(&self, writer: MessageWriter, request: Request) -> Result<()> {
        if let Some(handler) = self.commands.get(&request.command) {
            return handler.handle(writer, request).await;
        }

        match request.command.as_str() {
            CMD_CONNECT => respond_connect(&writer, true, "").await,
            // the engine only invokes the handler after the registry
            // granted the publish claim; all that is left is the status
            CMD_PUBLISH => respond_publish(&writer, true, "").await,
            CMD_PLAY => match self.streams.get(&request.stream_path).await {
                Some(stream) => {
                    respond_play(&writer, true, "").await?;
                    tokio::spawn(deliver(stream, writer, request.stream_path));
                    Ok(())
                }
                None => {
                    respond_play(&writer, false, &format!("{} not found", request.stream_path))
                        .await
                }
            },
            CMD_FCUNPUBLISH => {
                self.streams.finish(&request.stream_path).await;
                Ok(())
            }
            _ => Err(Error::protocol(format!(
                "command handler not found: {}",
                request.command
            ))),
        }
    }

    async fn on_data(&self, _app: &str, _stream_path: &str, _packet: Arc<Packet>) -> Result<()> {
        // media already flows into the registry's streams; nothing extra
        Ok(())
    }
}

/// Feed a play subscriber: config frames, then packets from the keyframe
/// entry, until cancellation or end of stream.
async fn deliver(stream: Arc<MediaStream>, writer: MessageWriter, path: String) {
    let cancel = writer.cancellation();
    let mut iter = stream.iterator();
    let result = iter
        .for_each(&cancel, |packet| {
            let writer = writer.clone();
            async move { writer.write_message(&packet.to_message()).await }
        })
        .await;
    match result {
        Ok(()) | Err(Error::Eos) => debug!(path = %path, "play delivery ended"),
        Err(e) => warn!(path = %path, error = %e, "play delivery failed"),
    }
    iter.release();
}

/// Answer a connect command. Success carries the fixed server properties
/// and `NetConnection.Connect.Success`; refusal flips the level and code.
pub async fn respond_connect(writer: &MessageWriter, status: bool, description: &str) -> Result<()> {
    let info = if status {
        status_info(LEVEL_STATUS, "NetConnection.Connect.Success", "Connection succeeded")
    } else {
        status_info(LEVEL_ERROR, "NetConnection.Connect.Refused", description)
    };
    writer
        .write_message(&CommandMessage::connect_result(1.0, info))
        .await
}

/// Answer a publish command with `onStatus`.
pub async fn respond_publish(writer: &MessageWriter, status: bool, description: &str) -> Result<()> {
    let message = if status {
        CommandMessage::on_status(LEVEL_STATUS, "NetStream.Publish.Start", "Start publishing")
    } else {
        CommandMessage::on_status(LEVEL_ERROR, "NetStream.Publish.Error", description)
    };
    writer.write_message(&message).await
}

/// Answer a play command with `onStatus`; an unknown stream reports
/// `NetStream.Play.StreamNotFound`.
pub async fn respond_play(writer: &MessageWriter, status: bool, description: &str) -> Result<()> {
    let message = if status {
        CommandMessage::on_status(LEVEL_STATUS, "NetStream.Play.Start", "Start playing")
    } else {
        CommandMessage::on_status(LEVEL_ERROR, "NetStream.Play.StreamNotFound", description)
    };
    writer.write_message(&message).await
}

/// Split a publish/play stream name into its path and query parameters
/// ("mystream?token=abc" style).
pub fn parse_stream_name(name: &str) -> (String, HashMap<String, String>) {
    match name.split_once('?') {
        Some((path, query)) => (
            path.to_string(),
            url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
        ),
        None => (name.to_string(), HashMap::new()),
    }
}
