use crate::amf::Amf0Value;
use crate::chunk::ChunkReader;
use crate::connection::counter::{CountingReader, CountingWriter};
use crate::connection::outbound::{BoxedWriter, MessageWriter, Outbound};
use crate::handlers::{parse_stream_name, respond_publish, Handler, Request};
use crate::handshake::server_handshake;
use crate::protocol::constants::*;
use crate::protocol::{
    Abort, Acknowledgement, CommandMessage, ConnectArgs, Message, SetChunkSize, SetPeerBandwidth,
    UserControl, WindowAckSize,
};
use crate::server::ServerConfig;
use crate::stream::{MediaStream, Packet, StreamRegistry};
use crate::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, BufReader, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Drive one accepted connection to completion: handshake, then the
/// chunk/message loop until the peer goes away or breaks protocol.
pub(crate) async fn serve_connection<S>(
    socket: S,
    peer_addr: String,
    config: Arc<ServerConfig>,
    handler: Arc<dyn Handler>,
    streams: Arc<StreamRegistry>,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let r_bytes = Arc::new(AtomicU64::new(0));
    let w_bytes = Arc::new(AtomicU64::new(0));
    let last_ack = Arc::new(AtomicU64::new(0));

    let (read_half, write_half) = tokio::io::split(socket);
    let mut reader = BufReader::new(CountingReader::new(read_half, r_bytes.clone()));
    let mut writer = BufWriter::new(
        Box::new(CountingWriter::new(write_half, w_bytes.clone())) as BoxedWriter,
    );

    if let Err(e) = server_handshake(&mut reader, &mut writer).await {
        warn!(peer = %peer_addr, error = %e, "handshake failed");
        return;
    }

    let cancel = CancellationToken::new();
    let outbound = Arc::new(Outbound::new(
        writer,
        config.default_msid,
        r_bytes.clone(),
        last_ack.clone(),
    ));

    let mut connection = Connection {
        peer_addr: peer_addr.clone(),
        config,
        handler,
        streams,
        cancel: cancel.clone(),
        outbound,
        r_bytes,
        last_ack,
        peer_window: u32::MAX,
        app: String::new(),
        stream_path: String::new(),
        publishing: None,
    };

    match connection.run(&mut reader).await {
        Ok(()) => info!(peer = %peer_addr, "connection closed"),
        Err(Error::Io(e)) => debug!(peer = %peer_addr, error = %e, "connection dropped"),
        Err(e) => warn!(peer = %peer_addr, error = %e, "connection failed"),
    }

    // teardown: an abandoned publish ends its stream, delivery tasks
    // attached to this connection stop
    if connection.publishing.is_some() {
        connection.streams.finish(&connection.stream_path).await;
    }
    cancel.cancel();
}

struct Connection {
    peer_addr: String,
    config: Arc<ServerConfig>,
    handler: Arc<dyn Handler>,
    streams: Arc<StreamRegistry>,
    cancel: CancellationToken,
    outbound: Arc<Outbound>,

    r_bytes: Arc<AtomicU64>,
    last_ack: Arc<AtomicU64>,
    /// Acknowledgement window announced by the peer; effectively unbounded
    /// until a WindowAckSize or SetPeerBandwidth arrives.
    peer_window: u32,

    app: String,
    stream_path: String,
    /// The stream this connection publishes into. Only set once the
    /// registry granted the claim; a refused publisher never writes.
    publishing: Option<Arc<MediaStream>>,
}

impl Connection {
    async fn run<R>(&mut self, reader: &mut R) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut chunks = ChunkReader::new();
        loop {
            let message = chunks.read_message(reader).await?;

            if message.is_protocol_control() {
                // inline and fatal on failure
                self.handle_protocol(&mut chunks, &message)?;
            } else if let Err(e) = self.handle_message(&message).await {
                match e {
                    Error::Io(_) => return Err(e),
                    e => warn!(peer = %self.peer_addr, error = %e, "dispatch error"),
                }
            }

            self.maybe_acknowledge().await?;
        }
    }

    fn writer(&self) -> MessageWriter {
        MessageWriter::new(self.outbound.clone(), self.cancel.clone())
    }

    fn handle_protocol(&mut self, chunks: &mut ChunkReader, message: &Message) -> Result<()> {
        match message.type_id {
            MSG_TYPE_SET_CHUNK_SIZE => {
                let m = SetChunkSize::unmarshal(&message.payload)?;
                if m.chunk_size > self.config.max_chunk_size {
                    return Err(Error::protocol(format!(
                        "peer chunk size {} above limit {}",
                        m.chunk_size, self.config.max_chunk_size
                    )));
                }
                debug!(size = m.chunk_size, "peer set chunk size");
                chunks.set_chunk_size(m.chunk_size);
            }
            MSG_TYPE_ABORT => {
                let m = Abort::unmarshal(&message.payload)?;
                chunks.abort(m.chunk_stream_id);
            }
            MSG_TYPE_ACK => {
                let m = Acknowledgement::unmarshal(&message.payload)?;
                debug!(sequence = m.sequence_number, "peer acknowledgement");
            }
            MSG_TYPE_WINDOW_ACK => {
                let m = WindowAckSize::unmarshal(&message.payload)?;
                self.peer_window = m.window_size;
            }
            MSG_TYPE_SET_PEER_BW => {
                // limit type is read and dropped; the window value counts
                let m = SetPeerBandwidth::unmarshal(&message.payload)?;
                self.peer_window = m.window_size;
            }
            _ => unreachable!("filtered by is_protocol_control"),
        }
        Ok(())
    }

    /// Acknowledgement law: once a full peer window of bytes has been read
    /// since the last acknowledgement, send one carrying the read counter.
    async fn maybe_acknowledge(&self) -> Result<()> {
        let read = self.r_bytes.load(Ordering::Relaxed);
        let last = self.last_ack.load(Ordering::Relaxed);
        if read.saturating_sub(last) >= self.peer_window as u64 {
            self.outbound
                .write_message(&Acknowledgement {
                    sequence_number: read as u32,
                })
                .await?;
        }
        Ok(())
    }

    async fn handle_message(&mut self, message: &Message) -> Result<()> {
        match message.type_id {
            MSG_TYPE_USER_CONTROL => self.handle_user_control(message).await,
            MSG_TYPE_AUDIO => {
                let packet = Packet::audio(message.timestamp, message.payload.clone());
                self.feed(Arc::new(packet)).await
            }
            MSG_TYPE_VIDEO => {
                let packet = Packet::video(message.timestamp, message.payload.clone());
                self.feed(Arc::new(packet)).await
            }
            MSG_TYPE_DATA_AMF0 => {
                let packet = Packet::meta(message.timestamp, message.payload.clone());
                self.feed(Arc::new(packet)).await
            }
            MSG_TYPE_COMMAND_AMF0 => self.handle_command(message).await,
            MSG_TYPE_COMMAND_AMF3 => Err(Error::unsupported("amf3 command message")),
            MSG_TYPE_DATA_AMF3 => {
                debug!("data message (amf3)");
                Ok(())
            }
            MSG_TYPE_SHARED_OBJECT_AMF0 | MSG_TYPE_SHARED_OBJECT_AMF3 => {
                debug!("shared object message");
                Ok(())
            }
            MSG_TYPE_AGGREGATE => {
                debug!("aggregate message");
                Ok(())
            }
            other => {
                warn!(type_id = other, "unrecognised message type");
                Ok(())
            }
        }
    }

    async fn handle_user_control(&mut self, message: &Message) -> Result<()> {
        let m = UserControl::unmarshal(&message.payload)?;
        match m.event {
            EVENT_STREAM_BEGIN => debug!(stream_id = m.param1, "stream begin event"),
            EVENT_STREAM_EOF => debug!(stream_id = m.param1, "stream eof event"),
            EVENT_STREAM_DRY => debug!(stream_id = m.param1, "stream dry event"),
            EVENT_SET_BUFFER_LENGTH => {
                debug!(stream_id = m.param1, length = m.param2, "set buffer length event")
            }
            EVENT_STREAM_IS_RECORDED => debug!(stream_id = m.param1, "stream is recorded event"),
            EVENT_PING_REQUEST => {
                debug!(timestamp = m.param1, "ping request");
                self.outbound
                    .write_message(&UserControl::new(EVENT_PING_RESPONSE, m.param1))
                    .await?;
            }
            EVENT_PING_RESPONSE => debug!(timestamp = m.param1, "ping response"),
            other => debug!(event = other, "unknown user control event"),
        }
        Ok(())
    }

    /// Publisher data path: into the published stream's ring and out to the
    /// handler's data hook. Connections without a granted publish claim
    /// only reach the data hook.
    async fn feed(&self, packet: Arc<Packet>) -> Result<()> {
        if let Some(stream) = &self.publishing {
            stream.write(Some(packet.clone()));
        }
        self.handler
            .on_data(&self.app, &self.stream_path, packet)
            .await
    }

    async fn handle_command(&mut self, message: &Message) -> Result<()> {
        let command = CommandMessage::decode(&message.payload)?;
        let transaction_id = command.transaction_id as u32;
        debug!(name = %command.name, transaction_id, "command");

        match command.name.as_str() {
            CMD_CONNECT => {
                let object = command
                    .values
                    .first()
                    .ok_or_else(|| Error::protocol("connect without command object"))?;
                let args = ConnectArgs::from_value(object)?;

                // announce our framing before anything else goes out
                self.outbound
                    .write_message(&SetChunkSize {
                        chunk_size: self.config.chunk_size,
                    })
                    .await?;
                self.outbound
                    .write_message(&WindowAckSize {
                        window_size: self.config.window_ack_size,
                    })
                    .await?;

                self.app = args.app.clone();
                let request = Request {
                    transaction_id,
                    command: command.name,
                    host: self.peer_addr.clone(),
                    app: args.app,
                    ..Default::default()
                };
                self.handler.on_command(self.writer(), request).await
            }

            CMD_CREATE_STREAM => {
                let result = CommandMessage::new(
                    RSP_RESULT,
                    command.transaction_id,
                    vec![
                        Amf0Value::Null,
                        Amf0Value::Number(self.config.default_msid as f64),
                    ],
                );
                self.outbound.write_message(&result).await
            }

            CMD_PUBLISH => {
                // arguments: null, stream name, stream type
                let name = command
                    .values
                    .get(1)
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| Error::protocol("publish without stream name"))?;
                let stream_type = command
                    .values
                    .get(2)
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let (path, query) = parse_stream_name(name);

                // claim the path first; a refused publisher gets the error
                // status and never becomes this connection's stream
                let stream = match self.streams.publish(&path).await {
                    Ok(stream) => stream,
                    Err(e) => {
                        warn!(peer = %self.peer_addr, path = %path, error = %e, "publish refused");
                        return respond_publish(&self.writer(), false, &e.to_string()).await;
                    }
                };
                self.stream_path = path.clone();
                self.publishing = Some(stream);

                self.outbound
                    .write_message(&UserControl::new(
                        EVENT_STREAM_BEGIN,
                        self.config.default_msid,
                    ))
                    .await?;

                let request = Request {
                    transaction_id,
                    command: command.name,
                    host: self.peer_addr.clone(),
                    app: self.app.clone(),
                    stream_path: path,
                    stream_type,
                    query,
                };
                self.handler.on_command(self.writer(), request).await
            }

            CMD_PLAY => {
                // arguments: null, stream name [, start, duration, reset]
                let name = command
                    .values
                    .get(1)
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| Error::protocol("play without stream name"))?;
                let (path, query) = parse_stream_name(name);

                let request = Request {
                    transaction_id,
                    command: command.name,
                    host: self.peer_addr.clone(),
                    app: self.app.clone(),
                    stream_path: path,
                    stream_type: String::new(),
                    query,
                };
                self.handler.on_command(self.writer(), request).await
            }

            CMD_FCUNPUBLISH => {
                let name = command
                    .values
                    .get(1)
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| Error::protocol("FCUnpublish without stream name"))?;
                let (path, query) = parse_stream_name(name);

                let request = Request {
                    transaction_id,
                    command: command.name,
                    host: self.peer_addr.clone(),
                    app: self.app.clone(),
                    stream_path: path.clone(),
                    stream_type: String::new(),
                    query,
                };
                let result = self.handler.on_command(self.writer(), request).await;

                if self.publishing.is_some() && self.stream_path == path {
                    self.publishing = None;
                }
                result
            }

            CMD_DELETE_STREAM => {
                let stream_id = command.values.get(1).and_then(|v| v.as_number());
                debug!(stream_id, "deleteStream command");
                if self.publishing.take().is_some() {
                    self.streams.finish(&self.stream_path).await;
                }
                Ok(())
            }

            CMD_FCPUBLISH | CMD_RELEASE_STREAM | CMD_GET_STREAM_LENGTH => {
                let name = command.values.get(1).and_then(|v| v.as_str()).unwrap_or("");
                debug!(command = %command.name, stream = name, "stream pre-announcement");
                Ok(())
            }

            CMD_CALL | CMD_CLOSE | CMD_CLOSE_STREAM | CMD_RECEIVE_AUDIO | CMD_RECEIVE_VIDEO
            | CMD_PLAY2 | CMD_SEEK | CMD_PAUSE => {
                debug!(command = %command.name, "command acknowledged without action");
                Ok(())
            }

            other => Err(Error::protocol(format!("unknown command: {}", other))),
        }
    }
}
