// Shared test plumbing: a scripted RTMP client speaking the real wire
// protocol against a server under test.

use rtmpd::{
    channel_for, decode_all, encode_all, generate_random_bytes, Amf0Value, ChunkReader,
    ChunkWriter, CommandMessage, Message, Messager, Server, ServerConfig, SetChunkSize,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Start a server with the default mux on a fixed port and give it a
/// moment to bind.
pub async fn start_server(port: u16) -> Arc<Server> {
    init_tracing();
    let config = ServerConfig::builder()
        .addr(format!("127.0.0.1:{}", port))
        .build()
        .expect("test server config");
    let server = Arc::new(Server::new(config));

    let task_server = server.clone();
    tokio::spawn(async move { task_server.listen_and_serve().await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    server
}

pub struct TestClient {
    stream: TcpStream,
    reader: ChunkReader,
    writer: ChunkWriter,
}

impl TestClient {
    pub async fn connect(port: u16) -> Self {
        let stream = TcpStream::connect(format!("127.0.0.1:{}", port))
            .await
            .expect("connect to test server");
        TestClient {
            stream,
            reader: ChunkReader::new(),
            writer: ChunkWriter::new(),
        }
    }

    /// Simple handshake: zeroed version field, echo checks, C2 echo of S1.
    pub async fn handshake(&mut self) {
        let mut c0c1 = vec![3u8];
        let mut c1 = generate_random_bytes(1536);
        c1[4..8].fill(0);
        c0c1.extend_from_slice(&c1);
        self.stream.write_all(&c0c1).await.expect("write C0+C1");

        let mut response = vec![0u8; 1 + 2 * 1536];
        timeout(RECV_TIMEOUT, self.stream.read_exact(&mut response))
            .await
            .expect("handshake timed out")
            .expect("read S0+S1+S2");
        assert_eq!(response[0], 3, "S0 version");
        assert_eq!(&response[1537..], &c1[..], "S2 echoes C1");

        // C2 echoes S1
        let c2 = response[1..1537].to_vec();
        self.stream.write_all(&c2).await.expect("write C2");
    }

    pub async fn send<M: Messager>(&mut self, message: &M) {
        let payload = message.marshal().expect("marshal message");
        let (csid, msid) = channel_for(message.type_id(), 7);
        self.writer
            .write_message(
                &mut self.stream,
                csid,
                msid,
                message.type_id(),
                message.timestamp(),
                &payload,
            )
            .await
            .expect("write message");
    }

    /// Receive one message, applying Set Chunk Size to the reader so the
    /// server's 4096-byte announcement takes effect mid-test.
    pub async fn recv(&mut self) -> Message {
        let message = timeout(RECV_TIMEOUT, self.reader.read_message(&mut self.stream))
            .await
            .expect("recv timed out")
            .expect("read message");
        if message.type_id == 1 {
            let m = SetChunkSize::unmarshal(&message.payload).expect("set chunk size payload");
            self.reader.set_chunk_size(m.chunk_size);
        }
        message
    }

    /// Receive until an AMF0 command message arrives.
    pub async fn recv_command(&mut self) -> CommandMessage {
        loop {
            let message = self.recv().await;
            if message.type_id == 20 {
                return CommandMessage::decode(&message.payload).expect("decode command");
            }
        }
    }

    /// Run the connect exchange and swallow the server's framing
    /// announcements, returning the `_result` command.
    pub async fn do_connect(&mut self, app: &str) -> CommandMessage {
        let mut object = HashMap::new();
        object.insert("app".to_string(), Amf0Value::String(app.to_string()));
        object.insert(
            "tcUrl".to_string(),
            Amf0Value::String(format!("rtmp://127.0.0.1/{}", app)),
        );
        self.send(&CommandMessage::new(
            "connect",
            1.0,
            vec![Amf0Value::Object(object)],
        ))
        .await;
        self.recv_command().await
    }

    pub async fn do_create_stream(&mut self, transaction_id: f64) -> CommandMessage {
        self.send(&CommandMessage::new(
            "createStream",
            transaction_id,
            vec![Amf0Value::Null],
        ))
        .await;
        self.recv_command().await
    }
}

/// AMF0 payload of an onMetaData message.
pub fn meta_payload() -> Vec<u8> {
    let mut values = HashMap::new();
    values.insert("width".to_string(), Amf0Value::Number(1280.0));
    values.insert("height".to_string(), Amf0Value::Number(720.0));
    encode_all(&[
        Amf0Value::String("onMetaData".to_string()),
        Amf0Value::EcmaArray(values),
    ])
    .expect("encode metadata")
}

pub fn video_config_payload() -> Vec<u8> {
    vec![0x17, 0x00, 0x00, 0x00, 0x00, 0x01, 0x64]
}

pub fn audio_config_payload() -> Vec<u8> {
    vec![0xAF, 0x00, 0x12, 0x10]
}

pub fn keyframe_payload(marker: u8) -> Vec<u8> {
    vec![0x17, 0x01, 0x00, 0x00, 0x00, marker]
}

pub fn interframe_payload(marker: u8) -> Vec<u8> {
    vec![0x27, 0x01, 0x00, 0x00, 0x00, marker]
}

/// Field lookup on a decoded AMF0 info object.
pub fn info_field(command: &CommandMessage, index: usize, key: &str) -> String {
    command.values[index]
        .as_object()
        .and_then(|obj| obj.get(key))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

/// Decode a command payload straight from a message (for assertions on
/// raw messages pulled out of order).
pub fn decode_values(payload: &[u8]) -> Vec<Amf0Value> {
    decode_all(payload).expect("decode amf payload")
}
