//! Scoped, single-message MQTT session.
//!
//! ```text
//! MqttSession::open ──> publish ──> close
//!                          │          ▲
//!                          └─(error)──┘
//! ```
//!
//! [`publish_once`] is the scope: whatever `publish` returns, `close` runs
//! afterwards and sends DISCONNECT if the connection is still up. The
//! event loop is driven inline (no background task), and every stage is
//! bounded by `connection_timeout`. Errors are returned as-is; there is no
//! reconnect and no retry.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, Outgoing, Packet, QoS};
use tracing::{debug, trace, warn};

use super::{client::ClientBuilder, config::Config, error::TransferError, Result};

/// One connection used for one publish.
pub struct MqttSession {
    client: AsyncClient,
    event_loop: EventLoop,
    timeout: Duration,
    retain: bool,
    connected: bool,
    closed: bool,
}

impl MqttSession {
    /// Builds the client. Nothing is sent until [`MqttSession::publish`].
    pub fn open(config: &Config) -> Result<Self> {
        let builder = ClientBuilder::from_config(config)?;
        debug!(
            client_id = %builder.client_id(),
            host = %config.host,
            port = config.port,
            "Opening MQTT session"
        );
        let (client, event_loop) = builder.build()?;

        Ok(Self {
            client,
            event_loop,
            timeout: Duration::from_secs(config.connection_timeout),
            retain: config.retain,
            connected: false,
            closed: false,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Publishes `payload` to `topic` with QoS 1 and waits for the PUBACK.
    pub async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<()> {
        validate_topic(topic)?;

        let size = payload.len();
        self.client
            .publish(topic, QoS::AtLeastOnce, self.retain, payload)
            .await?;

        let timeout = self.timeout;
        let outcome = tokio::time::timeout(timeout, self.drive_until_puback()).await;
        match outcome {
            Ok(result) => {
                if result.is_ok() {
                    debug!(topic, bytes = size, "Snapshot acknowledged by broker");
                }
                result
            }
            Err(_) => Err(TransferError::Timeout {
                stage: if self.connected {
                    "waiting for PUBACK"
                } else {
                    "connecting to broker"
                },
                secs: timeout.as_secs(),
            }),
        }
    }

    async fn drive_until_puback(&mut self) -> Result<()> {
        let mut pkid = None;
        loop {
            let event = match self.event_loop.poll().await {
                Ok(event) => event,
                // The event loop reconnects on the next poll, so `close` must not touch it.
                Err(e) => {
                    self.connected = false;
                    return Err(e.into());
                }
            };
            match event {
                // Refused CONNACKs surface as ConnectionError::ConnectionRefused.
                Event::Incoming(Packet::ConnAck(ack)) => {
                    debug!(session_present = ack.session_present, "Connected to broker");
                    self.connected = true;
                }
                Event::Outgoing(Outgoing::Publish(id)) => {
                    trace!(pkid = id, "PUBLISH sent");
                    pkid = Some(id);
                }
                Event::Incoming(Packet::PubAck(ack)) if Some(ack.pkid) == pkid => {
                    trace!(pkid = ack.pkid, "PUBACK received");
                    return Ok(());
                }
                Event::Incoming(Packet::Disconnect) => {
                    self.connected = false;
                    return Err(TransferError::ConnectionRefused(
                        "disconnected by broker before PUBACK".into(),
                    ));
                }
                event => trace!(?event, "MQTT event"),
            }
        }
    }

    /// Sends DISCONNECT and flushes it. Best effort: failures are logged.
    ///
    /// Does nothing if the session never connected, lost its connection or
    /// is already closed.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if !self.connected {
            debug!("No live MQTT connection, nothing to disconnect");
            return;
        }

        if let Err(e) = self.client.disconnect().await {
            warn!("Error queueing disconnect packet: {}", e);
            return;
        }

        let timeout = self.timeout;
        let event_loop = &mut self.event_loop;
        let flush = async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
                    Ok(event) => trace!(?event, "MQTT event while disconnecting"),
                    Err(e) => {
                        debug!("Event loop ended while disconnecting: {}", e);
                        break;
                    }
                }
            }
        };

        if tokio::time::timeout(timeout, flush).await.is_err() {
            warn!("Disconnect not flushed within {}s", timeout.as_secs());
        }

        self.connected = false;
        debug!("MQTT session closed");
    }
}

impl Drop for MqttSession {
    fn drop(&mut self) {
        if self.connected && !self.closed {
            warn!("MQTT session dropped without DISCONNECT, socket closed abruptly");
        }
    }
}

/// Opens a session, publishes one message and always closes the session.
pub async fn publish_once(config: &Config, topic: &str, payload: Vec<u8>) -> Result<()> {
    let mut session = MqttSession::open(config)?;
    let outcome = session.publish(topic, payload).await;
    session.close().await;
    outcome
}

fn validate_topic(topic: &str) -> Result<()> {
    if topic.is_empty() {
        return Err(TransferError::InvalidMetadata(
            "topic must not be empty".into(),
        ));
    }
    if topic.contains(['+', '#']) {
        return Err(TransferError::InvalidMetadata(format!(
            "publish topic must not contain wildcards: {}",
            topic
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
        sync::mpsc,
    };
    use tracing_test::traced_test;

    use super::*;

    const CONNECT: u8 = 1;
    const PUBLISH: u8 = 3;
    const DISCONNECT: u8 = 14;

    async fn read_packet(stream: &mut TcpStream) -> std::io::Result<(u8, Vec<u8>)> {
        let header = stream.read_u8().await?;
        let mut len = 0usize;
        let mut shift = 0;
        loop {
            let byte = stream.read_u8().await?;
            len |= ((byte & 0x7f) as usize) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        let mut body = vec![0; len];
        stream.read_exact(&mut body).await?;
        Ok((header, body))
    }

    /// What the fake broker does with a QoS 1 PUBLISH.
    #[derive(Clone, Copy)]
    enum OnPublish {
        Ack,
        Ignore,
        Hangup,
    }

    /// Minimal broker: answers CONNECT with `connack_code` (or stays silent
    /// when `None`), handles QoS 1 publishes per `OnPublish` and reports
    /// every packet type it receives.
    struct FakeBroker {
        port: u16,
        accepted: Arc<AtomicUsize>,
        packets: mpsc::UnboundedReceiver<(u8, Vec<u8>)>,
    }

    impl FakeBroker {
        async fn start(connack_code: Option<u8>) -> Self {
            Self::start_with(connack_code, OnPublish::Ack).await
        }

        async fn start_with(connack_code: Option<u8>, on_publish: OnPublish) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let port = listener.local_addr().unwrap().port();
            let accepted = Arc::new(AtomicUsize::new(0));
            let (tx, packets) = mpsc::unbounded_channel();

            let counter = accepted.clone();
            tokio::spawn(async move {
                while let Ok((mut stream, _)) = listener.accept().await {
                    counter.fetch_add(1, Ordering::SeqCst);
                    while let Ok((header, body)) = read_packet(&mut stream).await {
                        let kind = header >> 4;
                        let _ = tx.send((kind, body.clone()));
                        match kind {
                            CONNECT => match connack_code {
                                Some(code) => {
                                    stream.write_all(&[0x20, 0x02, 0x00, code]).await.unwrap();
                                    if code != 0 {
                                        break;
                                    }
                                }
                                None => {}
                            },
                            PUBLISH if (header >> 1) & 0x03 == 1 => match on_publish {
                                OnPublish::Ack => {
                                    let topic_len =
                                        u16::from_be_bytes([body[0], body[1]]) as usize;
                                    let pkid = &body[2 + topic_len..4 + topic_len];
                                    stream
                                        .write_all(&[0x40, 0x02, pkid[0], pkid[1]])
                                        .await
                                        .unwrap();
                                }
                                OnPublish::Ignore => {}
                                OnPublish::Hangup => break,
                            },
                            DISCONNECT => break,
                            _ => {}
                        }
                    }
                }
            });

            FakeBroker {
                port,
                accepted,
                packets,
            }
        }

        fn config(&self) -> Config {
            Config {
                host: "127.0.0.1".into(),
                port: self.port,
                connection_timeout: 2,
                ..Default::default()
            }
        }

        async fn next_packet(&mut self) -> (u8, Vec<u8>) {
            tokio::time::timeout(Duration::from_secs(2), self.packets.recv())
                .await
                .expect("broker did not receive a packet in time")
                .expect("broker channel closed")
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn publishes_with_qos1_and_disconnects() {
        let mut broker = FakeBroker::start(Some(0)).await;
        let config = broker.config();

        publish_once(&config, "masoko/pi4", br#"{"UsedSpace":42}"#.to_vec())
            .await
            .expect("publish should succeed");

        assert_eq!(broker.next_packet().await.0, CONNECT);

        let (kind, body) = broker.next_packet().await;
        assert_eq!(kind, PUBLISH);
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("masoko/pi4"));
        assert!(text.contains(r#"{"UsedSpace":42}"#));

        assert_eq!(broker.next_packet().await.0, DISCONNECT);
        assert!(logs_contain("Snapshot acknowledged by broker"));
    }

    #[tokio::test]
    async fn rejected_credentials_fail_without_retry() {
        let broker = FakeBroker::start(Some(0x04)).await;
        let config = Config {
            user: "probe".into(),
            password: "wrong".into(),
            ..broker.config()
        };

        let result = publish_once(&config, "masoko/pi4", b"{}".to_vec()).await;
        assert!(matches!(result, Err(TransferError::ConnectionRefused(_))));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(broker.accepted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refused_socket_is_a_connection_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = Config {
            host: "127.0.0.1".into(),
            port,
            connection_timeout: 2,
            ..Default::default()
        };

        let result = publish_once(&config, "masoko/pi4", b"{}".to_vec()).await;
        assert!(matches!(result, Err(TransferError::ClientConnection(_))));
    }

    #[tokio::test]
    async fn silent_broker_times_out_while_connecting() {
        let broker = FakeBroker::start(None).await;
        let config = Config {
            connection_timeout: 1,
            ..broker.config()
        };

        let result = publish_once(&config, "masoko/pi4", b"{}".to_vec()).await;
        match result {
            Err(TransferError::Timeout { stage, secs }) => {
                assert_eq!(stage, "connecting to broker");
                assert_eq!(secs, 1);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_puback_times_out_and_still_disconnects() {
        let mut broker = FakeBroker::start_with(Some(0), OnPublish::Ignore).await;
        let config = Config {
            connection_timeout: 1,
            ..broker.config()
        };

        let result = publish_once(&config, "masoko/pi4", b"{}".to_vec()).await;
        match result {
            Err(TransferError::Timeout { stage, secs }) => {
                assert_eq!(stage, "waiting for PUBACK");
                assert_eq!(secs, 1);
            }
            other => panic!("expected timeout, got {:?}", other),
        }

        assert_eq!(broker.next_packet().await.0, CONNECT);
        assert_eq!(broker.next_packet().await.0, PUBLISH);
        assert_eq!(broker.next_packet().await.0, DISCONNECT);
        assert_eq!(broker.accepted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn dropped_connection_is_not_reopened_on_close() {
        let mut broker = FakeBroker::start_with(Some(0), OnPublish::Hangup).await;
        let config = broker.config();

        let result = publish_once(&config, "masoko/pi4", b"{}".to_vec()).await;
        assert!(matches!(result, Err(TransferError::ClientConnection(_))));

        assert_eq!(broker.next_packet().await.0, CONNECT);
        assert_eq!(broker.next_packet().await.0, PUBLISH);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(broker.accepted.load(Ordering::SeqCst), 1);
        assert!(broker.packets.try_recv().is_err());
        assert!(logs_contain("No live MQTT connection"));
    }

    #[tokio::test]
    async fn wildcard_topic_is_rejected_before_connecting() {
        let mut session = MqttSession::open(&Config::default()).unwrap();

        let result = session.publish("masoko/+", b"{}".to_vec()).await;
        assert!(matches!(result, Err(TransferError::InvalidMetadata(_))));
        assert!(!session.is_connected());

        session.close().await;
    }

    #[test]
    fn empty_topic_is_invalid() {
        assert!(validate_topic("").is_err());
        assert!(validate_topic("masoko/pi4").is_ok());
        assert!(validate_topic("masoko/#").is_err());
    }
}
