use super::Incoming;
use crate::config::{MqttConfig, TlsConfig};
use crate::consts;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS, TlsConfiguration, Transport};
use rumqttc::{Event, Packet};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task;

use tracing::{debug, error, info, warn};

/// How long `publish_once` waits for the broker to acknowledge.
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

/// Connected, but not yet pumping messages.
pub struct Initiator {
    client: AsyncClient,
    event_loop: EventLoop,
    reconnect_delay: Duration,
}

/// Running MQTT session feeding control messages.
pub struct Broker {
    /// Incoming event queue: control publishes read from the broker.
    incoming: mpsc::Receiver<Incoming>,
}

fn tls_transport(tls: &TlsConfig) -> anyhow::Result<Transport> {
    let ca = std::fs::read(&tls.ca)?;
    let client_auth = match (&tls.cert, &tls.key) {
        (Some(cert), Some(key)) => Some((std::fs::read(cert)?, std::fs::read(key)?)),
        _ => None,
    };
    let alpn = if tls.alpn.is_empty() {
        None
    } else {
        Some(tls.alpn.iter().map(|p| p.as_bytes().to_vec()).collect())
    };

    Ok(Transport::tls_with_config(TlsConfiguration::Simple {
        ca,
        alpn,
        client_auth,
    }))
}

impl Initiator {
    pub async fn new(
        config: &MqttConfig,
        host: &str,
        port: u16,
        username: &str,
        password: &str,
    ) -> anyhow::Result<Self> {
        let mut mqttoptions = MqttOptions::new(&config.client_id, host, port);
        mqttoptions.set_keep_alive(Duration::from_secs(consts::MQTT_KEEP_ALIVE_SECS));
        if !username.is_empty() {
            mqttoptions.set_credentials(username, password);
        }
        if let Some(tls) = &config.tls {
            mqttoptions.set_transport(tls_transport(tls)?);
        }

        let (client, mut event_loop) = AsyncClient::new(mqttoptions, 10);

        // Fail early if parameters are invalid.
        if let Err(err) = event_loop.poll().await {
            warn!("Initial connection to MQTT failed. Check connection parameters");
            anyhow::bail!("Unable to contact MQTT broker {}:{}: {}", host, port, err);
        }
        info!("Connected to MQTT broker {}:{}", host, port);

        Ok(Initiator {
            client,
            event_loop,
            reconnect_delay: Duration::from_secs(config.reconnect_delay_secs),
        })
    }

    fn subscribe_all(client: &AsyncClient, topics: &[String]) {
        for topic in topics {
            if let Err(err) = client.try_subscribe(topic, QoS::AtMostOnce) {
                error!("Unable to subscribe to a topic {}: {:?}", topic, err);
            }
        }
    }

    async fn receiver(
        mut event_loop: EventLoop,
        client: AsyncClient,
        topics: Vec<String>,
        reconnect_delay: Duration,
        queue: mpsc::Sender<Incoming>,
    ) {
        loop {
            let notification = event_loop.poll().await;
            let result = match notification {
                Ok(Event::Incoming(Packet::Publish(msg))) => {
                    info!("RX message to {} with payload '{:?}'", msg.topic, msg.payload);
                    let message = Incoming::Control {
                        topic: msg.topic,
                        payload: msg.payload.to_vec(),
                    };
                    queue.send(message).await
                }
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    // Clean session: subscriptions are gone after a reconnect.
                    info!("Reconnected to MQTT ({:?}), subscribing again", ack.code);
                    Self::subscribe_all(&client, &topics);
                    continue;
                }
                Ok(Event::Outgoing(_))
                | Ok(Event::Incoming(Packet::PingResp))
                | Ok(Event::Incoming(Packet::SubAck(_)))
                | Ok(Event::Incoming(Packet::PubAck(_))) => {
                    // Silence common messages
                    continue;
                }
                Ok(other) => {
                    debug!("Received other message = {:?}", other);
                    continue;
                }
                Err(err) => {
                    warn!(
                        "MQTT connection error: {}. Retrying in {:?}",
                        err, reconnect_delay
                    );
                    tokio::time::sleep(reconnect_delay).await;
                    continue;
                }
            };
            if result.is_err() {
                error!("Error while sending received message to queue. Quitting loop");
                return;
            }
        }
    }

    /// Subscribe to `topics` and start pumping the event loop.
    pub async fn start(self, topics: Vec<String>) -> anyhow::Result<Broker> {
        for topic in &topics {
            self.client.subscribe(topic, QoS::AtMostOnce).await?;
            info!("Subscribed to {}", topic);
        }

        let (in_sender, in_receiver) = mpsc::channel::<Incoming>(10);
        // Detached; `Broker::recv` returns None once it stops.
        task::spawn(Self::receiver(
            self.event_loop,
            self.client,
            topics,
            self.reconnect_delay,
            in_sender,
        ));

        Ok(Broker {
            incoming: in_receiver,
        })
    }

    /// Publish a single message and wait for the broker to acknowledge it.
    pub async fn publish_once(mut self, topic: &str, payload: &str) -> anyhow::Result<()> {
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload.as_bytes().to_vec())
            .await?;

        let event_loop = &mut self.event_loop;
        let acked = async {
            loop {
                if let Event::Incoming(Packet::PubAck(_)) = event_loop.poll().await? {
                    return anyhow::Ok(());
                }
            }
        };
        match tokio::time::timeout(PUBLISH_TIMEOUT, acked).await {
            Ok(result) => result?,
            Err(_) => anyhow::bail!("Broker did not acknowledge publish to {}", topic),
        }
        info!("Published '{}' to {}", payload, topic);

        self.client.disconnect().await?;
        // Flush the disconnect request.
        if let Err(err) = self.event_loop.poll().await {
            debug!("Error while flushing disconnect: {}", err);
        }
        Ok(())
    }
}

impl Broker {
    /// Receive incoming message (from MQTT). None means the reading loop
    /// finished.
    pub async fn recv(&mut self) -> Option<Incoming> {
        self.incoming.recv().await
    }
}
