use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::coordinator::{CoordinatorEvent, CoordinatorHandle};

/// Builds the MQTT connection, registers a broker-side last-will on the
/// presence topic (spec §4.6/§9 — "both last-will and explicit offline are
/// required"), subscribes to the inbound pulse topic, and forwards matching
/// publishes to the coordinator as `CoordinatorEvent::Pulse`.
///
/// Returns the `AsyncClient` handle so the coordinator can publish state,
/// presence, and (un)subscribe during its own attach/detach sequence — this
/// mirrors the teacher's `mqtt_service::run_publisher`, generalized to also
/// subscribe and to split transport (this function) from state ownership
/// (the coordinator).
pub fn connect(config: &Config, handle: CoordinatorHandle) -> AsyncClient {
    let client_id = config.client_id_or_default();
    let mut opts = MqttOptions::new(&client_id, &config.broker_host, config.broker_port);
    opts.set_keep_alive(Duration::from_secs(30));

    if let (Some(user), Some(pass)) = (&config.username, &config.password) {
        opts.set_credentials(user, pass);
    }

    opts.set_last_will(rumqttc::LastWill::new(
        config.status_topic(),
        "offline",
        QoS::AtLeastOnce,
        true,
    ));

    let (client, mut eventloop) = AsyncClient::new(opts, 64);

    let subscribe_topic = config.subscribe_topic.clone();
    let subscribe_client = client.clone();

    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("mqtt connected, subscribing to {}", subscribe_topic);
                    if let Err(e) = subscribe_client
                        .subscribe(&subscribe_topic, QoS::AtLeastOnce)
                        .await
                    {
                        error!(error = %e, "failed to send subscribe request");
                        handle.notify_subscribed(false);
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(_))) => {
                    info!("subscription acknowledged");
                    handle.notify_subscribed(true);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if publish.topic == subscribe_topic {
                        let _ = handle.send(CoordinatorEvent::Pulse {
                            payload: publish.payload.to_vec(),
                        });
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "mqtt event loop error, reconnecting");
                    handle.notify_subscribed(false);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    });

    client
}
