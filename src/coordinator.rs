use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{TimeZone, Utc};
use rumqttc::{AsyncClient, QoS};
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

use crate::config::Config;
use crate::decoder::decode_pulse;
use crate::forecast::ForecastEngine;
use crate::models::state::{AttachState, PublishedState, Snapshot};
use crate::models::wire::StateMessage;
use crate::power::PowerEstimator;
use crate::restore::{restore, save};
use crate::util::round3;

/// Events the coordinator serializes onto its single-writer execution
/// context (spec §4.7/§5). MQTT callbacks, the periodic tick, and detach all
/// funnel through this channel so state mutation is never concurrent.
#[derive(Debug)]
pub enum CoordinatorEvent {
    Pulse { payload: Vec<u8> },
    ForecastTick,
    SubscribeResult(bool),
    Detach { done: tokio::sync::oneshot::Sender<()> },
}

#[derive(Clone)]
pub struct CoordinatorHandle {
    sender: mpsc::UnboundedSender<CoordinatorEvent>,
}

impl CoordinatorHandle {
    /// Creates the event channel up front so the MQTT transport task (which
    /// needs a handle) and the coordinator task (which needs the matching
    /// receiver) can both be constructed without a chicken-and-egg ordering
    /// problem in `main`.
    pub fn channel() -> (CoordinatorHandle, mpsc::UnboundedReceiver<CoordinatorEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (CoordinatorHandle { sender }, receiver)
    }

    pub fn send(&self, event: CoordinatorEvent) -> Result<(), mpsc::error::SendError<CoordinatorEvent>> {
        self.sender.send(event)
    }

    pub fn notify_subscribed(&self, ok: bool) {
        let _ = self.sender.send(CoordinatorEvent::SubscribeResult(ok));
    }

    pub async fn detach(&self) {
        let (tx, rx) = tokio::sync::oneshot::channel();
        if self.sender.send(CoordinatorEvent::Detach { done: tx }).is_ok() {
            let _ = rx.await;
        }
    }
}

fn wall_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Single-writer state machine owning all runtime state (spec §3, §4.7).
/// Constructed once per session, seeded by the restorer, and driven
/// exclusively through `CoordinatorEvent`s received on its private channel.
pub struct Coordinator {
    config: Config,
    mqtt_client: AsyncClient,
    attach_state: AttachState,
    total_impulses: u64,
    power: PowerEstimator,
    forecast: ForecastEngine,
    published_tx: watch::Sender<PublishedState>,
}

impl Coordinator {
    /// Seeds state via the restorer (spec §4.5) and spawns the coordinator
    /// task reading from `receiver` (obtained from `CoordinatorHandle::channel`).
    /// Returns a watch receiver entities/HTTP read snapshots from.
    pub fn spawn(
        config: Config,
        mqtt_client: AsyncClient,
        mut receiver: mpsc::UnboundedReceiver<CoordinatorEvent>,
    ) -> watch::Receiver<PublishedState> {
        let restored = restore(&config);
        let power = PowerEstimator::new(config.max_power_kw, config.power_average_window);
        let forecast = ForecastEngine::new(
            restored.kwh_at_month_start_impulses,
            restored.last_month_checked,
            restored.month_start_timestamp,
        );

        let initial_state = PublishedState {
            attach_state_label: AttachState::Unattached.label(),
            total_impulses: restored.total_impulses,
            kwh: round3(restored.total_impulses as f64 / config.impulses_per_kwh as f64),
            power_kw: 0.0,
            forecast_kwh: 0,
            kwh_at_month_start_impulses: restored.kwh_at_month_start_impulses,
            last_month_checked: restored.last_month_checked,
            month_start_timestamp: restored.month_start_timestamp,
            last_impulse_time: None,
        };
        let (published_tx, published_rx) = watch::channel(initial_state);

        let mut coordinator = Coordinator {
            config,
            mqtt_client,
            attach_state: AttachState::AttachedNotSubscribed,
            total_impulses: restored.total_impulses,
            power,
            forecast,
            published_tx,
        };

        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                let should_stop = coordinator.handle_event(event).await;
                if should_stop {
                    break;
                }
            }
        });

        published_rx
    }

    /// Returns `true` once a `Detach` event has fully drained (tick
    /// cancellation and "offline" publish both complete), signalling the
    /// owning task to stop polling for further events.
    async fn handle_event(&mut self, event: CoordinatorEvent) -> bool {
        match event {
            CoordinatorEvent::Pulse { payload } => {
                self.handle_pulse(&payload).await;
                false
            }
            CoordinatorEvent::ForecastTick => {
                if self.attach_state.is_available() {
                    if let Some(last) = self.power.last_impulse_time() {
                        self.forecast.recompute(last, self.total_impulses, self.config.impulses_per_kwh);
                        self.publish_snapshot();
                    }
                }
                false
            }
            CoordinatorEvent::SubscribeResult(ok) => {
                self.attach_state = if ok {
                    AttachState::AttachedSubscribed
                } else {
                    AttachState::AttachedNotSubscribed
                };
                if ok {
                    self.publish_presence("online").await;
                }
                self.publish_snapshot();
                false
            }
            CoordinatorEvent::Detach { done } => {
                self.attach_state = AttachState::Detaching;
                self.publish_presence("offline").await;
                let _ = self.mqtt_client.unsubscribe(&self.config.subscribe_topic).await;
                self.publish_snapshot();
                let _ = done.send(());
                true
            }
        }
    }

    async fn handle_pulse(&mut self, payload: &[u8]) {
        let decoded = match decode_pulse(payload, &self.config.target_mac) {
            Some(d) => d,
            None => return,
        };

        // Dedup is by MAC match only; repeated `ts` values still count (spec §9).
        self.total_impulses += 1;
        self.power.on_pulse(decoded.t, self.config.impulses_per_kwh);
        self.forecast.recompute(decoded.t, self.total_impulses, self.config.impulses_per_kwh);

        self.publish_snapshot();
        self.publish_state_message().await;

        let snapshot = Snapshot {
            kwh: round3(self.total_impulses as f64 / self.config.impulses_per_kwh as f64),
            latest_forecast_kwh: self.forecast.latest_forecast_kwh,
            kwh_at_month_start_impulses: self.forecast.kwh_at_month_start_impulses,
            last_month_checked: self.forecast.last_month_checked,
            month_start_timestamp: self.forecast.month_start_timestamp,
        };
        save(&self.config.snapshot_path, &snapshot).await;
    }

    fn publish_snapshot(&self) {
        let now = wall_now();
        let state = PublishedState {
            attach_state_label: self.attach_state.label(),
            total_impulses: self.total_impulses,
            kwh: round3(self.total_impulses as f64 / self.config.impulses_per_kwh as f64),
            power_kw: self.power.reported_power_kw(now, self.config.power_timeout_seconds),
            forecast_kwh: self.forecast.latest_forecast_kwh,
            kwh_at_month_start_impulses: self.forecast.kwh_at_month_start_impulses,
            last_month_checked: self.forecast.last_month_checked,
            month_start_timestamp: self.forecast.month_start_timestamp,
            last_impulse_time: self.power.last_impulse_time(),
        };
        let _ = self.published_tx.send(state);
    }

    async fn publish_state_message(&self) {
        let now = wall_now();
        let message = StateMessage {
            timestamp: Utc
                .timestamp_opt(now as i64, 0)
                .single()
                .unwrap_or_else(Utc::now)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            impulses: self.total_impulses,
            kwh: round3(self.total_impulses as f64 / self.config.impulses_per_kwh as f64),
            power_kw: self.power.reported_power_kw(now, self.config.power_timeout_seconds),
            forecast_kwh: self.forecast.latest_forecast_kwh,
        };

        let payload = match serde_json::to_vec(&message) {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "failed to serialize state message");
                return;
            }
        };

        if let Err(e) = self
            .mqtt_client
            .publish(self.config.state_topic(), QoS::AtLeastOnce, true, payload)
            .await
        {
            // Publish failures are logged but never roll back the already-counted pulse (spec §7).
            error!(error = %e, "failed to publish state message");
        }
    }

    async fn publish_presence(&self, payload: &'static str) {
        if let Err(e) = self
            .mqtt_client
            .publish(self.config.status_topic(), QoS::AtLeastOnce, true, payload.as_bytes())
            .await
        {
            error!(error = %e, payload, "failed to publish presence");
        } else {
            info!(payload, "presence published");
        }
    }
}
