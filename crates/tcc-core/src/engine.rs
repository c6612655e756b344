// ── Sync engine ──
//
// Drives the cloud client on a timer and on inbound commands, persists
// every polled snapshot, and forwards only real changes to the bridge.
// Each tick and each command runs inside its own tracing span.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use tcc_api::bridge::CommandStream;
use tcc_api::{DeviceId, DeviceState, SystemMode, TemperatureUnit};

use crate::convert::{protocol_to_native, to_protocol_state};
use crate::echo::GenerationTracker;
use crate::error::{CoreError, FailureKind};
use crate::model::{
    CommandAction, CommandOutcome, EngineStatus, EventSource, EventType, InboundCommand,
    LastError, PollReport, SetpointKind,
};
use crate::ports::{CloudApi, ProtocolSink, StateStore};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(600);
const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A validated change ready for submission.
#[derive(Debug, Clone, Copy)]
enum Change {
    Setpoint(SetpointKind, f64),
    Mode(SystemMode),
}

#[derive(Debug, Default)]
struct Health {
    last_poll: Option<DateTime<Utc>>,
    last_error: Option<LastError>,
}

/// Bidirectional sync between the cloud portal, the state store and the
/// protocol bridge.
///
/// Shared behind an `Arc`: the poll loop and command handlers call into
/// the same engine concurrently. Writes to the store are not serialized
/// between them, so the later write for a device wins.
pub struct SyncEngine {
    cloud: Arc<dyn CloudApi>,
    store: Arc<dyn StateStore>,
    sink: Arc<dyn ProtocolSink>,
    generations: GenerationTracker,
    poll_interval: Duration,
    health: Mutex<Health>,
    ticks: AtomicU64,
}

impl SyncEngine {
    pub fn new(
        cloud: Arc<dyn CloudApi>,
        store: Arc<dyn StateStore>,
        sink: Arc<dyn ProtocolSink>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            cloud,
            store,
            sink,
            generations: GenerationTracker::new(),
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
            health: Mutex::new(Health::default()),
            ticks: AtomicU64::new(0),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn generations(&self) -> &GenerationTracker {
        &self.generations
    }

    fn health(&self) -> MutexGuard<'_, Health> {
        self.health.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> EngineStatus {
        let (last_poll, last_error) = {
            let health = self.health();
            (health.last_poll, health.last_error.clone())
        };
        EngineStatus {
            authenticated: self.cloud.is_authenticated(),
            last_poll,
            last_error,
            device_count: self.store.all_states().map_or(0, |states| states.len()),
        }
    }

    // ── Poll loop ───────────────────────────────────────────────────

    /// Poll immediately, then every `poll_interval`, until `cancel` fires.
    /// A failed tick is logged and the loop carries on; a tick in flight
    /// when `cancel` fires is dropped.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(interval_secs = self.poll_interval.as_secs(), "poll loop starting");
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                result = self.poll_once() => {
                    if let Err(e) = result {
                        debug!(error = %e, "poll tick abandoned");
                    }
                }
            }
        }

        info!("poll loop stopped");
    }

    /// One poll tick: log in if needed, fetch the device list, reconcile
    /// each device with the store.
    pub async fn poll_once(&self) -> Result<PollReport, CoreError> {
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        self.poll_tick().instrument(info_span!("poll_tick", tick)).await
    }

    async fn poll_tick(&self) -> Result<PollReport, CoreError> {
        if !self.cloud.is_authenticated() {
            if let Err(e) = self.cloud.login().await {
                let err = CoreError::from_login(e);
                self.report_login_failure(&err);
                return Err(err);
            }
        }

        let devices = match self.cloud.get_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                let err = CoreError::from(e);
                self.report_poll_failure(&err);
                return Err(err);
            }
        };
        self.health().last_poll = Some(Utc::now());

        let mut forwarded = 0;
        for device in &devices {
            if self.reconcile(device).await {
                forwarded += 1;
            }
        }
        debug!(devices = devices.len(), forwarded, "poll complete");
        Ok(PollReport { devices, forwarded })
    }

    /// Persist `device` and push it to the bridge if a watched field moved.
    /// Returns whether a push went out.
    async fn reconcile(&self, device: &DeviceState) -> bool {
        let id = device.device_id;
        let previous = self.store.get_state(id).unwrap_or_else(|e| {
            warn!(device_id = %id, error = %e, "cannot read last snapshot");
            None
        });
        let changed = previous.as_ref().is_none_or(|p| device.differs_from(p));

        if let Err(e) = self.store.save_state(device) {
            error!(device_id = %id, error = %e, "failed to save thermostat state");
        }
        if !changed {
            debug!(device_id = %id, "state unchanged, not forwarding");
            return false;
        }

        info!(device_id = %id, "{}", describe(device));
        self.record(
            EventSource::Cloud,
            EventType::StateChange,
            &format!("State changed: {}", describe(device)),
            Some(state_details(device)),
        );
        self.push(device).await.is_some()
    }

    /// Push one device to the bridge under a fresh generation. Failures
    /// are logged and otherwise ignored.
    async fn push(&self, device: &DeviceState) -> Option<u64> {
        let generation = self.generations.next();
        let state = to_protocol_state(device, generation);
        if let Err(e) = self.sink.update_state(&state).await {
            debug!(device_id = %device.device_id, generation, error = %e, "bridge update failed");
            return None;
        }

        let mut details = state_details(device);
        details["generation"] = json!(generation);
        self.record(
            EventSource::Protocol,
            EventType::StateChange,
            &format!("Sent to bridge: {}", describe(device)),
            Some(details),
        );
        Some(generation)
    }

    fn report_login_failure(&self, err: &CoreError) {
        let kind = err.failure_kind();
        let message = match kind {
            FailureKind::RateLimited => {
                warn!(error = %err, %kind, "login rate limited");
                "Login rate limited by the cloud service".to_owned()
            }
            FailureKind::Network => {
                error!(error = %err, %kind, "cloud connection failed");
                "Connection to the cloud service failed".to_owned()
            }
            FailureKind::Credentials | FailureKind::Other => {
                warn!(error = %err, %kind, "login failed");
                format!("Login failed: {err}")
            }
        };
        self.record_failure(EventSource::Cloud, &message, err, None);
    }

    fn report_poll_failure(&self, err: &CoreError) {
        let kind = err.failure_kind();
        let message = if kind == FailureKind::RateLimited {
            warn!(error = %err, %kind, "poll rate limited");
            "Rate limited by the cloud service".to_owned()
        } else {
            error!(error = %err, %kind, "poll failed");
            format!("Poll failed: {err}")
        };
        self.record_failure(EventSource::Cloud, &message, err, None);
    }

    // ── Commands ────────────────────────────────────────────────────

    /// Forward commands from the bridge's event stream until `cancel`
    /// fires or the stream ends.
    pub async fn serve_commands(&self, mut commands: CommandStream, cancel: CancellationToken) {
        loop {
            let command = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
            };
            if let Err(e) = self
                .handle_command(command.into(), EventSource::Ecosystem)
                .await
            {
                debug!(error = %e, "bridge command failed");
            }
        }
        commands.shutdown();
        debug!("command loop stopped");
    }

    /// Apply a command from the bridge or another caller.
    ///
    /// Setpoint values are Celsius. Commands carrying a generation this
    /// engine issued are echoes of its own pushes and are dropped.
    pub async fn handle_command(
        &self,
        command: InboundCommand,
        source: EventSource,
    ) -> Result<CommandOutcome, CoreError> {
        let span = info_span!("command", action = %command.action, %source);
        self.dispatch(command, source).instrument(span).await
    }

    async fn dispatch(
        &self,
        command: InboundCommand,
        source: EventSource,
    ) -> Result<CommandOutcome, CoreError> {
        let InboundCommand {
            action,
            value,
            device_id,
            generation,
        } = command;

        if self.generations.is_echo(generation) {
            debug!(?generation, "dropping echo of our own push");
            return Ok(CommandOutcome::Suppressed);
        }

        let Ok(parsed) = action.parse::<CommandAction>() else {
            warn!("unrecognized command");
            self.record(
                source,
                EventType::Error,
                &format!("Unknown command: {action}"),
                Some(json!({ "action": action, "value": value })),
            );
            return Err(CoreError::UnrecognizedCommand { action });
        };

        let target = self.resolve_device(device_id)?;
        let previous = self.store.get_state(target)?;
        let change = match parsed {
            CommandAction::SetSystemMode => Change::Mode(parse_mode(&action, &value)?),
            CommandAction::SetHeatingSetpoint => Change::Setpoint(
                SetpointKind::Heat,
                native_setpoint(&action, &value, previous.as_ref())?,
            ),
            CommandAction::SetCoolingSetpoint => Change::Setpoint(
                SetpointKind::Cool,
                native_setpoint(&action, &value, previous.as_ref())?,
            ),
        };

        self.apply(target, change, previous, source).await
    }

    /// Change a setpoint from an interactive caller. `value` is in the
    /// device's display unit. `None` targets the first known device.
    pub async fn set_setpoint(
        &self,
        device: Option<DeviceId>,
        kind: SetpointKind,
        value: f64,
    ) -> Result<CommandOutcome, CoreError> {
        let action = kind.action();
        let span = info_span!("command", %action, source = %EventSource::User);
        async {
            if !value.is_finite() {
                return Err(CoreError::InvalidCommandValue {
                    action: action.to_string(),
                    reason: format!("{value} is not a temperature"),
                });
            }
            let target = self.resolve_device(device)?;
            let previous = self.store.get_state(target)?;
            self.apply(target, Change::Setpoint(kind, value), previous, EventSource::User)
                .await
        }
        .instrument(span)
        .await
    }

    /// Change the system mode from an interactive caller.
    pub async fn set_mode(
        &self,
        device: Option<DeviceId>,
        mode: SystemMode,
    ) -> Result<CommandOutcome, CoreError> {
        let span = info_span!(
            "command",
            action = %CommandAction::SetSystemMode,
            source = %EventSource::User
        );
        async {
            if mode == SystemMode::Unknown {
                return Err(CoreError::UnsupportedMode { mode });
            }
            let target = self.resolve_device(device)?;
            let previous = self.store.get_state(target)?;
            self.apply(target, Change::Mode(mode), previous, EventSource::User)
                .await
        }
        .instrument(span)
        .await
    }

    /// Replace the cloud credentials and prove them with a fresh login and
    /// a live device-list fetch.
    ///
    /// The pair stays installed on the shared cloud client whether or not
    /// the test passes. After a failed test the poll loop keeps using the
    /// rejected credentials until the caller sets working ones again.
    pub async fn test_credentials(
        &self,
        username: String,
        password: SecretString,
    ) -> Result<Vec<DeviceState>, CoreError> {
        let span = info_span!("command", action = "testCredentials", source = %EventSource::User);
        async move {
            self.record(
                EventSource::User,
                EventType::Connection,
                "Testing cloud connection",
                Some(json!({ "username": username })),
            );
            self.cloud.set_credentials(username.clone(), password);

            match self.cloud.test_connection().await {
                Ok(devices) => {
                    info!(devices = devices.len(), "credentials verified");
                    self.record(
                        EventSource::Cloud,
                        EventType::Connection,
                        "Connection test successful",
                        Some(json!({ "username": username, "devices": devices.len() })),
                    );
                    Ok(devices)
                }
                Err(e) => {
                    let err = CoreError::from_login(e);
                    warn!(error = %err, kind = %err.failure_kind(), "connection test failed");
                    self.record_failure(
                        EventSource::Cloud,
                        "Connection test failed",
                        &err,
                        Some(json!({ "username": username })),
                    );
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    fn resolve_device(&self, explicit: Option<DeviceId>) -> Result<DeviceId, CoreError> {
        if let Some(id) = explicit {
            return Ok(id);
        }
        self.store
            .all_states()?
            .first()
            .map(|state| state.device_id)
            .ok_or(CoreError::NoDevices)
    }

    /// Submit `change`; on success log it, refetch the device, persist the
    /// fresh snapshot and push it. On failure nothing is persisted.
    async fn apply(
        &self,
        id: DeviceId,
        change: Change,
        previous: Option<DeviceState>,
        source: EventSource,
    ) -> Result<CommandOutcome, CoreError> {
        let submitted = match change {
            Change::Setpoint(SetpointKind::Heat, value) => {
                self.cloud.set_heat_setpoint(id, value).await
            }
            Change::Setpoint(SetpointKind::Cool, value) => {
                self.cloud.set_cool_setpoint(id, value).await
            }
            Change::Mode(mode) => self.cloud.set_system_mode(id, mode).await,
        };
        if let Err(e) = submitted {
            let err = CoreError::from(e);
            warn!(device_id = %id, error = %err, kind = %err.failure_kind(), "control change failed");
            self.record_failure(
                EventSource::Cloud,
                &format!("Failed to apply change: {err}"),
                &err,
                Some(json!({ "device_id": id })),
            );
            return Err(err);
        }

        self.log_change(id, change, previous.as_ref(), source);
        let device = self.refetch(id, previous.as_ref()).await;
        Ok(CommandOutcome::Applied { device })
    }

    fn log_change(
        &self,
        id: DeviceId,
        change: Change,
        previous: Option<&DeviceState>,
        source: EventSource,
    ) {
        match change {
            Change::Mode(mode) => {
                let old = previous.map_or(SystemMode::Unknown, |p| p.system_mode);
                let message = format!("Mode changed from {old} to {mode}");
                info!(device_id = %id, "{message}");
                self.record(
                    source,
                    EventType::ModeChange,
                    &message,
                    Some(json!({ "device_id": id, "old_mode": old, "new_mode": mode })),
                );
            }
            Change::Setpoint(kind, value) => {
                let unit = previous.map_or(TemperatureUnit::Fahrenheit, |p| p.display_units);
                let old = previous.map(|p| kind.read(p));
                let message = match old {
                    Some(old) => format!(
                        "{} setpoint changed from {old:.1}°{unit} to {value:.1}°{unit}",
                        kind.label()
                    ),
                    None => format!("{} setpoint set to {value:.1}°{unit}", kind.label()),
                };
                info!(device_id = %id, "{message}");
                self.record(
                    source,
                    EventType::TempChange,
                    &message,
                    Some(json!({
                        "device_id": id,
                        "type": kind,
                        "old_setpoint": old,
                        "new_setpoint": value,
                    })),
                );
            }
        }
    }

    async fn refetch(&self, id: DeviceId, previous: Option<&DeviceState>) -> Option<DeviceState> {
        let mut device = match self.cloud.get_device_data(id).await {
            Ok(Some(device)) => device,
            Ok(None) => {
                debug!(device_id = %id, "refetch returned no detail data");
                return None;
            }
            Err(e) => {
                warn!(device_id = %id, error = %e, "refetch after control change failed");
                return None;
            }
        };
        if device.name.is_empty() {
            if let Some(previous) = previous {
                device.name.clone_from(&previous.name);
            }
        }

        if let Err(e) = self.store.save_state(&device) {
            error!(device_id = %id, error = %e, "failed to save refreshed state");
        }
        self.push(&device).await;
        Some(device)
    }

    // ── Event log ───────────────────────────────────────────────────

    fn record(
        &self,
        source: EventSource,
        event_type: EventType,
        message: &str,
        details: Option<Value>,
    ) {
        if let Err(e) = self.store.log_event(source, event_type, message, details) {
            warn!(error = %e, "failed to record event");
        }
    }

    fn record_failure(
        &self,
        source: EventSource,
        message: &str,
        err: &CoreError,
        extra: Option<Value>,
    ) {
        let kind = err.failure_kind();
        let mut details = json!({ "kind": kind, "error": err.to_string() });
        if let (Some(Value::Object(extra)), Some(map)) = (extra, details.as_object_mut()) {
            map.extend(extra);
        }
        self.record(source, EventType::Error, message, Some(details));

        self.health().last_error = Some(LastError {
            message: err.to_string(),
            kind,
            at: Utc::now(),
        });
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn describe(device: &DeviceState) -> String {
    let unit = device.display_units;
    format!(
        "temp={:.1}°{unit}, heat={:.1}°{unit}, cool={:.1}°{unit}, mode={}",
        device.current_temp, device.heat_setpoint, device.cool_setpoint, device.system_mode
    )
}

fn state_details(device: &DeviceState) -> Value {
    json!({
        "device_id": device.device_id,
        "current_temp": device.current_temp,
        "heat_setpoint": device.heat_setpoint,
        "cool_setpoint": device.cool_setpoint,
        "system_mode": device.system_mode,
        "humidity": device.humidity,
    })
}

fn parse_mode(action: &str, value: &Value) -> Result<SystemMode, CoreError> {
    let Some(raw) = value.as_str() else {
        return Err(CoreError::InvalidCommandValue {
            action: action.to_owned(),
            reason: format!("expected a mode name, got {value}"),
        });
    };
    let mode = raw
        .parse::<SystemMode>()
        .map_err(|_| CoreError::InvalidCommandValue {
            action: action.to_owned(),
            reason: format!("unknown mode '{raw}'"),
        })?;
    if mode == SystemMode::Unknown {
        return Err(CoreError::UnsupportedMode { mode });
    }
    Ok(mode)
}

/// Celsius value from the bridge, expressed in the device's display unit.
fn native_setpoint(
    action: &str,
    value: &Value,
    previous: Option<&DeviceState>,
) -> Result<f64, CoreError> {
    let celsius = value
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| CoreError::InvalidCommandValue {
            action: action.to_owned(),
            reason: format!("expected a temperature, got {value}"),
        })?;
    let unit = previous.map_or(TemperatureUnit::Fahrenheit, |p| p.display_units);
    Ok(protocol_to_native(celsius, unit))
}
