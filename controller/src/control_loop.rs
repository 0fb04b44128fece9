use std::{path::Path, time::Duration};

use chrono::{DateTime, FixedOffset};
use heatd_common::{
    feed::{read_occupancy, read_sensor_feed},
    Decision, EngineAction, FeedPaths, ReadingLimits, Relay, RelayError, SensorReading,
    SourceTag, ThermostatController,
};
use tracing::{debug, error, info, warn};

use crate::{
    clock::Clock,
    publisher::StatePublisher,
    shutdown::ShutdownSignal,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    ShuttingDown,
    Stopped,
}

/// Owns the controller and the relay for the life of the process. Every
/// relay command goes through `execute_actions`.
pub struct ControlLoop<R: Relay, C: Clock> {
    controller: ThermostatController,
    relay: R,
    clock: C,
    paths: FeedPaths,
    publisher: StatePublisher,
    state: LoopState,
}

impl<R: Relay, C: Clock> ControlLoop<R, C> {
    pub fn new(controller: ThermostatController, relay: R, clock: C, paths: FeedPaths) -> Self {
        let publisher = StatePublisher::new(paths.state.clone());
        Self {
            controller,
            relay,
            clock,
            paths,
            publisher,
            state: LoopState::Running,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    #[cfg(test)]
    pub fn controller(&self) -> &ThermostatController {
        &self.controller
    }

    #[cfg(test)]
    pub fn relay(&self) -> &R {
        &self.relay
    }

    /// Arms the relay with one OFF pulse and waits out the settle delay.
    pub async fn start(&mut self) -> Result<(), RelayError> {
        self.relay.set(false)?;
        info!("relay armed off");
        tokio::time::sleep(Duration::from_millis(self.controller.config.settle_delay_ms)).await;
        Ok(())
    }

    /// Ticks until shutdown is requested, then shuts down.
    pub async fn run(&mut self, mut shutdown: ShutdownSignal) {
        let interval = Duration::from_millis(self.controller.config.loop_interval_ms);

        while !shutdown.is_triggered() {
            self.tick().await;
            if shutdown.is_triggered() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.triggered() => {}
            }
        }

        self.shutdown().await;
    }

    /// Reads every feed, evaluates, drives the relay and publishes status.
    /// Read and publish failures never end the loop.
    pub async fn tick(&mut self) -> Decision {
        let now = self.clock.now();
        let limits = self.controller.config.reading_limits();

        let indoor = read_reading(&self.paths.indoor, SourceTag::Indoor, &now, &limits);
        let outdoor = read_reading(&self.paths.outdoor, SourceTag::Outdoor, &now, &limits);
        let home = match read_occupancy(&self.paths.occupancy) {
            Ok(occupancy) => Some(occupancy.home),
            Err(err) => {
                warn!(kind = err.kind(), "occupancy rejected: {err}");
                None
            }
        };

        let decision = self
            .controller
            .evaluate(indoor.as_ref(), outdoor.as_ref(), home, &now);

        if decision.transitioned() {
            info!(
                heating_on = decision.heating_on,
                indoor_f = ?self.controller.indoor_temp_f(),
                setpoint_f = self.controller.settings().setpoint_f,
                reason = decision.reason.as_str(),
                "heating transition"
            );
        } else if decision.reason.is_fail_safe() {
            debug!(reason = decision.reason.as_str(), "heating held off");
        }

        self.execute_actions(&decision.actions).await;
        self.reconcile_relay().await;
        self.publish(true);
        decision
    }

    /// Forces heating off, publishes a Stopped record, releases the relay and
    /// drains. Only the first call does anything.
    pub async fn shutdown(&mut self) {
        if self.state != LoopState::Running {
            return;
        }
        self.state = LoopState::ShuttingDown;
        info!("shutting down");

        let actions = self.controller.turn_off();
        self.execute_actions(&actions).await;
        self.reconcile_relay().await;
        self.publish(false);

        if let Err(err) = self.relay.release() {
            warn!("relay release failed: {:#}", anyhow::Error::new(err));
        }

        tokio::time::sleep(Duration::from_millis(
            self.controller.config.shutdown_drain_ms,
        ))
        .await;
        self.state = LoopState::Stopped;
        info!("stopped");
    }

    async fn execute_actions(&mut self, actions: &[EngineAction]) {
        for action in actions {
            let on = match action {
                EngineAction::Settle(ms) => {
                    tokio::time::sleep(Duration::from_millis(*ms)).await;
                    continue;
                }
                EngineAction::HeatOn => true,
                EngineAction::HeatOff => false,
            };

            if let Err(err) = self.relay.set(on) {
                error!(on, "relay command failed: {:#}", anyhow::Error::new(err));
                self.controller.relay_faulted();
                if let Err(err) = self.relay.set(false) {
                    error!("best-effort relay off failed: {:#}", anyhow::Error::new(err));
                }
                return;
            }
        }
    }

    /// A failed OFF leaves the relay reporting on while the controller is
    /// off. Retry it once per tick until the relay drops out.
    async fn reconcile_relay(&mut self) {
        if self.controller.is_heating_on() || !self.relay.is_on() {
            return;
        }
        warn!("relay still energized after heating off, retrying");
        match self.relay.set(false) {
            Ok(()) => {
                tokio::time::sleep(Duration::from_millis(self.controller.config.settle_delay_ms))
                    .await
            }
            Err(err) => error!("relay off retry failed: {:#}", anyhow::Error::new(err)),
        }
    }

    fn publish(&self, daemon_running: bool) {
        let mut status = self.controller.status(daemon_running, self.clock.now());
        // an energized relay is heating whatever the controller decided
        status.heating_on |= self.relay.is_on();
        if let Err(err) = self.publisher.publish(&status) {
            warn!("status publish failed: {:#}", anyhow::Error::new(err));
        }
    }
}

fn read_reading(
    path: &Path,
    source: SourceTag,
    now: &DateTime<FixedOffset>,
    limits: &ReadingLimits,
) -> Option<SensorReading> {
    match read_sensor_feed(path, source, now, limits) {
        Ok(reading) => Some(reading),
        Err(err) => {
            warn!(source = source.as_str(), kind = err.kind(), "reading rejected: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::TimeZone;
    use heatd_common::{
        feed::{occupancy_line, sensor_line, write_line_atomic},
        ControlSettings, ControllerStatus, DecisionReason, MemoryRelay, OccupancyState,
        Station, ThermostatConfig,
    };
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{clock::FixedClock, shutdown};

    struct Fixture {
        dir: PathBuf,
        paths: FeedPaths,
        now: DateTime<FixedOffset>,
    }

    impl Fixture {
        fn new(name: &str) -> Self {
            let dir = std::env::temp_dir()
                .join(format!("heatd_loop_{name}_{}", std::process::id()));
            let _ = std::fs::remove_dir_all(&dir);
            std::fs::create_dir_all(&dir).unwrap();
            let paths = FeedPaths {
                indoor: dir.join("main.txt"),
                outdoor: dir.join("mdw.txt"),
                occupancy: dir.join("hk_switch.txt"),
                state: dir.join("heater_state.txt"),
            };
            let now = FixedOffset::west_opt(5 * 3600)
                .unwrap()
                .with_ymd_and_hms(2026, 10, 18, 10, 0, 0)
                .unwrap();
            Self { dir, paths, now }
        }

        fn indoor(&self, value_f: f32, observed_at: DateTime<FixedOffset>) {
            let line = sensor_line(value_f, &observed_at, Some(Station::Main));
            write_line_atomic(&self.paths.indoor, &line).unwrap();
        }

        fn outdoor(&self, value_f: f32) {
            let line = sensor_line(value_f, &self.now, Some(Station::Mdw));
            write_line_atomic(&self.paths.outdoor, &line).unwrap();
        }

        fn home(&self, home: bool) {
            let line = occupancy_line(OccupancyState { home }, &self.now);
            write_line_atomic(&self.paths.occupancy, &line).unwrap();
        }

        fn published(&self) -> ControllerStatus {
            std::fs::read_to_string(&self.paths.state)
                .unwrap()
                .parse()
                .unwrap()
        }

        fn control_loop<R: Relay>(&self, relay: R) -> ControlLoop<R, FixedClock> {
            let controller =
                ThermostatController::new(ThermostatConfig::default(), ControlSettings::default())
                    .unwrap();
            ControlLoop::new(controller, relay, FixedClock(self.now), self.paths.clone())
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    /// Refuses to switch on.
    #[derive(Default)]
    struct StuckRelay {
        offs: usize,
    }

    impl Relay for StuckRelay {
        fn set(&mut self, on: bool) -> Result<(), RelayError> {
            if on {
                return Err(RelayError::Io {
                    path: PathBuf::from("/sys/class/gpio/gpio23/value"),
                    source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                });
            }
            self.offs += 1;
            Ok(())
        }

        fn is_on(&self) -> bool {
            false
        }

        fn release(&mut self) -> Result<(), RelayError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn heats_below_band_cools_above_and_holds_inside() {
        let fx = Fixture::new("scenario");
        fx.outdoor(30.0);
        fx.home(true);
        let mut control = fx.control_loop(MemoryRelay::new());
        control.start().await.unwrap();

        fx.indoor(68.0, fx.now);
        let decision = control.tick().await;
        assert_eq!(decision.reason, DecisionReason::BelowBand);
        assert!(fx.published().heating_on);

        fx.indoor(71.2, fx.now);
        assert_eq!(control.tick().await.reason, DecisionReason::AboveBand);
        assert!(!fx.published().heating_on);

        fx.indoor(70.5, fx.now);
        let decision = control.tick().await;
        assert_eq!(decision.reason, DecisionReason::Deadband);
        assert!(!decision.heating_on);

        assert_eq!(control.relay().pulses(), &[false, true, false]);
        assert_eq!(
            fx.published(),
            ControllerStatus {
                heating_on: false,
                indoor_temp_f: Some(70.5),
                outdoor_temp_f: Some(30.0),
                setpoint_f: 70.0,
                daemon_running: true,
                generated_at: fx.now,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stale_indoor_reading_publishes_na_and_keeps_heat_off() {
        let fx = Fixture::new("stale");
        fx.outdoor(30.0);
        fx.home(true);
        fx.indoor(65.0, fx.now - chrono::Duration::hours(4));
        let mut control = fx.control_loop(MemoryRelay::new());

        let decision = control.tick().await;

        assert_eq!(decision.reason, DecisionReason::InputsMissing);
        assert!(control.relay().pulses().is_empty());
        let record = std::fs::read_to_string(&fx.paths.state).unwrap();
        assert!(record.contains("Heating is: OFF"));
        assert!(record.contains("Indoor temperature: N/A"));
        assert!(record.contains("Outdoor temperature: 30.0°F"));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_occupancy_file_is_fail_safe() {
        let fx = Fixture::new("no_occupancy");
        fx.outdoor(30.0);
        fx.indoor(60.0, fx.now);
        let mut control = fx.control_loop(MemoryRelay::new());

        let decision = control.tick().await;

        assert_eq!(decision.reason, DecisionReason::OccupancyUnknown);
        assert!(!fx.published().heating_on);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_forces_off_publishes_stopped_and_releases_once() {
        let fx = Fixture::new("shutdown");
        fx.outdoor(30.0);
        fx.home(true);
        fx.indoor(66.0, fx.now);
        let mut control = fx.control_loop(MemoryRelay::new());
        control.tick().await;
        assert!(control.relay().is_on());

        let started = tokio::time::Instant::now();
        control.shutdown().await;
        control.shutdown().await;

        // settle after the OFF pulse, then the drain delay
        assert!(started.elapsed() >= Duration::from_millis(5_000 + 3_000));
        assert_eq!(control.state(), LoopState::Stopped);
        assert_eq!(control.relay().pulses(), &[true, false]);
        assert!(control.relay().is_released());

        let status = fx.published();
        assert!(!status.daemon_running);
        assert!(!status.heating_on);
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_when_signalled_between_ticks() {
        let fx = Fixture::new("run");
        fx.outdoor(50.0);
        fx.home(true);
        fx.indoor(64.0, fx.now);
        let mut control = fx.control_loop(MemoryRelay::new());
        let (trigger, signal) = shutdown::channel();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(150)).await;
            trigger.trigger();
        });
        control.run(signal).await;

        assert_eq!(control.state(), LoopState::Stopped);
        assert_eq!(
            control.controller().last_reason(),
            Some(DecisionReason::OutdoorTooWarm)
        );
        assert!(control.relay().pulses().is_empty());
        assert!(control.relay().is_released());
        assert!(!fx.published().daemon_running);
    }

    #[tokio::test(start_paused = true)]
    async fn relay_fault_drops_heat_claim_and_sends_off() {
        let fx = Fixture::new("fault");
        fx.outdoor(30.0);
        fx.home(true);
        fx.indoor(60.0, fx.now);
        let mut control = fx.control_loop(StuckRelay::default());

        control.tick().await;

        assert!(!control.controller().is_heating_on());
        assert_eq!(control.relay().offs, 1);
        assert!(!fx.published().heating_on);
    }

    /// Fails the first `failing_offs` OFF commands and stays energized.
    #[derive(Default)]
    struct SluggishRelay {
        on: bool,
        failing_offs: usize,
        commands: Vec<&'static str>,
    }

    impl Relay for SluggishRelay {
        fn set(&mut self, on: bool) -> Result<(), RelayError> {
            if !on && self.failing_offs > 0 {
                self.failing_offs -= 1;
                self.commands.push("off failed");
                return Err(RelayError::Io {
                    path: PathBuf::from("/sys/class/gpio/gpio23/value"),
                    source: std::io::Error::from(std::io::ErrorKind::TimedOut),
                });
            }
            self.on = on;
            self.commands.push(if on { "on" } else { "off" });
            Ok(())
        }

        fn is_on(&self) -> bool {
            self.on
        }

        fn release(&mut self) -> Result<(), RelayError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_off_is_retried_next_tick_and_reported_as_heating() {
        let fx = Fixture::new("failed_off");
        fx.outdoor(30.0);
        fx.home(true);
        fx.indoor(66.0, fx.now);
        let mut control = fx.control_loop(SluggishRelay {
            failing_offs: 3,
            ..SluggishRelay::default()
        });
        control.tick().await;

        fx.indoor(75.0, fx.now);
        control.tick().await;
        assert!(!control.controller().is_heating_on());
        assert!(control.relay().is_on());
        assert!(fx.published().heating_on);

        control.tick().await;
        assert!(!control.relay().is_on());
        assert!(!fx.published().heating_on);
        assert_eq!(
            control.relay().commands,
            vec!["on", "off failed", "off failed", "off failed", "off"]
        );

        control.tick().await;
        assert_eq!(control.relay().commands.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn publish_failure_does_not_stop_control() {
        let mut fx = Fixture::new("publish_fail");
        fx.outdoor(30.0);
        fx.home(true);
        fx.indoor(60.0, fx.now);
        fx.paths.state = fx.dir.join("missing_dir/heater_state.txt");
        let mut control = fx.control_loop(MemoryRelay::new());

        let first = control.tick().await;
        let second = control.tick().await;

        assert!(first.heating_on && second.heating_on);
        assert_eq!(control.relay().pulses(), &[true]);
    }
}
