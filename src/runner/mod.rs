//! Tick-driven session runner: the scheduler contract.
//!
//! The runner owns a [`Channel`], a [`Machine`], and a [`StatusReporter`]
//! and drives them cooperatively: each [`step`](Runner::step) pumps the
//! channel, drains every decoded packet into the machine, advances the
//! machine's timers, and dispatches the resulting effects. Nothing in a
//! step blocks; [`run`](Runner::run) supplies wall-clock deltas and a small
//! poll sleep between steps.
//!
//! A fatal [`TimeoutError`](crate::protocol::TimeoutError) terminates the
//! session: the runner reports a red status and either re-enters Startup
//! immediately ([`RestartPolicy::AutoRestart`]) or hands the error back to
//! the caller ([`RestartPolicy::Halt`]), who may await an external reset
//! signal before calling [`run`](Runner::run) again.

use std::time::{Duration, Instant};

use crate::core::{DEFAULT_POLL_INTERVAL, MeasureProvider, PulseError, StatusLight, StatusReporter};
use crate::protocol::{Effect, Machine, ProtocolConfig};
use crate::transport::Channel;

/// What to do when a session dies of a fatal timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestartPolicy {
    /// Tear down and immediately re-enter Startup.
    #[default]
    AutoRestart,
    /// Return the error; the caller decides when to run again.
    Halt,
}

/// Drives one endpoint's channel and state machine.
#[derive(Debug)]
pub struct Runner<C, M, R>
where
    C: Channel,
    M: MeasureProvider,
    R: StatusReporter,
{
    channel: C,
    machine: Machine<M>,
    status: R,
    policy: RestartPolicy,
    poll_interval: Duration,
}

impl<C, M, R> Runner<C, M, R>
where
    C: Channel,
    M: MeasureProvider,
    R: StatusReporter,
{
    /// Create a runner and dispatch the machine's entry effects.
    pub fn new(
        channel: C,
        config: ProtocolConfig,
        measure: M,
        status: R,
        policy: RestartPolicy,
    ) -> Result<Self, PulseError> {
        let (machine, effects) = Machine::new(config, measure);
        let mut runner = Self {
            channel,
            machine,
            status,
            policy,
            poll_interval: DEFAULT_POLL_INTERVAL,
        };
        runner.dispatch(effects)?;
        Ok(runner)
    }

    /// Override the sleep between [`run`](Self::run) iterations.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// The state machine, for inspection.
    pub fn machine(&self) -> &Machine<M> {
        &self.machine
    }

    /// Perform one cooperative tick with the given elapsed wall time.
    ///
    /// Packets already received are fully handled, including any reply or
    /// transition, before the next one is looked at; the machine's timers
    /// advance afterwards. Never blocks.
    pub fn step(&mut self, elapsed: Duration) -> Result<(), PulseError> {
        self.channel.tick(elapsed)?;

        while let Some(packet) = self.channel.next_packet() {
            let effects = self.machine.handle(&packet);
            self.dispatch(effects)?;
        }

        let effects = self.machine.tick(elapsed)?;
        self.dispatch(effects)?;
        Ok(())
    }

    /// Run sessions until a non-timeout error, or until the first fatal
    /// timeout under [`RestartPolicy::Halt`].
    pub fn run(&mut self) -> Result<(), PulseError> {
        loop {
            let mut last = Instant::now();
            let err = loop {
                let now = Instant::now();
                let elapsed = now - last;
                last = now;

                match self.step(elapsed) {
                    Ok(()) => std::thread::sleep(self.poll_interval),
                    Err(err) => break err,
                }
            };

            self.status.report(StatusLight::Red);
            match err {
                PulseError::Timeout(timeout) => {
                    tracing::info!(%timeout, "session failed");
                    match self.policy {
                        RestartPolicy::AutoRestart => {
                            let effects = self.machine.restart();
                            self.dispatch(effects)?;
                        }
                        RestartPolicy::Halt => return Err(timeout.into()),
                    }
                }
                other => {
                    tracing::error!(%other, "session failed with unrecoverable error");
                    return Err(other);
                }
            }
        }
    }

    fn dispatch(&mut self, effects: Vec<Effect>) -> Result<(), PulseError> {
        for effect in effects {
            match effect {
                Effect::Send(packet) => self.channel.send(&packet)?,
                Effect::Status(status) => self.status.report(status),
                Effect::Deviation(_) => {
                    // Already info-logged by the machine; observers that
                    // want the raw numbers poll machine().last_deviation().
                }
            }
        }
        Ok(())
    }
}
