//! The two-state protocol machine.

use std::time::Duration;

use crate::codec::{Packet, PacketType};
use crate::core::{MeasureProvider, StatusLight};

use super::retry::{RequestKind, RetryState};
use super::{Deviation, Effect, PeerConfig, ProtocolConfig, ProtocolError, TimeoutError};

/// Which protocol state the machine is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Handshaking: learning the peer's configured duty cycle.
    Startup,
    /// Steady state: periodic measurement rounds.
    Normal,
}

#[derive(Debug)]
struct StartupState {
    retry: RetryState,
}

#[derive(Debug)]
struct NormalState {
    retry: RetryState,
    expected_duty_cycle: u16,
    last_deviation: Option<u16>,
}

#[derive(Debug)]
enum State {
    Startup(StartupState),
    Normal(NormalState),
}

/// The protocol state machine of one endpoint.
///
/// Created in Startup; the only transition is Startup to Normal when the
/// handshake response arrives, encoded directly in the handler so no other
/// transition is even representable. A fatal timeout does not transition
/// anywhere: it fails the current [`tick`](Machine::tick), and recovery is
/// the scheduler calling [`restart`](Machine::restart).
#[derive(Debug)]
pub struct Machine<M: MeasureProvider> {
    config: ProtocolConfig,
    measure: M,
    state: State,
}

impl<M: MeasureProvider> Machine<M> {
    /// Create a machine in Startup.
    ///
    /// The returned effects are the entry actions (status change and the
    /// first `RequestConfig`) and must be dispatched before the first tick.
    pub fn new(config: ProtocolConfig, measure: M) -> (Self, Vec<Effect>) {
        let mut machine = Self {
            config,
            measure,
            state: State::Startup(StartupState {
                retry: RetryState::new(),
            }),
        };
        let effects = machine.enter_startup();
        (machine, effects)
    }

    /// Tear down the current session state and re-enter Startup.
    ///
    /// This is the only recovery from a fatal timeout; nothing of the old
    /// session survives, the peer's config is re-learned from scratch.
    pub fn restart(&mut self) -> Vec<Effect> {
        tracing::info!("restarting session from startup");
        self.enter_startup()
    }

    fn enter_startup(&mut self) -> Vec<Effect> {
        tracing::debug!(own_duty_cycle = self.config.own_duty_cycle, "entering startup state");
        let mut retry = RetryState::new();
        retry.begin(RequestKind::Config);
        self.state = State::Startup(StartupState { retry });
        vec![
            Effect::Status(StatusLight::Yellow),
            Effect::Send(Packet::request_config(self.config.own_duty_cycle)),
        ]
    }

    /// Advance timers by the scheduler-supplied delta.
    ///
    /// Returns the effects to dispatch, or [`TimeoutError`] once the retry
    /// budget for the outstanding request is exhausted.
    pub fn tick(&mut self, elapsed: Duration) -> Result<Vec<Effect>, TimeoutError> {
        let Self { config, state, .. } = self;
        let mut effects = Vec::new();

        match state {
            State::Startup(st) => {
                st.retry.advance(elapsed);
                if st.retry.elapsed() >= config.timeout {
                    let retries = st.retry.on_timeout();
                    if retries > config.max_retries {
                        tracing::error!(retries, "timed out waiting for request_config response");
                        return Err(TimeoutError {
                            request: RequestKind::Config,
                            retries,
                        });
                    }
                    tracing::debug!(retries, "request_config timed out, retrying");
                    effects.push(Effect::Send(Packet::request_config(config.own_duty_cycle)));
                }
            }
            State::Normal(ns) => {
                ns.retry.advance(elapsed);
                if ns.retry.is_idle() {
                    if ns.retry.elapsed() >= config.measure_interval {
                        tracing::trace!("requesting measurement");
                        ns.retry.begin(RequestKind::Measured);
                        effects.push(Effect::Status(StatusLight::Yellow));
                        effects.push(Effect::Send(Packet::request_measured()));
                    }
                } else if ns.retry.elapsed() >= config.timeout {
                    let retries = ns.retry.on_timeout();
                    if retries > config.max_retries {
                        tracing::error!(retries, "timed out waiting for request_measured response");
                        return Err(TimeoutError {
                            request: RequestKind::Measured,
                            retries,
                        });
                    }
                    tracing::debug!(retries, "request_measured timed out, retrying");
                    effects.push(Effect::Send(Packet::request_measured()));
                }
            }
        }

        Ok(effects)
    }

    /// Process one received packet.
    ///
    /// Contract violations (a valued type without a value, a type that is
    /// meaningless in the current state) are warned about and ignored; they
    /// never disturb retry bookkeeping.
    pub fn handle(&mut self, packet: &Packet) -> Vec<Effect> {
        tracing::trace!(
            packet_type = %packet.packet_type,
            value = ?packet.value,
            "packet received"
        );

        let Self {
            config,
            measure,
            state,
        } = self;
        let mut effects = Vec::new();

        match state {
            State::Startup(_) => match (packet.packet_type, packet.value) {
                (PacketType::RequestConfig, _) => {
                    // The peer started its handshake first; answer without
                    // touching our own outstanding request.
                    effects.push(Effect::Send(Packet::response_config(config.own_duty_cycle)));
                }
                (PacketType::ResponseConfig, Some(expected)) => {
                    tracing::info!(
                        expected_duty_cycle = expected,
                        "handshake complete, entering normal state"
                    );
                    let mut retry = RetryState::new();
                    retry.begin(RequestKind::Measured);
                    *state = State::Normal(NormalState {
                        retry,
                        expected_duty_cycle: expected,
                        last_deviation: None,
                    });
                    effects.push(Effect::Status(StatusLight::Green));
                    effects.push(Effect::Send(Packet::request_measured()));
                }
                (packet_type @ PacketType::ResponseConfig, None) => {
                    warn_ignored(ProtocolError::MissingValue { packet_type });
                }
                (packet_type, _) => {
                    warn_ignored(ProtocolError::Unexpected { packet_type });
                }
            },
            State::Normal(ns) => match (packet.packet_type, packet.value) {
                (PacketType::RequestConfig, value) => {
                    // The peer may re-query our config at any time. A
                    // restarted peer announces its own target in the
                    // request, so the learned value is refreshed here.
                    if let Some(expected) = value {
                        ns.expected_duty_cycle = expected;
                    }
                    effects.push(Effect::Send(Packet::response_config(config.own_duty_cycle)));
                }
                (PacketType::RequestMeasured, _) => {
                    effects.push(Effect::Send(Packet::response_measured(measure.measure())));
                }
                (PacketType::ResponseMeasured, Some(measured)) => {
                    ns.retry.acknowledge();
                    let deviation = ns.expected_duty_cycle.abs_diff(measured);
                    ns.last_deviation = Some(deviation);
                    tracing::info!(
                        expected = ns.expected_duty_cycle,
                        measured,
                        deviation,
                        "measurement round trip"
                    );
                    effects.push(Effect::Status(StatusLight::Green));
                    effects.push(Effect::Deviation(Deviation {
                        expected: ns.expected_duty_cycle,
                        measured,
                        deviation,
                    }));
                }
                (packet_type @ PacketType::ResponseMeasured, None) => {
                    warn_ignored(ProtocolError::MissingValue { packet_type });
                }
                (packet_type, _) => {
                    warn_ignored(ProtocolError::Unexpected { packet_type });
                }
            },
        }

        effects
    }

    /// Current protocol phase.
    pub fn phase(&self) -> Phase {
        match self.state {
            State::Startup(_) => Phase::Startup,
            State::Normal(_) => Phase::Normal,
        }
    }

    /// What this endpoint currently knows about the duty-cycle pair.
    pub fn peer(&self) -> PeerConfig {
        PeerConfig {
            own_duty_cycle: self.config.own_duty_cycle,
            expected_duty_cycle: self.expected_duty_cycle(),
        }
    }

    /// The peer's configured duty cycle, once the handshake has completed.
    pub fn expected_duty_cycle(&self) -> Option<u16> {
        match &self.state {
            State::Startup(_) => None,
            State::Normal(ns) => Some(ns.expected_duty_cycle),
        }
    }

    /// The most recent observed deviation, if any round trip completed.
    pub fn last_deviation(&self) -> Option<u16> {
        match &self.state {
            State::Startup(_) => None,
            State::Normal(ns) => ns.last_deviation,
        }
    }
}

fn warn_ignored(err: ProtocolError) {
    tracing::warn!(%err, "ignoring packet");
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(u16);

    impl MeasureProvider for Fixed {
        fn measure(&mut self) -> u16 {
            self.0
        }
    }

    fn config() -> ProtocolConfig {
        ProtocolConfig {
            own_duty_cycle: 1200,
            timeout: Duration::from_millis(1000),
            measure_interval: Duration::from_millis(500),
            max_retries: 3,
        }
    }

    fn sends(effects: &[Effect]) -> Vec<Packet> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Send(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_startup_entry_sends_request_config() {
        let (machine, effects) = Machine::new(config(), Fixed(0));
        assert_eq!(machine.phase(), Phase::Startup);
        assert_eq!(sends(&effects), [Packet::request_config(1200)]);
        assert!(effects.contains(&Effect::Status(StatusLight::Yellow)));
    }

    #[test]
    fn test_startup_retry_sequence() {
        // timeout=1000, max_retries=3, no responses: ticks at
        // [1000, 1000, 1000, 1000] produce exactly 3 resends and then
        // the fatal timeout on the 4th boundary.
        let (mut machine, _) = Machine::new(config(), Fixed(0));

        for boundary in 1..=3 {
            let effects = machine.tick(Duration::from_millis(1000)).unwrap();
            assert_eq!(
                sends(&effects),
                [Packet::request_config(1200)],
                "boundary {boundary}"
            );
        }

        let err = machine.tick(Duration::from_millis(1000)).unwrap_err();
        assert_eq!(
            err,
            TimeoutError {
                request: RequestKind::Config,
                retries: 4
            }
        );
    }

    #[test]
    fn test_startup_no_resend_before_timeout() {
        let (mut machine, _) = Machine::new(config(), Fixed(0));
        let effects = machine.tick(Duration::from_millis(999)).unwrap();
        assert!(effects.is_empty());
    }

    #[test]
    fn test_startup_answers_peer_handshake() {
        // Peer asks us first; we reply and stay in Startup.
        let (mut machine, _) = Machine::new(config(), Fixed(0));
        let effects = machine.handle(&Packet::request_config(1340));
        assert_eq!(sends(&effects), [Packet::response_config(1200)]);
        assert_eq!(machine.phase(), Phase::Startup);
    }

    #[test]
    fn test_handshake_transition() {
        let (mut machine, _) = Machine::new(config(), Fixed(0));
        let effects = machine.handle(&Packet::response_config(1340));

        assert_eq!(machine.phase(), Phase::Normal);
        assert_eq!(machine.expected_duty_cycle(), Some(1340));
        assert_eq!(
            machine.peer(),
            PeerConfig {
                own_duty_cycle: 1200,
                expected_duty_cycle: Some(1340)
            }
        );
        assert_eq!(sends(&effects), [Packet::request_measured()]);
        assert!(effects.contains(&Effect::Status(StatusLight::Green)));
    }

    #[test]
    fn test_startup_ignores_unexpected_packets() {
        let (mut machine, _) = Machine::new(config(), Fixed(0));
        machine.tick(Duration::from_millis(400)).unwrap();

        let effects = machine.handle(&Packet::response_measured(5));
        assert!(effects.is_empty());
        assert_eq!(machine.phase(), Phase::Startup);

        // Retry bookkeeping untouched: the timeout still fires on schedule.
        let effects = machine.tick(Duration::from_millis(600)).unwrap();
        assert_eq!(sends(&effects), [Packet::request_config(1200)]);
    }

    fn into_normal(expected: u16, measure: Fixed) -> Machine<Fixed> {
        let (mut machine, _) = Machine::new(config(), measure);
        machine.handle(&Packet::response_config(expected));
        machine
    }

    #[test]
    fn test_deviation_reporting() {
        let mut machine = into_normal(5000, Fixed(0));
        let effects = machine.handle(&Packet::response_measured(5100));

        assert!(effects.contains(&Effect::Deviation(Deviation {
            expected: 5000,
            measured: 5100,
            deviation: 100,
        })));
        assert_eq!(machine.last_deviation(), Some(100));

        // Deviation is symmetric.
        machine.handle(&Packet::response_measured(4900));
        assert_eq!(machine.last_deviation(), Some(100));
    }

    #[test]
    fn test_normal_answers_measure_request() {
        let mut machine = into_normal(5000, Fixed(4242));
        let effects = machine.handle(&Packet::request_measured());
        assert_eq!(sends(&effects), [Packet::response_measured(4242)]);
    }

    #[test]
    fn test_normal_answers_config_requery() {
        let mut machine = into_normal(5000, Fixed(0));
        let effects = machine.handle(&Packet::request_config(5000));
        assert_eq!(sends(&effects), [Packet::response_config(1200)]);
        // Re-query does not disturb the measurement round in flight.
        assert_eq!(machine.phase(), Phase::Normal);
    }

    #[test]
    fn test_normal_relearns_target_from_config_request() {
        // A restarted peer handshakes again; its request carries the
        // target we should be comparing against from now on.
        let mut machine = into_normal(5000, Fixed(0));
        let effects = machine.handle(&Packet::request_config(5100));

        assert_eq!(sends(&effects), [Packet::response_config(1200)]);
        assert_eq!(machine.expected_duty_cycle(), Some(5100));

        // The next measurement round uses the refreshed target.
        machine.handle(&Packet::response_measured(5150));
        assert_eq!(machine.last_deviation(), Some(50));
    }

    #[test]
    fn test_normal_periodic_request_after_idle() {
        let mut machine = into_normal(5000, Fixed(0));
        // Answer the entry request so the state goes idle.
        machine.handle(&Packet::response_measured(5000));

        // Nothing before the measurement interval elapses.
        let effects = machine.tick(Duration::from_millis(499)).unwrap();
        assert!(effects.is_empty());

        let effects = machine.tick(Duration::from_millis(1)).unwrap();
        assert_eq!(sends(&effects), [Packet::request_measured()]);
        assert!(effects.contains(&Effect::Status(StatusLight::Yellow)));
    }

    #[test]
    fn test_normal_retry_then_fatal() {
        let mut machine = into_normal(5000, Fixed(0));

        // The entry request is outstanding; burn the whole retry budget.
        for _ in 0..3 {
            let effects = machine.tick(Duration::from_millis(1000)).unwrap();
            assert_eq!(sends(&effects), [Packet::request_measured()]);
        }

        let err = machine.tick(Duration::from_millis(1000)).unwrap_err();
        assert_eq!(
            err,
            TimeoutError {
                request: RequestKind::Measured,
                retries: 4
            }
        );
    }

    #[test]
    fn test_normal_response_resets_retry() {
        let mut machine = into_normal(5000, Fixed(0));

        // One timeout boundary passes, then the response finally arrives.
        machine.tick(Duration::from_millis(1000)).unwrap();
        machine.handle(&Packet::response_measured(5000));

        // Idle again: the next send is interval-paced, not a retry.
        let effects = machine.tick(Duration::from_millis(500)).unwrap();
        assert_eq!(sends(&effects), [Packet::request_measured()]);
    }

    #[test]
    fn test_normal_ignores_unexpected_response_config() {
        let mut machine = into_normal(5000, Fixed(0));
        let effects = machine.handle(&Packet::response_config(9999));
        assert!(effects.is_empty());
        // The learned target is never overwritten within a session.
        assert_eq!(machine.expected_duty_cycle(), Some(5000));
    }

    #[test]
    fn test_restart_reenters_startup() {
        let mut machine = into_normal(5000, Fixed(0));
        assert_eq!(machine.phase(), Phase::Normal);

        let effects = machine.restart();
        assert_eq!(machine.phase(), Phase::Startup);
        assert_eq!(machine.expected_duty_cycle(), None);
        assert_eq!(sends(&effects), [Packet::request_config(1200)]);
    }
}
