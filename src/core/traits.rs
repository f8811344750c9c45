//! Collaborator traits at the core's boundary.
//!
//! The protocol state machine never touches hardware. Measurements and
//! status indication are supplied by the embedding program through these
//! traits; register-level ADC/GPIO drivers live entirely outside the crate.

/// Source of locally observed duty-cycle readings.
///
/// Queried when the peer asks for a measurement (`RequestMeasured`); the
/// returned value is the raw PWM compare value actually observed at the
/// output, not the configured target.
pub trait MeasureProvider {
    /// Take a fresh measurement.
    fn measure(&mut self) -> u16;
}

impl<M: MeasureProvider + ?Sized> MeasureProvider for &mut M {
    fn measure(&mut self) -> u16 {
        (**self).measure()
    }
}

/// Coarse session health, reported to an external indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLight {
    /// Synchronized; last request was answered.
    Green,
    /// A request is outstanding.
    Yellow,
    /// Fatal timeout; the session is being torn down.
    Red,
}

/// Observer for [`StatusLight`] changes.
///
/// Typically drives an LED bank; the state machine only emits the
/// transitions and never knows how they are displayed.
pub trait StatusReporter {
    /// Report a status change.
    fn report(&mut self, status: StatusLight);
}

impl<R: StatusReporter + ?Sized> StatusReporter for &mut R {
    fn report(&mut self, status: StatusLight) {
        (**self).report(status)
    }
}

/// Reporter that discards all status changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStatusReporter;

impl StatusReporter for NullStatusReporter {
    fn report(&mut self, _status: StatusLight) {}
}

/// Reporter that logs status changes through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceStatusReporter;

impl StatusReporter for TraceStatusReporter {
    fn report(&mut self, status: StatusLight) {
        tracing::debug!(?status, "status change");
    }
}
