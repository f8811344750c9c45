//! Two PulseSync peers talking over an in-memory serial link.
//!
//! Spawns one thread per endpoint, wires them back-to-back with
//! [`pipe_pair`], and lets both sessions run: handshake, then periodic
//! measurement rounds. Each peer's measured output is fabricated around its
//! own configured duty cycle, so the reported deviations stay small but
//! nonzero. Watch the exchange with `RUST_LOG=pulsesync=debug`.

use std::thread;
use std::time::Duration;

use clap::Parser;
use pulsesync::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "pulsesync-peers", about = "Run two PulseSync peers back-to-back")]
struct Args {
    /// Configured duty cycle of the first peer
    #[arg(long, default_value_t = 1200)]
    duty_a: u16,

    /// Configured duty cycle of the second peer
    #[arg(long, default_value_t = 1340)]
    duty_b: u16,

    /// Measurement jitter applied around each peer's duty cycle
    #[arg(long, default_value_t = 25)]
    jitter: u16,

    /// Interval between measurement requests, in milliseconds
    #[arg(long, default_value_t = 500)]
    measure_interval_ms: u64,

    /// Request timeout, in milliseconds
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,

    /// How long to let the peers run, in seconds
    #[arg(long, default_value_t = 5)]
    seconds: u64,
}

fn peer_config(args: &Args, own_duty_cycle: u16) -> ProtocolConfig {
    ProtocolConfig {
        own_duty_cycle,
        timeout: Duration::from_millis(args.timeout_ms),
        measure_interval: Duration::from_millis(args.measure_interval_ms),
        max_retries: 3,
    }
}

fn spawn_peer(
    name: &'static str,
    channel: SerialChannel<PipePort>,
    config: ProtocolConfig,
    jitter: u16,
    deadline: Duration,
) -> thread::JoinHandle<()> {
    let own = config.own_duty_cycle;
    let low = own.saturating_sub(jitter);
    let high = own.saturating_add(jitter);
    let measure = MockMeasureProvider::new(low..=high);

    thread::spawn(move || {
        let span = tracing::info_span!("peer", name);
        let _guard = span.enter();

        let mut runner = match Runner::new(
            channel,
            config,
            measure,
            TraceStatusReporter,
            RestartPolicy::AutoRestart,
        ) {
            Ok(runner) => runner,
            Err(err) => {
                tracing::error!(%err, "failed to start peer");
                return;
            }
        };

        let start = std::time::Instant::now();
        let mut last = start;
        while start.elapsed() < deadline {
            let now = std::time::Instant::now();
            let elapsed = now - last;
            last = now;

            match runner.step(elapsed) {
                Ok(()) => thread::sleep(Duration::from_millis(1)),
                Err(err) => {
                    // The pipe closes when the other peer's deadline hits.
                    tracing::info!(%err, "link went down, stopping");
                    return;
                }
            }
        }

        match runner.machine().last_deviation() {
            Some(deviation) => {
                tracing::info!(own, deviation, "done");
            }
            None => tracing::warn!(own, "done without a completed measurement round"),
        }
    })
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pulsesync=info".into()),
        )
        .init();

    let args = Args::parse();
    let deadline = Duration::from_secs(args.seconds);

    let (chan_a, chan_b) = pipe_pair();
    let a = spawn_peer("a", chan_a, peer_config(&args, args.duty_a), args.jitter, deadline);
    let b = spawn_peer("b", chan_b, peer_config(&args, args.duty_b), args.jitter, deadline);

    let _ = a.join();
    let _ = b.join();
}
