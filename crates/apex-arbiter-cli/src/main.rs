#![forbid(unsafe_code)]

// Native-only CLI. Keep a wasm32 stub `main` so `--workspace` builds for wasm targets still link.
#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::io::{self, Write};

    use anyhow::{bail, Context, Result};
    use apex_arbiter::storm::{AtomicStorm, StormConfig, StormMode, TraceEvent, TraceKind};
    use apex_arbiter::{ArbiterConfig, Sequence};
    use apex_time::{ms, ns_to_ms_f64};
    use clap::Parser;
    use tracing_subscriber::EnvFilter;

    #[derive(Debug, Parser)]
    #[command(
        name = "apex-arbiter",
        about = "Run an atomic storm through the Apex atomic arbiter and report the retirement order"
    )]
    pub struct Args {
        /// Number of SMs that fire an atomic at the same address.
        #[arg(long, env = "APEX_SMS", default_value_t = 4)]
        sms: u32,

        /// Admission queue capacity.
        #[arg(long, env = "APEX_QUEUE_CAPACITY", default_value_t = apex_arbiter::QUEUE_CAPACITY)]
        capacity: usize,

        /// Grants allowed to occupy the arbiter body at once.
        #[arg(long, env = "APEX_MAX_GRANTS_IN_FLIGHT", default_value_t = 1)]
        max_grants_in_flight: usize,

        /// How long a retired ROB head stays visible before removal, in virtual milliseconds.
        #[arg(long, env = "APEX_SETTLE_MS", default_value_t = 600)]
        settle_ms: u64,

        /// Seed for launch jitter and L2 latency.
        #[arg(long, env = "APEX_SEED", default_value_t = 0)]
        seed: u64,

        /// Run the pre-Apex path: no arbiter, results land in L2 lock order.
        #[arg(long)]
        raw_bus: bool,

        /// Print every trace event as it happens.
        #[arg(long, conflicts_with = "json")]
        trace: bool,

        /// Emit the full report as JSON on stdout.
        #[arg(long)]
        json: bool,

        /// Log filter (`tracing_subscriber::EnvFilter` syntax).
        #[arg(long, env = "APEX_LOG", default_value = "info")]
        log_level: String,
    }

    impl Args {
        fn storm_config(&self) -> StormConfig {
            let mut arbiter = ArbiterConfig::with_capacity(self.capacity);
            arbiter.settle_delay_ns = ms(self.settle_ms);
            arbiter.seed = self.seed;

            StormConfig {
                mode: if self.raw_bus {
                    StormMode::RawBus
                } else {
                    StormMode::Arbitrated
                },
                sm_count: self.sms,
                arbiter,
                max_grants_in_flight: self.max_grants_in_flight,
                seed: self.seed,
                ..StormConfig::default()
            }
        }
    }

    pub fn main() -> Result<()> {
        let args = Args::parse();

        let filter = EnvFilter::try_new(&args.log_level)
            .with_context(|| format!("invalid log filter {:?}", args.log_level))?;
        // Logs go to stderr so `--json` output stays machine-readable.
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();

        let storm = AtomicStorm::new(args.storm_config()).context("invalid storm configuration")?;

        let stdout = io::stdout();
        let report = if args.trace {
            let mut out = stdout.lock();
            let mut write_err = None;
            let report = storm.run_with_observer(&mut |event: &TraceEvent| {
                if write_err.is_none() {
                    if let Err(err) = writeln!(out, "{}", format_event(event)) {
                        write_err = Some(err);
                    }
                }
            });
            if let Some(err) = write_err {
                return Err(err).context("failed to write trace");
            }
            report
        } else {
            storm.run()
        };

        let mut out = stdout.lock();
        if args.json {
            serde_json::to_writer_pretty(&mut out, &report).context("failed to encode report")?;
            writeln!(out)?;
        } else {
            writeln!(
                out,
                "mode: {}  sms: {}  duration: {:.1}ms",
                match report.mode {
                    StormMode::Arbitrated => "arbitrated",
                    StormMode::RawBus => "raw-bus",
                },
                report.sm_count,
                ns_to_ms_f64(report.duration_ns)
            )?;
            if report.mode == StormMode::Arbitrated {
                writeln!(out, "grant order:      {}", join(&report.grant_order))?;
                writeln!(out, "completion order: {}", join(&report.completion_order))?;
                writeln!(out, "retirement order: {}", join(&report.retirement_order))?;
                writeln!(
                    out,
                    "stalls: {}  peak contention: {:.0}%",
                    report.stalls,
                    report.peak_contention * 100.0
                )?;
            }
            let delivered: Vec<String> = report
                .deliveries
                .iter()
                .map(|d| match d.sequence {
                    Some(seq) => format!("{}({seq})", d.origin),
                    None => d.origin.to_string(),
                })
                .collect();
            writeln!(out, "data delivered:   {}", delivered.join(" "))?;
        }

        if report.mode == StormMode::Arbitrated && !report.retired_in_sequence_order() {
            bail!(
                "results retired out of sequence order: {}",
                join(&report.retirement_order)
            );
        }
        Ok(())
    }

    fn join(seqs: &[Sequence]) -> String {
        seqs.iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn format_event(event: &TraceEvent) -> String {
        let what = match event.kind {
            TraceKind::Launched { origin } => format!("{origin} ATOM.ADD launched"),
            TraceKind::Arrived { origin } => format!("{origin} arrived at arbiter"),
            TraceKind::Admitted { origin, sequence } => format!("{origin} admitted as {sequence}"),
            TraceKind::Stalled { origin } => format!("{origin} stalled: queue full"),
            TraceKind::Granted { origin, sequence } => format!("{sequence} granted to {origin}"),
            TraceKind::Departed { sequence } => format!("{sequence} departed queue"),
            TraceKind::BodyCleared { sequence } => format!("{sequence} RMW→L2"),
            TraceKind::L2Complete { sequence } => format!("{sequence} L2 done"),
            TraceKind::AckArrived { sequence } => format!("{sequence} ACK at ROB"),
            TraceKind::Retired { origin, sequence } => format!("{sequence} retired → {origin}"),
            TraceKind::L2Locked { origin } => format!("{origin} holds L2 lock"),
            TraceKind::DataDelivered { origin, sequence } => match sequence {
                Some(seq) => format!("{origin} received DATA {seq}"),
                None => format!("{origin} received DATA"),
            },
        };
        format!("{:>9.1}ms  {what}", ns_to_ms_f64(event.at_ns))
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    native::main()
}
