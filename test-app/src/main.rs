// dbbc3 test application -- CLI tool for exercising the command session,
// the multicast listener and the validation checks against a live DBBC3.
//
// Usage:
//   dbbc3-test-app --host 192.168.0.60 info
//   dbbc3-test-app --host 192.168.0.60 --boards 4 check synthesizer-lock --board b
//   dbbc3-test-app --host 192.168.0.60 --boards 4 system
//   dbbc3-test-app --host 192.168.0.60 check bit-statistics --board a --fresh 3
//   dbbc3-test-app snapshot --timeout 5
//   dbbc3-test-app --host 192.168.0.60 raw "synth=1,lock"
//
// Logging is controlled with RUST_LOG, e.g. RUST_LOG=dbbc3_control=debug.

use std::net::Ipv4Addr;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dbbc3::multicast::{ListenerConfig, MissedFramePolicy, MulticastListener, Snapshot};
use dbbc3::validation::{Check, CheckKind, Freshness, Report, ValidationConfig, ValidationEngine};
use dbbc3::{BoardRef, Mode, Session, SessionBuilder};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// dbbc3 test application -- talks to a DBBC3 from the command line.
#[derive(Parser)]
#[command(name = "dbbc3-test-app", version, about)]
struct Cli {
    /// Host name or address of the DBBC3 control software.
    /// Required for all commands except `snapshot`.
    #[arg(long)]
    host: Option<String>,

    /// TCP command port.
    #[arg(long, default_value_t = 4000)]
    port: u16,

    /// Number of installed core boards.
    #[arg(long, default_value_t = 8)]
    boards: usize,

    /// Seconds to wait for the connection.
    #[arg(long, default_value_t = 10)]
    connect_timeout: u64,

    /// Refuse to run unless the device reports this mode (e.g. DDC_V, OCT_D).
    #[arg(long)]
    mode: Option<Mode>,

    /// Refuse to run unless the device reports this major version.
    #[arg(long)]
    version_major: Option<u32>,

    /// Never exit non-zero because of a check result.
    #[arg(long)]
    ignore_errors: bool,

    /// Multicast group for telemetry-based commands.
    #[arg(long, default_value_t = Ipv4Addr::new(224, 0, 0, 255))]
    group: Ipv4Addr,

    /// Multicast UDP port.
    #[arg(long, default_value_t = 25000)]
    mcast_port: u16,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the firmware and the command set in use.
    Info,

    /// Run a single check.
    Check {
        /// Check name, e.g. timesync, synthesizer-lock, if-level, pps.
        kind: CheckKind,

        /// Board letter (a-h) or index (0-7).
        #[arg(long, default_value = "a")]
        board: BoardRef,

        /// For bit statistics: wait up to this many seconds for a new
        /// snapshot instead of using the newest one.
        #[arg(long)]
        fresh: Option<u64>,
    },

    /// Run every check for every board.
    System,

    /// Sampler power, offsets and phases.
    Sampler,

    /// Synthesizer lock and frequency.
    Synthesizer,

    /// Wait for one multicast snapshot and print it.
    Snapshot {
        /// Seconds to wait.
        #[arg(long, default_value_t = 5)]
        timeout: u64,
    },

    /// Send a raw command and print the reply.
    Raw {
        /// Command text, without the NUL terminator.
        command: String,
    },
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn listener_config(cli: &Cli) -> ListenerConfig {
    ListenerConfig {
        group: cli.group,
        port: cli.mcast_port,
        ..ListenerConfig::default()
    }
}

async fn connect(cli: &Cli) -> Result<Session> {
    let Some(host) = cli.host.as_deref() else {
        bail!("--host is required for this command");
    };

    let mut builder = SessionBuilder::new(host)
        .port(cli.port)
        .board_count(cli.boards)
        .connect_timeout(Duration::from_secs(cli.connect_timeout));
    if let Some(mode) = cli.mode {
        builder = builder.expected_mode(mode);
    }
    if let Some(version) = cli.version_major {
        builder = builder.expected_version(version);
    }

    builder
        .connect()
        .await
        .with_context(|| format!("failed to connect to {host}:{}", cli.port))
}

fn print_report(report: &Report) {
    println!("{report}");
    println!();
    println!(
        "{} checks, {} problems, overall {}",
        report.len(),
        report.problems().count(),
        report.status()
    );
}

fn exit_code(report: &Report) -> ExitCode {
    if report.exit() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

fn cmd_info(session: &Session) -> Result<ExitCode> {
    let fw = session.firmware();
    let set = session.command_set();

    println!("DBBC3 Information");
    println!("  Mode:           {}", fw.mode());
    println!("  Version:        {}", fw.version());
    println!("  Release:        {} ({})", fw.release_string, fw.minor_version());
    println!("  Boards:         {}", session.boards().count());
    println!();
    println!("Command Set");
    println!("  Floor:          {}", set.floor());
    println!("  Commands:       {}", set.len());
    println!("  Names:          {}", set.names().join(", "));
    Ok(ExitCode::SUCCESS)
}

async fn cmd_check(
    cli: &Cli,
    session: &Session,
    kind: CheckKind,
    board: BoardRef,
    fresh: Option<u64>,
) -> Result<ExitCode> {
    let config = ValidationConfig::default().with_ignore_errors(cli.ignore_errors);
    let mut engine = ValidationEngine::new(session, config)?;

    // Only bit statistics need telemetry; keep the listener alive for the run.
    let listener = if kind == CheckKind::BitStatistics {
        let listener = MulticastListener::start(listener_config(cli))
            .await
            .context("failed to join the multicast group")?;
        engine = engine.with_snapshots(listener.subscribe(MissedFramePolicy::Skip));
        Some(listener)
    } else {
        None
    };

    // Without --fresh the newest snapshot is used, so give the listener
    // one telemetry period to receive it.
    let freshness = match fresh {
        Some(secs) => Freshness::Fresh(Duration::from_secs(secs)),
        None => {
            if listener.is_some() {
                tokio::time::sleep(Duration::from_millis(1100)).await;
            }
            Freshness::Latest
        }
    };

    let report = engine.check(Check::new(kind, board, freshness)).await?;
    if let Some(listener) = listener {
        listener.stop();
    }
    print_report(&report);
    Ok(exit_code(&report))
}

async fn cmd_composite(cli: &Cli, session: &Session, which: &Command) -> Result<ExitCode> {
    let config = ValidationConfig::default().with_ignore_errors(cli.ignore_errors);
    let engine = ValidationEngine::new(session, config)?;

    let report = match which {
        Command::System => engine.check_system().await?,
        Command::Sampler => engine.check_sampler().await?,
        Command::Synthesizer => engine.check_synthesizer().await?,
        _ => unreachable!("only composite checks are dispatched here"),
    };
    print_report(&report);
    Ok(exit_code(&report))
}

async fn cmd_raw(session: &Session, command: &str) -> Result<ExitCode> {
    let reply = session.send_command(command).await?;
    println!("{}", reply.trim_end_matches(['\0', '\r', '\n']));
    Ok(ExitCode::SUCCESS)
}

async fn cmd_snapshot(cli: &Cli, timeout_secs: u64) -> Result<ExitCode> {
    let listener = MulticastListener::start(listener_config(cli))
        .await
        .context("failed to join the multicast group")?;
    let mut rx = listener.subscribe(MissedFramePolicy::Skip);

    println!(
        "Waiting for telemetry on {}:{} ...",
        cli.group, cli.mcast_port
    );
    let snapshot = rx
        .poll_timeout(Duration::from_secs(timeout_secs))
        .await
        .context("no snapshot received")?;
    listener.stop();

    print_snapshot(&snapshot);
    Ok(ExitCode::SUCCESS)
}

fn print_snapshot(snapshot: &Snapshot) {
    println!("Snapshot");
    println!("  Firmware:       {}", snapshot.firmware);
    for (index, board) in snapshot.present_boards() {
        let letter = char::from(b'A' + index as u8);
        println!();
        println!(
            "Board {letter}{}",
            if snapshot.is_active(index) { "" } else { " (inactive)" }
        );
        println!(
            "  IF:             {} att {} count {} target {}",
            if board.if_state.agc { "agc" } else { "man" },
            board.if_state.attenuation,
            board.if_state.count,
            board.if_state.target
        );
        println!(
            "  Synthesizer:    {} MHz, {}",
            board.synth.frequency,
            if board.synth.locked { "locked" } else { "not locked" }
        );
        println!(
            "  Sampler power:  {}",
            board
                .samplers
                .iter()
                .map(|s| s.power.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!("  PPS delay:      {} ns", board.core3h.pps_delay());
        if let Some(ts) = board.core3h.timestamp() {
            println!("  VDIF time:      {ts}");
        }
        for (i, filter) in board.filters.iter().enumerate() {
            println!(
                "  Filter {}:       power {} levels {:.1?} %",
                i + 1,
                filter.power,
                filter.stats.percent
            );
        }
        if !board.bbcs.is_empty() {
            println!(
                "  BBCs:           {}",
                board
                    .bbcs
                    .iter()
                    .map(|b| format!("{}@{:.2}", b.number, b.frequency))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // The `snapshot` command does not need the TCP connection.
    if let Command::Snapshot { timeout } = &cli.command {
        return cmd_snapshot(&cli, *timeout).await;
    }

    let session = connect(&cli).await?;
    tracing::info!(firmware = %session.firmware(), "Connected");

    let result = match &cli.command {
        Command::Info => cmd_info(&session),
        Command::Check { kind, board, fresh } => {
            cmd_check(&cli, &session, *kind, *board, *fresh).await
        }
        which @ (Command::System | Command::Sampler | Command::Synthesizer) => {
            cmd_composite(&cli, &session, which).await
        }
        Command::Raw { command } => cmd_raw(&session, command).await,
        Command::Snapshot { .. } => unreachable!("snapshot handled above"),
    };

    session.disconnect().await.ok();
    result
}
