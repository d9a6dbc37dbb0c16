use clap::Parser;
use serde::Serialize;
use std::io::{BufReader, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vrtrace::catalog::StructKind;
use vrtrace::config::{CliArgs, Command, Config, OutputFormat};
use vrtrace::message::SandeshMessage;
use vrtrace::protocol::{MemoryBuffer, ProtocolConfig, SandeshProtocol};
use vrtrace::tracer::{self, ArgStore, TraceRecord, Tracer};
use vrtrace::{raw, request};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliArgs::parse();

    // Load config from file if provided, otherwise use defaults.
    let mut config = if let Some(ref config_path) = cli.config {
        Config::from_file(Path::new(config_path))?
    } else {
        Config::default()
    };
    config.merge_cli(&cli);

    // Logging. Records go to stdout, so logs stay on stderr.
    if config.quiet {
        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new("error"))
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new(
                std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
            ))
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    match cli.command {
        Command::DecodeRaw {
            struct_name,
            file,
            fields,
        } => {
            let kind = StructKind::from_name(&struct_name)
                .ok_or_else(|| anyhow::anyhow!("unknown struct name {struct_name:?}"))?;
            let buf = std::fs::read(&file)?;
            if fields {
                emit(config.output, &raw::fields(kind, &buf)?)?;
                return Ok(());
            }
            match raw::decode(kind, &buf)? {
                Some(record) => emit(config.output, &record)?,
                None => anyhow::bail!("{kind} has no raw layout"),
            }
        }
        Command::DecodeSandesh { file, response } => {
            let buf = std::fs::read(&file)?;
            let cfg = config.protocol_config();
            if response {
                let reply = request::decode_response(&buf, &cfg)?;
                if !reply.header.is_ok() {
                    tracing::warn!(resp_code = reply.header.resp_code, "kernel returned an error");
                }
                emit(config.output, &reply)?;
            } else {
                for msg in decode_stream(buf, cfg)? {
                    emit(config.output, &msg)?;
                }
            }
        }
        Command::Replay { file } => replay(&config, &file).await?,
    }

    Ok(())
}

fn decode_stream(buf: Vec<u8>, cfg: ProtocolConfig) -> anyhow::Result<Vec<SandeshMessage>> {
    let mut p = SandeshProtocol::with_config(MemoryBuffer::from_bytes(buf), cfg);
    let mut msgs = Vec::new();
    while !p.transport().is_empty() {
        msgs.push(SandeshMessage::read(&mut p)?);
    }
    tracing::debug!("decoded {} structs", msgs.len());
    Ok(msgs)
}

fn emit<T: Serialize>(format: OutputFormat, value: &T) -> anyhow::Result<()> {
    let line = match format {
        OutputFormat::Json => serde_json::to_string(value)?,
        OutputFormat::Pretty => serde_json::to_string_pretty(value)?,
    };
    let mut out = std::io::stdout().lock();
    writeln!(out, "{line}")?;
    Ok(())
}

async fn replay(config: &Config, path: &Path) -> anyhow::Result<()> {
    let reader = BufReader::new(std::fs::File::open(path)?);

    // ── Channels ──────────────────────────────────────────────────────
    let (event_tx, event_rx) = mpsc::channel::<Vec<u8>>(config.channel_capacity);
    let (record_tx, mut record_rx) = mpsc::channel::<TraceRecord>(config.channel_capacity);

    // ── Tracer ────────────────────────────────────────────────────────
    let args = Arc::new(ArgStore::new());
    let tracer = Tracer::new(args.clone());
    let stats = tracer.stats();
    let consumer = tokio::spawn(async move {
        tracer.run(event_rx, record_tx).await;
    });

    // ── Output Task ───────────────────────────────────────────────────
    let output = config.output;
    let printer = tokio::spawn(async move {
        while let Some(record) = record_rx.recv().await {
            if let Err(e) = emit(output, &record) {
                tracing::error!("failed to write record: {}", e);
                break;
            }
        }
    });

    // ── Producer ──────────────────────────────────────────────────────
    let stop = Arc::new(AtomicBool::new(false));
    let mut hangup = signal(SignalKind::hangup())?;
    tokio::select! {
        res = tracer::replay(reader, args.clone(), event_tx, stop.clone()) => {
            let sent = res?;
            tracing::info!("replayed {} events from {}", sent, path.display());
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, draining queued events");
        }
        _ = hangup.recv() => {
            tracing::info!("hangup received, draining queued events");
        }
    }
    // The reader exits before its next frame and drops the sender.
    stop.store(true, Ordering::Relaxed);

    consumer.await?;
    printer.await?;

    tracing::info!(
        events = stats.events.load(Ordering::Relaxed),
        decoded = stats.decoded.load(Ordering::Relaxed),
        undecoded = stats.undecoded.load(Ordering::Relaxed),
        rejected = stats.rejected.load(Ordering::Relaxed),
        unclaimed_args = args.len(),
        "replay finished"
    );
    Ok(())
}
