use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;

use watchtrail::{
    cli::{Cli, Command, OutputFormat, QueryArgs, WatchArgs},
    config::WatchtrailConfig,
    export::CsvExporter,
    mail::MailNotifier,
    store::{EventStore, StoredEvent},
    EventKind, FileMonitor, MonitorEvent,
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.setup_logging();

    let config = WatchtrailConfig::load_or_default(cli.config.as_deref())?;
    if let Err(err) = config.validate() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }

    match &cli.command {
        Command::Watch(args) => run_watch(args, &config),
        Command::Query(args) => run_query(args, &config),
    }
}

fn run_watch(args: &WatchArgs, config: &WatchtrailConfig) -> Result<()> {
    let monitor = FileMonitor::new()?;

    let extension = args
        .extension
        .clone()
        .unwrap_or_else(|| config.monitor.extension.clone());
    if !extension.is_empty() {
        monitor.set_extension_filter(extension);
    }

    for path in &args.paths {
        monitor
            .add_root(path)
            .with_context(|| format!("cannot watch {}", path.display()))?;
        tracing::info!("watching: {}", path.display());
    }

    let db_path = args
        .db
        .clone()
        .unwrap_or_else(|| config.database.path.clone().into());
    let store = EventStore::open(&db_path)?;

    monitor.start();

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let flush_interval = config.monitor.flush_interval();
    let mut last_flush = Instant::now();
    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
        if last_flush.elapsed() < flush_interval {
            continue;
        }
        flush(&monitor, &store, args)?;
        last_flush = Instant::now();
        if !monitor.is_running() {
            // The loop exits on its own when the watch set empties.
            tracing::warn!("monitor stopped, exiting");
            break;
        }
    }

    monitor.stop();
    flush(&monitor, &store, args)?;
    tracing::info!("{} events in {}", store.count()?, db_path.display());
    Ok(())
}

/// Moves accumulated events out of the sink and into the database,
/// echoing each to stdout on the way.
fn flush(monitor: &FileMonitor, store: &EventStore, args: &WatchArgs) -> Result<()> {
    let batch = monitor.events().drain();
    if batch.is_empty() {
        return Ok(());
    }
    for event in &batch {
        print_event(event, args.output, args.no_color)?;
    }
    store.insert_batch(&batch)?;
    Ok(())
}

fn print_event(event: &MonitorEvent, output: OutputFormat, no_color: bool) -> Result<()> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string(event)?),
        OutputFormat::Compact => {
            let prefix = match event.kind {
                EventKind::Created => "C",
                EventKind::Modified => "M",
                EventKind::Deleted => "D",
            };
            println!("{} {}", prefix, event.path().display());
        }
        OutputFormat::Text => {
            let time = event.timestamp.format("%H:%M:%S");
            if no_color {
                println!("[{}] {} {}", time, event.kind, event.path().display());
            } else {
                let color = match event.kind {
                    EventKind::Created => "\x1b[32m",  // Green
                    EventKind::Modified => "\x1b[33m", // Yellow
                    EventKind::Deleted => "\x1b[31m",  // Red
                };
                println!(
                    "[{}] {}{}\x1b[0m {}",
                    time,
                    color,
                    event.kind,
                    event.path().display()
                );
            }
        }
    }
    Ok(())
}

fn run_query(args: &QueryArgs, config: &WatchtrailConfig) -> Result<()> {
    if args.email.is_some() && args.export.is_none() {
        bail!("--email requires --export (the exported file is what gets mailed)");
    }

    let db_path = args
        .db
        .clone()
        .unwrap_or_else(|| config.database.path.clone().into());
    let store = EventStore::open(&db_path)?;

    let filter = args.to_filter()?;
    let results = store.search(&filter)?;
    print_results(&results);

    if let Some(export_path) = &args.export {
        CsvExporter::default().export(&results, export_path)?;
        println!("Exported {} events to {}", results.len(), export_path.display());

        if let Some(address) = &args.email {
            let notifier = MailNotifier::new(config.mail.clone(), address.clone())?;
            notifier.send_report(export_path)?;
            println!("Report mailed to {}", address);
        }
    }

    Ok(())
}

fn print_results(results: &[StoredEvent]) {
    for stored in results {
        let event = &stored.event;
        println!(
            "{:>6}  {}  {:<8}  {}",
            stored.id,
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            event.kind,
            event.path().display()
        );
    }
    println!("{} event(s)", results.len());
}
