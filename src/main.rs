mod core;
mod transports;

use crate::core::events::BatchEvent;
use crate::core::intake::{FileSource, IntakeError};
use crate::core::model::ItemStatus;
use crate::core::queue::{BatchUploader, StartOutcome};
use crate::core::validator::ValidationPolicy;
use crate::transports::http::{HttpTransport, HttpTransportConfig};
use clap::{Arg, ArgAction, ArgMatches, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;
use uuid::Uuid;

fn build_cli() -> Command {
    let upload = Command::new("upload")
        .about("Upload images to the gallery endpoint")
        .arg(
            Arg::new("paths")
                .help("Files and/or folders to upload (folders are flattened recursively)")
                .action(ArgAction::Append)
                .num_args(1..)
                .required(true),
        )
        .arg(
            Arg::new("endpoint")
                .long("endpoint")
                .help("Upload endpoint URL")
                .required(true)
                .num_args(1),
        )
        .arg(
            Arg::new("category")
                .long("category")
                .help("Gallery category attached to every upload")
                .default_value("gallery")
                .num_args(1),
        )
        .arg(
            Arg::new("concurrency")
                .long("concurrency")
                .help("Max concurrent uploads")
                .default_value("3")
                .num_args(1),
        )
        .arg(
            Arg::new("max_mb")
                .long("max-mb")
                .help("Max file size in MB")
                .default_value("25")
                .num_args(1),
        )
        .arg(
            Arg::new("accept")
                .long("accept")
                .help("Accepted MIME prefix (repeatable)")
                .action(ArgAction::Append)
                .default_value("image/")
                .num_args(1),
        )
        .arg(
            Arg::new("timeout_secs")
                .long("timeout-secs")
                .help("Per-upload timeout in seconds")
                .default_value("60")
                .num_args(1),
        )
        .arg(
            Arg::new("user_agent")
                .long("user-agent")
                .help("HTTP User-Agent")
                .default_value("GalleryUploader/0.1")
                .num_args(1),
        );

    Command::new("gallery-uploader")
        .about("Batch media uploader for the listing gallery (bounded concurrency, pause/stop, retry)")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(upload)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let matches = build_cli().get_matches();
    if let Some(("upload", m)) = matches.subcommand() {
        run_upload(m).await?;
    }
    Ok(())
}

async fn run_upload(m: &ArgMatches) -> anyhow::Result<()> {
    let endpoint: Url = Url::parse(m.get_one::<String>("endpoint").expect("required arg"))?;
    let category = m.get_one::<String>("category").expect("defaulted").clone();
    let concurrency: usize = m.get_one::<String>("concurrency").expect("defaulted").parse()?;
    let max_mb: u64 = m.get_one::<String>("max_mb").expect("defaulted").parse()?;
    let timeout_secs: u64 = m.get_one::<String>("timeout_secs").expect("defaulted").parse()?;
    let user_agent = m.get_one::<String>("user_agent").expect("defaulted").clone();
    let accepts: Vec<String> = m
        .get_many::<String>("accept")
        .expect("defaulted")
        .cloned()
        .collect();
    let paths: Vec<PathBuf> = m
        .get_many::<String>("paths")
        .expect("required arg")
        .map(PathBuf::from)
        .collect();

    let transport = Arc::new(HttpTransport::new(HttpTransportConfig {
        endpoint,
        timeout_secs,
        user_agent,
    }));
    let policy = ValidationPolicy {
        accepted_mime_prefixes: accepts,
        max_bytes: max_mb * 1024 * 1024,
    };
    let uploader = BatchUploader::new(transport, policy, category, concurrency);

    // renderer first, so intake events are already visible
    let ui = spawn_renderer(&uploader);

    let mut files: Vec<PathBuf> = Vec::new();
    for path in paths {
        if tokio::fs::metadata(&path).await?.is_dir() {
            match uploader.add_files(FileSource::Folder(path.clone())).await {
                Ok(_) | Err(IntakeError::NoSupportedFiles) => {}
                Err(e) => return Err(e.into()),
            }
        } else {
            files.push(path);
        }
    }
    if !files.is_empty() {
        match uploader.add_files(FileSource::Files(files)).await {
            Ok(_) | Err(IntakeError::NoSupportedFiles) => {}
            Err(e) => return Err(e.into()),
        }
    }

    if uploader.snapshot().items.is_empty() {
        ui.abort();
        println!("No supported files in the selection.");
        return Ok(());
    }

    match uploader.start() {
        StartOutcome::Started => {}
        StartOutcome::NothingToUpload | StartOutcome::AlreadyActive => {
            ui.abort();
            println!("Nothing to upload.");
            return Ok(());
        }
    }

    // Ctrl-C stops the batch: in-flight uploads are cancelled, items not yet
    // dispatched stay pending and show up in the summary
    {
        let uploader = uploader.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                uploader.stop();
            }
        });
    }

    uploader.wait_idle().await;
    ui.abort();
    let _ = ui.await;

    let state = uploader.snapshot();
    println!();
    println!("Summary:");
    for item in &state.items {
        let line = format!(
            "- {:9} {:>10}  {}{}",
            format!("{:?}", item.status).to_lowercase(),
            fmt_bytes(item.payload.size),
            item.payload.display_name,
            item.error
                .as_deref()
                .map(|e| format!("  ({})", e))
                .unwrap_or_default(),
        );
        println!("{}", line);
    }
    println!(
        "{} completed, {} failed, {} pending, {} paused ({}%)",
        state.summary.completed_count,
        state.summary.failed_count,
        state.summary.pending_count,
        state.summary.paused_count,
        state.summary.overall_progress,
    );

    uploader.dispose();
    Ok(())
}

fn spawn_renderer(uploader: &BatchUploader) -> tokio::task::JoinHandle<()> {
    let mut rx = uploader.subscribe();
    tokio::spawn(async move {
        let mp = MultiProgress::new();
        let sty_bar = ProgressStyle::with_template(
            "{prefix:<30!} {bar:30.cyan/blue} {pos:>3}% {wide_msg}",
        )
        .expect("progress template")
        .progress_chars("=> ");

        let mut bars: HashMap<Uuid, ProgressBar> = HashMap::new();

        loop {
            let evt = match rx.recv().await {
                Ok(e) => e,
                Err(_) => break,
            };

            match evt {
                BatchEvent::ItemAdded { item_id, display_name, status, .. } => {
                    let pb = mp.add(ProgressBar::new(100));
                    pb.set_style(sty_bar.clone());
                    pb.set_prefix(display_name);
                    match status {
                        ItemStatus::Failed => pb.set_message("rejected"),
                        _ => pb.set_message("queued"),
                    }
                    bars.insert(item_id, pb);
                }
                BatchEvent::ItemRemoved { item_id } => {
                    if let Some(pb) = bars.remove(&item_id) {
                        pb.finish_and_clear();
                    }
                }
                BatchEvent::ItemStatusChanged { item_id, status } => {
                    if let Some(pb) = bars.get(&item_id) {
                        match status {
                            ItemStatus::Pending => pb.set_message("queued"),
                            ItemStatus::Uploading => pb.set_message("uploading"),
                            ItemStatus::Paused => {
                                pb.set_position(0);
                                pb.set_message("paused");
                            }
                            ItemStatus::Completed => {
                                pb.set_position(100);
                                pb.finish_with_message("done");
                            }
                            ItemStatus::Failed => pb.finish_with_message("failed"),
                        }
                    }
                }
                BatchEvent::Progress { item_id, pct } => {
                    if let Some(pb) = bars.get(&item_id) {
                        pb.set_position(pct as u64);
                    }
                }
                BatchEvent::SummaryChanged { .. } => {}
                BatchEvent::BatchStarted => {}
                BatchEvent::BatchPaused => {
                    let _ = mp.println("[batch] paused");
                }
                BatchEvent::BatchResumed => {
                    let _ = mp.println("[batch] resumed");
                }
                BatchEvent::BatchStopped => {
                    let _ = mp.println("[batch] stopped");
                }
                BatchEvent::BatchFinished { summary } => {
                    let _ = mp.println(format!(
                        "[batch] finished: {} completed, {} failed",
                        summary.completed_count, summary.failed_count
                    ));
                    break;
                }
                BatchEvent::Error { scope, message } => {
                    let _ = mp.println(format!("[ERR] {}: {}", scope, message));
                }
                BatchEvent::Info { scope, message } => {
                    let _ = mp.println(format!("[INFO] {}: {}", scope, message));
                }
            }
        }
    })
}

fn fmt_bytes(n: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    const GB: f64 = 1024.0 * 1024.0 * 1024.0;
    let f = n as f64;
    if f >= GB {
        format!("{:.2}GiB", f / GB)
    } else if f >= MB {
        format!("{:.2}MiB", f / MB)
    } else if f >= KB {
        format!("{:.2}KiB", f / KB)
    } else {
        format!("{}B", n)
    }
}
