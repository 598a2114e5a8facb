use crate::cli::Cli;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tupisec::config::Config;
use tupisec::output;
use tupisec::scanner::{ProgressMode, Scanner};
use tupisec::utils;

pub async fn run_from_cli(cli: Cli) -> anyhow::Result<()> {
    // Logs go to stderr so --json-stdout and --progress stay parseable.
    // External crates are pinned to warn to keep the output readable.
    use tracing_subscriber::EnvFilter;
    let crate_level = if cli.quiet { "error" } else { "info" };
    let filter_str = format!(
        "tupisec={crate},reqwest=warn,hyper=warn,h2=warn,hickory_resolver=warn,hickory_proto=warn",
        crate = crate_level
    );
    let env_filter = EnvFilter::try_new(&filter_str).unwrap_or_else(|_| EnvFilter::new(crate_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(true)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if cli.full {
        tracing::debug!("--full is the default scan mode");
    }

    // Ctrl-C cancels between phases; the finding store stays consistent.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, finishing current phase");
                cancel.cancel();
            }
        });
    }

    let mut scanner = Scanner::new(&cli.url, cli.cookies.as_deref(), Config::default(), cancel)?;

    tracing::info!("starting full scan of {}", cli.url);
    let mode = if cli.progress {
        ProgressMode::JsonLines
    } else if cli.quiet || cli.json_stdout {
        ProgressMode::Silent
    } else {
        ProgressMode::Bar
    };
    scanner.run_full_scan(mode).await;

    let report = output::build_report(&scanner.state, &scanner.findings);

    if cli.json_stdout {
        println!("{}", serde_json::to_string(&report)?);
        return Ok(());
    }

    let text = output::render_text(&scanner.state, &scanner.findings);
    let out_path = match cli.output {
        Some(path) => PathBuf::from(path),
        None => {
            let dir = Path::new("reports");
            utils::ensure_dir(dir)?;
            let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
            dir.join(format!("{}_{}.txt", scanner.state.host.replace(':', "_"), stamp))
        }
    };
    std::fs::write(&out_path, &text)?;
    let json_path = out_path.with_extension("json");
    std::fs::write(&json_path, serde_json::to_string_pretty(&report)?)?;

    tracing::info!("report saved to {}", out_path.display());
    tracing::info!("JSON report saved to {}", json_path.display());
    Ok(())
}
