mod cli;
mod config;
mod startup;

use clap::Parser;
use cli::Cli;
use config::PolyglotConfig;
use polyglot_backends::{language_table, LinguaDetector, SsipConnector};
use polyglot_core::{
    arm, connect, prepare_session, termination_signals, PipelineStats, PolyglotError,
    SegmentPipeline, SessionGuard,
};
use startup::Startup;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let table = language_table();
    if cli.list_languages {
        for name in table.names() {
            println!("{}", name);
        }
        return ExitCode::SUCCESS;
    }

    let startup = match PolyglotConfig::load(cli.config.as_deref())
        .and_then(|cfg| Startup::prepare(&cfg.with_cli(&cli), &table))
    {
        Ok(startup) => startup,
        Err(e) => return fail(e.into()),
    };

    match run(startup).await {
        Ok(stats) => {
            info!(
                target: "polyglot",
                lines = stats.lines_read,
                spans = stats.spans_spoken,
                switches = stats.language_switches,
                "Done"
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

async fn run(startup: Startup) -> polyglot_core::Result<PipelineStats> {
    let detector = Arc::new(LinguaDetector::new(&startup.languages));
    let connector = SsipConnector::new(startup.address);
    let session = connect(&connector, startup.retry).await?;

    // From here on every exit path goes through the guard
    let guard = SessionGuard::new(session);
    let signals = match termination_signals() {
        Ok(signals) => signals,
        Err(e) => {
            guard.release("fault").await;
            return Err(PolyglotError::Fault(format!(
                "failed to install signal handlers: {}",
                e
            )));
        }
    };
    let listener = arm(Arc::clone(&guard), signals, |code| {
        std::process::exit(code);
    });

    let session = guard.session();
    let settings = startup.settings;
    let playback_timeout = startup.playback_timeout;
    let result = guard
        .scope(async move {
            prepare_session(session.as_ref(), &settings).await?;
            println!("Enter text to detect language (CTRL+D to exit):");
            SegmentPipeline::new(session, detector)
                .with_playback_timeout(playback_timeout)
                .run(BufReader::new(tokio::io::stdin()))
                .await
                .map_err(PolyglotError::from)
        })
        .await;

    listener.abort();
    result
}

fn fail(e: PolyglotError) -> ExitCode {
    match &e {
        PolyglotError::Terminated(_) => info!(target: "polyglot", code = e.exit_code(), "{}", e),
        _ => error!(target: "polyglot", code = e.exit_code(), "{}", e),
    }
    ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "debug,polyglot_core=debug,polyglot_speak=debug"
    } else {
        "info,polyglot_core=info,polyglot_speak=info"
    };
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
