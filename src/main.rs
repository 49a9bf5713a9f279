use std::process::ExitCode;
use anyhow::Result;
use clap::Parser;
use log::{error, LevelFilter};
use turbo_downloader::download::logger::setup_logger;
use turbo_downloader::{DownloadConfig, DownloadRequest, DownloadState, Downloader};
use crate::cli::CliArgs;
use crate::progress_bar::ProgressBar;

mod cli;
mod progress_bar;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    match run(args).await {
        Ok(code) => code,
        Err(err) => {
            error!("{:#}", err);
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: CliArgs) -> Result<ExitCode> {
    let level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Warn };
    setup_logger(level, args.log_file.as_deref())?;

    let config = match &args.config {
        Some(path) => DownloadConfig::load_from_file(path)?,
        None => DownloadConfig::default(),
    };

    let mut request = DownloadRequest::new(args.url.clone(), args.destination()?);
    if let Some(user_agent) = &args.user_agent {
        request = request.with_user_agent(user_agent.clone());
    }

    let downloader = Downloader::new(reqwest::Client::new(), config);
    let mut handle = downloader.download(request)?;

    let cancel_token = handle.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_token.cancel();
        }
    });

    let mut bar = ProgressBar::new(100);
    let mut terminal = None;
    while let Some(state) = handle.recv().await {
        match &state {
            DownloadState::Progress { .. } | DownloadState::Merging { .. } => bar.print(&state)?,
            DownloadState::Success { .. } | DownloadState::Error { .. } => terminal = Some(state),
        }
    }
    println!();

    let code = match terminal {
        Some(DownloadState::Success { path }) => {
            println!("Downloaded to {}", path.display());
            ExitCode::SUCCESS
        }
        Some(DownloadState::Error { message }) => {
            eprintln!("Download failed: {}", message);
            ExitCode::FAILURE
        }
        _ => {
            eprintln!("Download cancelled");
            ExitCode::from(130)
        }
    };

    Ok(code)
}
