use std::path::PathBuf;
use anyhow::{Context, Result};
use clap::Parser;
use url::Url;

const FALLBACK_FILE_NAME: &str = "download.bin";

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CliArgs {
    /// Direct URL of the resource to download
    pub url: Url,

    /// Destination file, defaults to the download directory plus the URL's file name
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// JSON file with download tunables
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub user_agent: Option<String>,

    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    pub fn destination(&self) -> Result<PathBuf> {
        if let Some(output) = &self.output {
            return Ok(output.clone());
        }

        let dir = dirs::download_dir()
            .or_else(|| std::env::current_dir().ok())
            .context("No download directory available, pass --output")?;

        Ok(dir.join(file_name_of(&self.url)))
    }
}

fn file_name_of(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .unwrap_or(FALLBACK_FILE_NAME)
        .to_string()
}
