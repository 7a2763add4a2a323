
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use vigil_fim::config::Config;
use vigil_fim::fim::{self, CheckStatus};
use vigil_fim::store::BaselineStore;

#[derive(Parser, Debug)]
#[command(name = "vigil_fim", about = "File Integrity Monitor with CSV baseline & JSONL audit")]
struct Cli {
    /// New file to add to the integrity monitoring list; omit to verify
    /// every file already in the baseline
    #[arg(short = 'f', long = "file")]
    file: Option<PathBuf>,

    /// TOML config file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<String>,

    /// Baseline store location (overrides config)
    #[arg(long)]
    store: Option<String>,

    /// JSONL audit output for the verification pass
    #[arg(long)]
    jsonl: Option<PathBuf>,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env()
            .add_directive(level.into()))
        .with_target(false)
        .compact()
        .init();

    let mut cfg = match &cli.config {
        Some(p) => Config::load(p)?,
        None => Config::default(),
    };
    if let Some(store) = cli.store {
        cfg.store_path = store;
    }
    let store = BaselineStore::new(&cfg.store_path);

    match cli.file {
        // registration: unreadable file or unwritable store is fatal
        Some(path) => {
            let record = fim::register(&cfg, &store, &path)?;
            println!("[+] now monitoring: {}", record.path);
        }
        // verification pass: drift is reported, never a process failure
        None => {
            let reports = fim::check_all(&cfg, &store, cli.jsonl.as_deref())?;
            let mut secure = 0usize;
            let mut not_secure = 0usize;
            let mut unreadable = 0usize;
            for report in &reports {
                match &report.status {
                    CheckStatus::Secure => {
                        secure += 1;
                        println!("[+] integrity secure: {}", report.path);
                    }
                    CheckStatus::NotSecure { last_valid } => {
                        not_secure += 1;
                        println!("[-] integrity not secure: {}", report.path);
                        println!("[-] last valid integrity check: {}", last_valid);
                    }
                    CheckStatus::Unreadable { .. } => {
                        unreadable += 1;
                        println!("[-] Could not open file: {}", report.path);
                    }
                }
            }
            println!("Summary -> secure: {secure}, not secure: {not_secure}, unreadable: {unreadable}");
        }
    }
    Ok(())
}
