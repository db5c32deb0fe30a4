// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! apireq CLI - API requests with a persistent cookie jar
//!
//! Fetches a URL through an [`ApiRequestContext`], optionally starting from and
//! saving to a storage state file.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};

use apireq::{ApiRequestContext, ContextOptions, StorageState, StorageStateOptions};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("apireq=info".parse().expect("static directive")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    let result = match args[1].as_str() {
        "fetch" => match FetchArgs::parse(&args[2..]) {
            Ok(fetch) => fetch_url(fetch).await,
            Err(e) => {
                eprintln!("{}", e);
                eprintln!("Usage: apireq fetch <url> [--state <file>] [--save-state <file>]");
                return ExitCode::from(1);
            }
        },
        "state" => {
            if args.len() < 3 {
                eprintln!("Usage: apireq state <file>");
                return ExitCode::from(1);
            }
            show_state(&args[2]).await
        }
        "--help" | "-h" | "help" => {
            print_usage();
            return ExitCode::SUCCESS;
        }
        "--version" | "-v" | "version" => {
            println!("apireq {}", apireq::VERSION);
            return ExitCode::SUCCESS;
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            return ExitCode::from(1);
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn print_usage() {
    println!(
        r#"apireq - API requests sharing cookies with a browser session

USAGE:
    apireq <COMMAND> [OPTIONS]

COMMANDS:
    fetch <url>     Fetch a URL and print status, headers and body
    state <file>    Validate and pretty-print a storage state file
    help            Show this help message
    version         Show version information

FETCH OPTIONS:
    --state <file>       Load cookies from a storage state file first
    --save-state <file>  Save cookies to a storage state file afterwards

EXAMPLES:
    apireq fetch https://example.com/login --save-state auth.json
    apireq fetch https://example.com/profile --state auth.json
    apireq state auth.json
"#
    );
}

#[derive(Debug)]
struct FetchArgs {
    url: String,
    state: Option<PathBuf>,
    save_state: Option<PathBuf>,
}

impl FetchArgs {
    fn parse(args: &[String]) -> anyhow::Result<Self> {
        let mut url = None;
        let mut state = None;
        let mut save_state = None;

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--state" => {
                    state = Some(PathBuf::from(iter.next().context("--state needs a file")?));
                }
                "--save-state" => {
                    save_state = Some(PathBuf::from(
                        iter.next().context("--save-state needs a file")?,
                    ));
                }
                flag if flag.starts_with("--") => bail!("Unknown option: {}", flag),
                value => {
                    if url.replace(value.to_string()).is_some() {
                        bail!("Only one URL may be given");
                    }
                }
            }
        }

        Ok(Self {
            url: url.context("Missing URL")?,
            state,
            save_state,
        })
    }
}

async fn fetch_url(args: FetchArgs) -> anyhow::Result<()> {
    let mut options = ContextOptions::new();
    if let Some(ref path) = args.state {
        options = options.storage_state_path(path);
    }

    let context = ApiRequestContext::new(options)
        .await
        .context("Failed to create request context")?;

    let response = context
        .get(args.url.as_str())
        .await
        .with_context(|| format!("Failed to fetch {}", args.url))?;

    println!("=== Response ===");
    println!("Status: {} {}", response.status(), response.status_text());
    println!("URL: {}", response.url());

    println!("\n=== Headers ===");
    for (name, value) in response.headers_array() {
        println!("{}: {}", name, value);
    }

    let body = response.body()?;
    println!("\n=== Body ({} bytes) ===", body.len());
    println!("{}", String::from_utf8_lossy(&body));

    if let Some(ref path) = args.save_state {
        context
            .storage_state(StorageStateOptions::new().path(path))
            .await
            .with_context(|| format!("Failed to save storage state to {}", path.display()))?;
        println!("\nSaved {} cookies to {}", context.cookies().all().len(), path.display());
    }

    context.dispose();
    Ok(())
}

async fn show_state(path: &str) -> anyhow::Result<()> {
    let state = StorageState::load(path)
        .await
        .with_context(|| format!("Failed to load storage state from {}", path))?;

    println!("=== Cookies ({}) ===", state.cookies.len());
    for cookie in &state.cookies {
        let expires = cookie
            .expires
            .map(|e| e.to_rfc3339())
            .unwrap_or_else(|| "session".to_string());
        println!(
            "  - {}={} (domain: {}, path: {}, expires: {})",
            cookie.name, cookie.value, cookie.domain, cookie.path, expires
        );
    }

    println!("\n=== Origins ({}) ===", state.origins.len());
    for origin in &state.origins {
        println!("  {} ({} items)", origin.origin, origin.local_storage.len());
        for item in &origin.local_storage {
            println!("    - {}={}", item.name, item.value);
        }
    }

    println!("\n{}", state.to_json()?);
    Ok(())
}
