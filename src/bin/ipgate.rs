//! ipgate: inspect IP lists and try filter configurations from the command line.

use clap::{Parser, Subcommand};
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use ipgate::{Fetcher, Filter, FilterConfig, RefreshContext, Rule, Verdict};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "ipgate")]
#[command(author = "Kaitu.io")]
#[command(version)]
#[command(about = "Check addresses against IP filter rules", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a filter configuration and classify addresses
    Check {
        /// Configuration file (.yaml/.yml/.json or directive format)
        #[arg(short, long)]
        config: PathBuf,

        /// Request header to send along, as NAME:VALUE (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Client addresses, `ip` or `ip:port`
        #[arg(required = true)]
        addresses: Vec<String>,
    },

    /// Resolve sources and print the parsed entries
    List {
        /// Timeout for loading all sources
        #[arg(short, long, default_value = "30s")]
        timeout: String,

        /// Source locations
        #[arg(required = true)]
        sources: Vec<String>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check {
            config,
            headers,
            addresses,
        } => check(&config, &headers, &addresses),
        Commands::List { timeout, sources } => list(&timeout, &sources),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn check(
    config_path: &Path,
    header_args: &[String],
    addresses: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let config = FilterConfig::load(config_path)?;
    let filter = Filter::new(config)?;
    filter.refresher().initialize()?;

    let policy = filter.policy();
    println!(
        "trust X-Forwarded-For: {}, trust X-Real-IP: {}",
        policy.trust_x_forwarded_for, policy.trust_x_real_ip
    );

    for rule in filter.rules() {
        println!(
            "{} {:?}: {} addresses, {} networks",
            rule.action(),
            rule.locations(),
            rule.ip_count(),
            rule.network_count()
        );
    }

    let headers = parse_headers(header_args)?;
    for address in addresses {
        let remote = match address.parse::<IpAddr>() {
            Ok(ip) => SocketAddr::new(ip, 0).to_string(),
            Err(_) => address.clone(),
        };
        let verdict = match filter.classify(&headers, &remote) {
            Verdict::Allow => "allow",
            Verdict::Deny => "deny",
            Verdict::InvalidInput => "invalid",
        };
        println!("{}\t{}", address, verdict);
    }
    Ok(())
}

fn list(timeout: &str, sources: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let timeout: Duration = ipgate::config::parse_duration(timeout)?;
    let fetcher = Fetcher::new()?;
    let rule = Rule::allow(sources.iter().cloned());
    rule.refresh(&fetcher, &RefreshContext::detached(timeout))?;

    let snapshot = rule.snapshot();
    let mut ips: Vec<&str> = snapshot.ips().collect();
    ips.sort_unstable();
    for ip in ips {
        println!("{}", ip);
    }
    for network in snapshot.networks() {
        println!("{}", network);
    }
    eprintln!(
        "{} addresses, {} networks",
        snapshot.ip_count(),
        snapshot.network_count()
    );
    Ok(())
}

fn parse_headers(args: &[String]) -> Result<HeaderMap, Box<dyn std::error::Error>> {
    let mut headers = HeaderMap::new();
    for arg in args {
        let (name, value) = arg
            .split_once(':')
            .ok_or_else(|| format!("header {:?} is not NAME:VALUE", arg))?;
        headers.append(
            HeaderName::from_bytes(name.trim().as_bytes())?,
            HeaderValue::from_str(value.trim())?,
        );
    }
    Ok(headers)
}
