//! Channel and tag browser
//!
//! Run with: cargo run --example channel_browser <HOST[:PORT]> [PATH] [USER PASS]
//!
//! Examples:
//!   cargo run --example channel_browser tv.local                   # list channels
//!   cargo run --example channel_browser tv.local /tags             # list tags
//!   cargo run --example channel_browser tv.local /tag/abc123       # channels in a tag
//!   cargo run --example channel_browser tv.local / admin secret    # with credentials
//!
//! The server pushes its channel and tag model asynchronously after
//! login, so the browser holds the connection open and polls until the
//! first channels arrive before printing the listing.

use std::time::Duration;

use htsp_rs::auth::StaticCredentials;
use htsp_rs::client::directory;
use htsp_rs::connection::ConnectionRegistry;
use htsp_rs::{ClientConfig, Listing};

fn print_usage() {
    eprintln!("Usage: channel_browser <HOST[:PORT]> [PATH] [USER PASS]");
    eprintln!();
    eprintln!("Paths:");
    eprintln!("  /            list channels (default)");
    eprintln!("  /tags        list tags");
    eprintln!("  /tag/<id>    list the channels of one tag");
}

fn parse_host(arg: &str) -> Result<(String, u16), String> {
    match arg.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .map_err(|_| format!("bad port in {:?}", arg))?;
            Ok((host.to_string(), port))
        }
        None => Ok((arg.to_string(), htsp_rs::protocol::DEFAULT_PORT)),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("htsp_rs=info".parse()?),
        )
        .init();

    let (host, port) = match parse_host(&args[1]) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            std::process::exit(1);
        }
    };
    let path = args.get(2).map(String::as_str).unwrap_or("/");

    let mut config = ClientConfig::new();
    if let (Some(user), Some(pass)) = (args.get(3), args.get(4)) {
        config = config.credentials(StaticCredentials::new(user, pass));
    }

    let registry = ConnectionRegistry::new(config);

    // Pin the connection so the metadata store survives across the
    // wait; browse() below reuses it through the registry pool.
    let conn = registry.acquire(&host, port).await?;
    println!(
        "Connected to {} ({})",
        host,
        conn.server_name().unwrap_or_else(|| "unknown server".into())
    );

    for _ in 0..40 {
        if !conn.meta.channels().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    match directory::browse(&registry, &host, port, path).await? {
        Listing::Channels(channels) => {
            println!("{} channels", channels.len());
            for ch in channels {
                let number = ch.number.map(|n| n.to_string()).unwrap_or_default();
                let name = ch.name.as_deref().unwrap_or("(unnamed)");
                let on_air = ch
                    .current_event
                    .as_ref()
                    .and_then(|e| e.title.as_deref())
                    .unwrap_or("");
                println!("{:>4}  {:<32}  {}", number, name, on_air);
            }
        }
        Listing::Tags(tags) => {
            println!("{} tags", tags.len());
            for tag in tags {
                println!("{:<36}  {:<24}  {} channels", tag.id, tag.title, tag.members.len());
            }
        }
    }

    registry.release(&conn).await;
    Ok(())
}
