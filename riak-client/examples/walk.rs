//! Fetch an object, show its siblings and walk its links.
//!
//! ```text
//! cargo run -p riak-client --example walk -- --bucket people --key sean --walk people,friend,_
//! ```

use clap::{Arg, ArgAction, Command};
use riak_client::{Client, ClientConfig, GetOptions, WalkTerm};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let matches = Command::new("riak-walk")
        .version("0.1.0")
        .about("Fetch a Riak object and follow its links")
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Riak node host")
                .default_value("127.0.0.1"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .value_name("PORT")
                .help("Riak HTTP port")
                .value_parser(clap::value_parser!(u16))
                .default_value("8098"),
        )
        .arg(Arg::new("bucket").long("bucket").value_name("BUCKET").required(true))
        .arg(Arg::new("key").long("key").value_name("KEY").required(true))
        .arg(
            Arg::new("walk")
                .long("walk")
                .value_name("BUCKET,TAG,KEEP")
                .help("Walk hop; repeat for several hops")
                .action(ArgAction::Append),
        )
        .get_matches();

    let host = matches.get_one::<String>("host").cloned().unwrap_or_default();
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8098);
    let bucket = matches.get_one::<String>("bucket").cloned().unwrap_or_default();
    let key = matches.get_one::<String>("key").cloned().unwrap_or_default();

    let client = Client::new(ClientConfig::new(host, port))?;
    match client.detect_server_version().await {
        Ok(version) => info!("Connected to Riak {}", version),
        Err(e) => warn!("Could not detect server version: {}", e),
    }

    let object = client
        .bucket(bucket)
        .with_allow_mult(true)
        .get(&key, GetOptions::default())
        .await?;
    info!("Loaded {:?}", object);
    for (i, sibling) in object.siblings()?.iter().enumerate() {
        info!("sibling {}: {:?}", i, sibling.data());
    }

    let hops: Vec<WalkTerm> = matches
        .get_many::<String>("walk")
        .into_iter()
        .flatten()
        .flat_map(|hop| hop.split(',').map(|t| WalkTerm::from(t.to_string())).collect::<Vec<_>>())
        .collect();
    if hops.is_empty() {
        return Ok(());
    }

    for (i, group) in object.walk(hops).await?.into_iter().enumerate() {
        info!("hop {}: {} objects", i, group.len());
        for found in group {
            info!("  {} -> {:?}", found.url(), found.data());
        }
    }
    Ok(())
}
