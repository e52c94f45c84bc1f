//! station-finder CLI entry point
//!
//! Finds railway stations near a position or by name

use station_finder::cli;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
