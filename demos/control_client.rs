//! Example control API client
//!
//! This demonstrates how an external application drives a running
//! mcp-control server. Start one first with `mcp-control start`.

use mcp_control::client::ControlClient;
use mcp_control::control::CommandRequest;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let port = std::env::args()
        .nth(1)
        .map(|arg| arg.parse::<u16>())
        .transpose()?
        .unwrap_or(8080);

    let client = ControlClient::new("127.0.0.1", port)?;
    println!("Connecting to {}", client.base_url());

    // Example 1: Get status
    println!("\n--- Getting status ---");
    let status = client.status().await?;
    println!("Response: {}", serde_json::to_string(&status)?);

    // Example 2: Create an asset
    println!("\n--- Adding a PrintString node ---");
    let reply = client
        .send(&CommandRequest::new("PrintString", "/Game/MyAsset"))
        .await?;
    println!("Response: {}", serde_json::to_string(&reply)?);

    // Example 3: Unsupported action, reported in-band
    println!("\n--- Adding an unsupported node ---");
    let reply = client
        .send(&CommandRequest::new("Branch", "/Game/MyAsset"))
        .await?;
    println!("Response: {}", serde_json::to_string(&reply)?);

    Ok(())
}
