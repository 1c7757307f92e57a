//! `flowmend server` — Start the Flowmend HTTP backend server.

pub async fn run(host: String, port: u16) -> Result<(), String> {
    let config = flowmend_server::ServerConfig {
        host: host.clone(),
        port,
    };

    println!("Starting Flowmend server on {}:{}...", host, port);

    let addr = flowmend_server::start_server(config).await?;
    println!("Flowmend server listening on http://{}", addr);

    // Keep the process running until interrupted
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to listen for Ctrl+C: {}", e))?;

    println!("\nShutting down...");
    Ok(())
}
