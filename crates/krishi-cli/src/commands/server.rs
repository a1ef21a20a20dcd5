//! `krishi server` — Start the Krishi HTTP backend server.

pub async fn run(
    host: String,
    port: u16,
    flows_dir: Option<String>,
    model_config: Option<String>,
) -> Result<(), String> {
    let config = krishi_server::ServerConfig {
        host: host.clone(),
        port,
        flows_dir,
        model_config,
    };

    println!("Starting Krishi server on {}:{}...", host, port);

    let addr = krishi_server::start_server(config).await?;
    println!("Krishi server listening on http://{}", addr);

    // Keep the process running until interrupted
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to listen for Ctrl+C: {}", e))?;

    println!("\nShutting down...");
    Ok(())
}
