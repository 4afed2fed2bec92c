use mock_server::MockConfig;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let host = std::env::var("MOCK_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let config = MockConfig::from_env();

    let listener = TcpListener::bind((host.as_str(), port)).await?;
    eprintln!(
        "analytics API mock on {} (key {}, throttled key {} resets in {}s)",
        listener.local_addr()?,
        config.auth_key,
        config.throttled_key,
        config.reset_in_secs
    );
    mock_server::run_with(listener, config).await
}
