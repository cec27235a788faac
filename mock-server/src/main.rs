use mock_server::Store;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "5984".to_string());
    let addr = format!("127.0.0.1:{port}");
    let store = match (std::env::var("COUCHDB_USER"), std::env::var("COUCHDB_PASSWORD")) {
        (Ok(user), Ok(password)) => Store::with_admin(&user, &password),
        _ => Store::default(),
    };
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("listening on {addr}");
    mock_server::run_with_store(listener, store).await
}
