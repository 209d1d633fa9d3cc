//! Liveness endpoint for uptime monitors: every path answers 200 with a fixed body.

use axum::Router;
use tokio::net::TcpListener;

pub const ALIVE_BODY: &str = "✅ Mention bot is alive and running!";

async fn alive() -> &'static str {
    ALIVE_BODY
}

pub fn router() -> Router {
    Router::new().fallback(alive)
}

/// Bind `0.0.0.0:port` and serve until the process exits.
pub async fn serve(port: u16) -> std::io::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    log::info!("🌐 Keep-alive listening on port {}", port);
    serve_on(listener).await
}

pub async fn serve_on(listener: TcpListener) -> std::io::Result<()> {
    axum::serve(listener, router()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_any_path_is_alive() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve_on(listener));

        for path in ["/", "/health"] {
            let response = reqwest::get(format!("http://{}{}", addr, path)).await.unwrap();
            assert_eq!(response.status(), reqwest::StatusCode::OK);
            assert_eq!(response.text().await.unwrap(), ALIVE_BODY);
        }
    }
}
