//! Helpers shared by the unit tests.

use axum::Router;

/// Serve `app` on an ephemeral loopback port and return its base URL
/// (with a trailing slash).
pub async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/")
}
