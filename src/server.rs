//! HTTP boundary: translates render requests into pipeline calls.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{error, info};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;

use crate::grid::Grid;
use crate::render::Renderer;

#[derive(Debug, Deserialize)]
struct RenderRequest {
    grid: Vec<Vec<String>>,
}

/// Handle to a running render server.
pub struct RenderServer {
    port: u16,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl RenderServer {
    /// Bind the given port (0 picks a free one) and serve until shutdown.
    pub async fn start(renderer: Arc<Renderer>, port: u16) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        let port = listener.local_addr()?.port();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let app = Router::new()
            .route("/", get(banner_handler))
            .route("/render", post(render_handler))
            .with_state(renderer);

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        info!("renderer listening on port {}", port);

        Ok(Self {
            port,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Shutdown the server gracefully.
    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// GET / - liveness banner.
async fn banner_handler() -> &'static str {
    "GridShot renderer OK"
}

/// POST /render - composite a grid of image URLs into one PNG.
///
/// Grid-shape problems are the caller's fault and come back as 400 with a
/// structured reason. Everything else (fetch, surface, capture) is reported
/// generically as 500; the cause is logged server-side only.
async fn render_handler(
    State(renderer): State<Arc<Renderer>>,
    Json(request): Json<RenderRequest>,
) -> Response {
    let grid = match Grid::from_rows(request.grid) {
        Ok(grid) => grid,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() })))
                .into_response();
        }
    };

    match renderer.render(&grid).await {
        Ok(png) => ([(header::CONTENT_TYPE, "image/png")], png).into_response(),
        Err(e) if e.is_client_fault() => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response()
        }
        Err(e) => {
            error!("render failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "render failed" })),
            )
                .into_response()
        }
    }
}
