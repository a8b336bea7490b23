//! Tests for the HTTP boundary.
//!
//! Shape validation happens before any fetch or engine work, so every
//! rejection test here runs without Chrome installed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use gridshot::{RenderServer, Renderer, RendererConfig};

async fn start_server() -> (Arc<Renderer>, RenderServer, String) {
    let renderer = Arc::new(Renderer::new(RendererConfig::default()).unwrap());
    let server = RenderServer::start(renderer.clone(), 0).await.unwrap();
    let base = format!("http://127.0.0.1:{}", server.port());
    (renderer, server, base)
}

#[tokio::test]
async fn health_banner_responds() {
    let (_renderer, server, base) = start_server().await;

    let response = reqwest::get(&base).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "GridShot renderer OK");

    server.shutdown();
}

#[tokio::test]
async fn malformed_grids_are_client_errors_with_no_side_effects() {
    let (renderer, server, base) = start_server().await;
    let client = reqwest::Client::new();

    let cases = [
        serde_json::json!({ "grid": [] }),
        serde_json::json!({ "grid": [[], []] }),
        serde_json::json!({ "grid": [["http://host/a.png"], []] }),
        serde_json::json!({ "grid": [
            ["http://host/a.png", "http://host/b.png"],
            ["http://host/c.png"]
        ] }),
    ];

    for body in &cases {
        let response = client
            .post(format!("{base}/render"))
            .json(body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400, "body: {body}");

        let reason: serde_json::Value = response.json().await.unwrap();
        assert!(
            reason["error"].as_str().unwrap().contains("invalid grid"),
            "reason: {reason}"
        );
    }

    // Rejected requests never reached the cache or the engine.
    assert!(renderer.cache().is_empty());
    assert_eq!(renderer.pool().launch_count(), 0);
    assert_eq!(renderer.pool().open_contexts(), 0);

    server.shutdown();
}

#[tokio::test]
async fn non_array_bodies_are_client_errors() {
    let (_renderer, server, base) = start_server().await;
    let client = reqwest::Client::new();

    for body in ["{\"grid\": \"nope\"}", "{\"grid\": 3}", "{}", "[1,2,3]"] {
        let response = client
            .post(format!("{base}/render"))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap();
        assert!(
            response.status().is_client_error(),
            "body {body} gave {}",
            response.status()
        );
    }

    server.shutdown();
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn render_endpoint_returns_png_bytes() {
    let (_renderer, server, base) = start_server().await;

    // Local fixture serving one tile.
    let mut tile = Vec::new();
    image::RgbaImage::new(1, 1)
        .write_to(&mut std::io::Cursor::new(&mut tile), image::ImageFormat::Png)
        .unwrap();
    let assets = tiny_http::Server::http("127.0.0.1:0").unwrap();
    let asset_addr = assets.server_addr();
    let served = Arc::new(AtomicUsize::new(0));
    let served_count = served.clone();
    std::thread::spawn(move || {
        for request in assets.incoming_requests() {
            served_count.fetch_add(1, Ordering::SeqCst);
            let _ = request.respond(tiny_http::Response::from_data(tile.clone()));
        }
    });

    let tile_url = format!("http://{asset_addr}/tile.png");
    let response = reqwest::Client::new()
        .post(format!("{base}/render"))
        .json(&serde_json::json!({ "grid": [[tile_url.clone(), tile_url]] }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "image/png"
    );
    let png = response.bytes().await.unwrap();
    assert_eq!(&png[0..8], b"\x89PNG\r\n\x1a\n");
    assert_eq!(served.load(Ordering::SeqCst), 1);

    server.shutdown();
}
