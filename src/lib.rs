//! GridShot
//!
//! An HTTP service that composites a rectangular grid of small images
//! (identified by URL) into a single transparent PNG, rendered by a shared
//! headless Chrome instance driven over the Chrome DevTools Protocol.
//!
//! # Design
//!
//! - **Warm engine**: one browser process per service process, launched
//!   lazily by the first render and reused by every later one. Each request
//!   paints in its own isolated tab.
//! - **Asset cache**: image URLs resolve to inline `data:` URIs exactly
//!   once; repeat renders of the same tiles never refetch.
//! - **Deterministic sizing**: cell, gap, and pixel density derive from the
//!   grid's row count, dropping to a compact tier when the output would
//!   grow past a fixed height.
//!
//! # Example
//!
//! ```no_run
//! use gridshot::{Grid, Renderer, RendererConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let renderer = Renderer::new(RendererConfig::default())?;
//! let grid = Grid::from_rows(vec![vec!["https://example.com/tile.png".to_string()]])?;
//! let png = renderer.render(&grid).await?;
//! std::fs::write("grid.png", png)?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod assets;
pub mod grid;
pub mod layout;
pub mod render;
pub mod server;
pub mod surface;

pub use grid::Grid;
pub use render::Renderer;
pub use server::RenderServer;

/// Configuration for the renderer
///
/// The defaults match the service's production posture: sandboxed engine,
/// two-second image settle budget, ten-second bounds on asset fetches and
/// individual engine calls.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// User agent sent with asset fetches
    pub user_agent: String,
    /// Timeout for a single asset fetch, in milliseconds
    pub fetch_timeout_ms: u64,
    /// In-page budget for embedded images to finish decoding, in milliseconds
    pub image_settle_ms: u64,
    /// Timeout for a single engine protocol call, in milliseconds
    pub cdp_timeout_ms: u64,
    /// Whether the engine runs sandboxed. Disable only in containers whose
    /// kernel forbids the Chrome sandbox.
    pub sandbox: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 GridShot/0.1"
                .to_string(),
            fetch_timeout_ms: 10_000,
            image_settle_ms: 2_000,
            cdp_timeout_ms: 10_000,
            sandbox: true,
        }
    }
}

/// Viewport dimensions in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}
