//! The render orchestrator: one call from validated grid to PNG bytes.

use futures::future::try_join_all;
use log::{debug, warn};

use crate::assets::AssetCache;
use crate::grid::{Grid, ResolvedGrid};
use crate::layout::{compose, SizingPolicy};
use crate::surface::{RenderContext, SurfacePool};
use crate::{RendererConfig, Result, Viewport};

/// Owns the process-wide caches and drives the render pipeline.
///
/// The asset cache and surface pool live here rather than as module
/// globals, so tests can build isolated renderers and observe their state.
pub struct Renderer {
    cache: AssetCache,
    pool: SurfacePool,
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> anyhow::Result<Self> {
        Ok(Self {
            cache: AssetCache::new(&config)?,
            pool: SurfacePool::new(&config),
            config,
        })
    }

    /// Render a validated grid to PNG bytes.
    ///
    /// Resolves every cell through the asset cache (all fetches in flight at
    /// once, row-major order preserved), composes the document, then paints
    /// it in a freshly acquired context. The context is released on every
    /// exit path; a failure in any step fails this one request with no
    /// retries.
    pub async fn render(&self, grid: &Grid) -> Result<Vec<u8>> {
        let cells = try_join_all(grid.cells().map(|url| self.cache.resolve(url))).await?;
        let resolved = ResolvedGrid::new(grid, cells);

        let policy = SizingPolicy::for_rows(grid.row_count());
        let size = policy.surface_size(grid.row_count(), grid.column_count());
        let html = compose(&resolved, &policy);
        debug!(
            "rendering {}x{} grid at {}x{} css px, scale {}",
            grid.row_count(),
            grid.column_count(),
            size.width,
            size.height,
            policy.scale
        );

        let context = self.pool.acquire().await?;
        let painted = self.paint(&context, &html, size, policy.scale).await;
        if let Err(e) = self.pool.release(context).await {
            warn!("failed to release rendering context: {}", e);
        }
        painted
    }

    async fn paint(
        &self,
        context: &RenderContext,
        html: &str,
        size: Viewport,
        scale: f64,
    ) -> Result<Vec<u8>> {
        context.load_document(html).await?;
        context.wait_for_images(self.config.image_settle_ms).await?;
        context.capture(size, scale).await
    }

    pub fn cache(&self) -> &AssetCache {
        &self.cache
    }

    pub fn pool(&self) -> &SurfacePool {
        &self.pool
    }
}
