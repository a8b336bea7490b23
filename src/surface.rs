//! The shared rendering surface and its per-request contexts.
//!
//! One headless Chrome instance serves the whole process. It is launched
//! lazily by the first render and kept warm afterwards; every render opens
//! its own isolated tab against it and closes that tab when done. The
//! underlying CDP calls are blocking, so they run on the blocking thread
//! pool and the rest of the crate talks to this module through async fns.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::{Emulation, Page, DOM};
use headless_chrome::{Browser, LaunchOptions};
use log::{debug, info, warn};
use tokio::sync::OnceCell;
use tokio::task;

use crate::{Error, RendererConfig, Result, Viewport};

// Waits in-page until every pending image has fired load or error, bounded
// by the settle budget. Images that were already complete never register a
// listener, so an all-cached document resolves immediately.
const IMAGE_SETTLE_SCRIPT: &str = r#"(async function () {
    const pending = Array.from(document.images).filter((img) => !img.complete);
    if (pending.length === 0) return 0;
    await new Promise((resolve) => {
        const timer = setTimeout(resolve, {{BUDGET_MS}});
        let left = pending.length;
        const done = () => { if (--left === 0) { clearTimeout(timer); resolve(); } };
        for (const img of pending) {
            img.addEventListener('load', done, { once: true });
            img.addEventListener('error', done, { once: true });
        }
    });
    return pending.length;
})()"#;

/// The single warm engine instance.
struct Surface {
    browser: Browser,
}

impl Surface {
    fn launch(sandbox: bool) -> Result<Surface> {
        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(sandbox)
            // The crate reaps an idle browser after 30s by default; this
            // instance must outlive arbitrary gaps between requests.
            .idle_browser_timeout(Duration::from_secs(315_360_000))
            .build()
            .map_err(|e| Error::SurfaceStart(format!("failed to build launch options: {}", e)))?;

        let browser = Browser::new(options)
            .map_err(|e| Error::SurfaceStart(format!("failed to launch browser: {}", e)))?;

        Ok(Surface { browser })
    }
}

/// Manages the shared engine instance and hands out per-request contexts.
///
/// The first `acquire` launches the engine through a single-flight guard:
/// concurrent first callers all await the same launch and observe its
/// outcome, so exactly one browser process is ever started per attempt. A
/// failed launch leaves the guard empty and a later request retries.
pub struct SurfacePool {
    surface: OnceCell<Surface>,
    launch_attempts: AtomicUsize,
    open_contexts: Arc<AtomicUsize>,
    sandbox: bool,
    cdp_timeout_ms: u64,
}

impl SurfacePool {
    pub fn new(config: &RendererConfig) -> Self {
        Self {
            surface: OnceCell::new(),
            launch_attempts: AtomicUsize::new(0),
            open_contexts: Arc::new(AtomicUsize::new(0)),
            sandbox: config.sandbox,
            cdp_timeout_ms: config.cdp_timeout_ms,
        }
    }

    /// Open an isolated rendering context against the shared instance,
    /// launching the instance first if this is the first render ever.
    pub async fn acquire(&self) -> Result<RenderContext> {
        let surface = self.surface.get_or_try_init(|| self.launch()).await?;

        let browser = surface.browser.clone();
        let timeout = Duration::from_millis(self.cdp_timeout_ms);
        let tab = task::spawn_blocking(move || -> Result<Arc<Tab>> {
            let tab = browser
                .new_tab()
                .map_err(|e| Error::SurfaceStart(format!("failed to open context: {}", e)))?;
            tab.set_default_timeout(timeout);
            Ok(tab)
        })
        .await
        .map_err(|e| Error::SurfaceStart(format!("context task failed: {}", e)))??;

        let open = self.open_contexts.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("opened rendering context ({} now open)", open);

        Ok(RenderContext {
            tab,
            open_contexts: self.open_contexts.clone(),
            released: false,
        })
    }

    /// Close a context and free its resources. The shared instance itself
    /// is never closed here.
    pub async fn release(&self, context: RenderContext) -> Result<()> {
        context.close().await
    }

    async fn launch(&self) -> Result<Surface> {
        self.launch_attempts.fetch_add(1, Ordering::SeqCst);
        let sandbox = self.sandbox;
        let surface = task::spawn_blocking(move || Surface::launch(sandbox))
            .await
            .map_err(|e| Error::SurfaceStart(format!("launch task failed: {}", e)))??;
        info!("rendering surface launched");
        Ok(surface)
    }

    /// Number of engine launches attempted so far (at most one per failed
    /// predecessor; exactly one over the lifetime of a healthy process).
    pub fn launch_count(&self) -> usize {
        self.launch_attempts.load(Ordering::SeqCst)
    }

    /// Number of contexts currently open. Returns to zero between requests;
    /// anything else after quiescence is a leak.
    pub fn open_contexts(&self) -> usize {
        self.open_contexts.load(Ordering::SeqCst)
    }
}

/// A short-lived, isolated rendering context owned by exactly one request.
///
/// Must be closed on every exit path. Explicit close (via
/// [`SurfacePool::release`]) reports failures; if the owning future is
/// dropped first, the `Drop` guard closes the tab best-effort from a
/// detached thread so aborted requests cannot leak contexts.
pub struct RenderContext {
    tab: Arc<Tab>,
    open_contexts: Arc<AtomicUsize>,
    released: bool,
}

impl RenderContext {
    /// Load a composed document and wait for its structure to settle.
    ///
    /// The document travels as a base64 `data:` navigation, so no server
    /// round trip is involved and navigation completion means DOM
    /// construction is done.
    pub async fn load_document(&self, html: &str) -> Result<()> {
        let url = format!("data:text/html;base64,{}", STANDARD.encode(html));
        let tab = self.tab.clone();
        task::spawn_blocking(move || -> Result<()> {
            tab.navigate_to(&url)
                .map_err(|e| Error::Capture(format!("navigation failed: {}", e)))?;
            tab.wait_until_navigated()
                .map_err(|e| Error::Capture(format!("document did not settle: {}", e)))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Capture(format!("load task failed: {}", e)))?
    }

    /// Wait until every embedded image has reported load or error, bounded
    /// by `budget_ms`. Whichever comes first wins; a timeout is not an
    /// error, the capture simply proceeds with what has decoded.
    pub async fn wait_for_images(&self, budget_ms: u64) -> Result<()> {
        let script = IMAGE_SETTLE_SCRIPT.replace("{{BUDGET_MS}}", &budget_ms.to_string());
        let tab = self.tab.clone();
        task::spawn_blocking(move || {
            tab.evaluate(&script, true)
                .map_err(|e| Error::Capture(format!("image settle wait failed: {}", e)))
        })
        .await
        .map_err(|e| Error::Capture(format!("settle task failed: {}", e)))??;
        Ok(())
    }

    /// Capture a transparent-background PNG of the exact `size` region at
    /// the given pixel density.
    pub async fn capture(&self, size: Viewport, scale: f64) -> Result<Vec<u8>> {
        let tab = self.tab.clone();
        task::spawn_blocking(move || -> Result<Vec<u8>> {
            tab.call_method(Emulation::SetDefaultBackgroundColorOverride {
                color: Some(DOM::RGBA {
                    r: 0,
                    g: 0,
                    b: 0,
                    a: Some(0.0),
                }),
            })
            .map_err(|e| Error::Capture(format!("background override failed: {}", e)))?;

            let clip = Page::Viewport {
                x: 0.0,
                y: 0.0,
                width: size.width as f64,
                height: size.height as f64,
                scale,
            };
            tab.capture_screenshot(
                Page::CaptureScreenshotFormatOption::Png,
                None,
                Some(clip),
                true,
            )
            .map_err(|e| Error::Capture(format!("screenshot failed: {}", e)))
        })
        .await
        .map_err(|e| Error::Capture(format!("capture task failed: {}", e)))?
    }

    async fn close(mut self) -> Result<()> {
        self.released = true;
        self.open_contexts.fetch_sub(1, Ordering::SeqCst);
        let tab = self.tab.clone();
        task::spawn_blocking(move || {
            tab.close(true)
                .map_err(|e| Error::Capture(format!("failed to close context: {}", e)))
        })
        .await
        .map_err(|e| Error::Capture(format!("close task failed: {}", e)))??;
        Ok(())
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.open_contexts.fetch_sub(1, Ordering::SeqCst);
        let tab = self.tab.clone();
        std::thread::spawn(move || {
            if let Err(e) = tab.close(true) {
                warn!("abandoned rendering context failed to close: {}", e);
            }
        });
    }
}
