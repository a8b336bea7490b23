//! Sizing policy and the pure HTML composer.
//!
//! Composition is deterministic and side-effect-free: the resolved grid is
//! already self-contained (every cell an inline `data:` URI), so the emitted
//! document loads without network access.

use crate::grid::ResolvedGrid;
use crate::Viewport;

/// Tallest output the normal tier may produce, in CSS pixels. Grids that
/// would exceed this drop to the compact tier so downstream consumers with
/// fixed viewports do not crop the raster.
pub const MAX_SURFACE_HEIGHT: u32 = 720;

/// Cell size, gap size, and capture pixel density for one grid render.
///
/// Derived from the grid's row count, never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingPolicy {
    /// Edge length of each square cell, in CSS pixels
    pub cell: u32,
    /// Gap between adjacent cells, in CSS pixels
    pub gap: u32,
    /// Device pixel ratio applied at capture time
    pub scale: f64,
}

impl SizingPolicy {
    pub const NORMAL: SizingPolicy = SizingPolicy {
        cell: 80,
        gap: 6,
        scale: 2.0,
    };

    pub const COMPACT: SizingPolicy = SizingPolicy {
        cell: 40,
        gap: 3,
        scale: 1.0,
    };

    /// Select the tier for a grid with the given row count.
    pub fn for_rows(rows: usize) -> SizingPolicy {
        if Self::NORMAL.span(rows) > MAX_SURFACE_HEIGHT {
            Self::COMPACT
        } else {
            Self::NORMAL
        }
    }

    /// Extent of `count` cells plus the gaps between them, in CSS pixels.
    pub fn span(&self, count: usize) -> u32 {
        let count = count as u32;
        count * self.cell + count.saturating_sub(1) * self.gap
    }

    /// Exact CSS-pixel dimensions of the composed document for a grid shape.
    pub fn surface_size(&self, rows: usize, columns: usize) -> Viewport {
        Viewport {
            width: self.span(columns),
            height: self.span(rows),
        }
    }
}

/// Emit the self-contained markup document for a resolved grid.
///
/// The grid element's pixel dimensions equal the policy's surface size
/// exactly; the background stays transparent and images are scaled
/// hard-edged to preserve pixel-art fidelity.
pub fn compose(grid: &ResolvedGrid, policy: &SizingPolicy) -> String {
    let size = policy.surface_size(grid.row_count(), grid.column_count());

    let cells: String = grid
        .cells()
        .map(|payload| format!("<div class=\"cell\"><img src=\"{payload}\"></div>"))
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<style>
  * {{ box-sizing: border-box; }}
  html, body {{
    margin: 0;
    padding: 0;
    background: transparent;
  }}
  body {{ display: inline-block; }}
  .grid {{
    display: grid;
    grid-template-columns: repeat({columns}, {cell}px);
    gap: {gap}px;
    width: {width}px;
    height: {height}px;
  }}
  .cell {{
    width: {cell}px;
    height: {cell}px;
  }}
  .cell img {{
    width: 100%;
    height: 100%;
    display: block;
    image-rendering: pixelated;
  }}
</style>
</head>
<body>
<div class="grid">{cells}</div>
</body>
</html>
"#,
        columns = grid.column_count(),
        cell = policy.cell,
        gap = policy.gap,
        width = size.width,
        height = size.height,
        cells = cells,
    )
}
