use std::collections::HashMap;

/// Compact per-room owner id stored in every painted cell. Tags are handed out
/// by the player directory and never reused inside a room, so cells left
/// behind by a departed player stay attributable to nobody current.
pub type OwnerTag = u32;

const UNOWNED: OwnerTag = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellChange {
    pub x: u32,
    pub y: u32,
    pub owner: Option<OwnerTag>,
}

#[derive(Clone, Debug)]
pub struct CanvasStore {
    width: u32,
    height: u32,
    cells: Vec<OwnerTag>,
}

impl CanvasStore {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![UNOWNED; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn reset(&mut self) {
        self.cells.fill(UNOWNED);
    }

    pub fn owner_at(&self, x: i64, y: i64) -> Option<OwnerTag> {
        let idx = self.index(x, y)?;
        match self.cells[idx] {
            UNOWNED => None,
            owner => Some(owner),
        }
    }

    /// Brush stroke: claims the circular footprint of `brush_size` around the
    /// center. Cells held by another owner for which `is_protected` answers
    /// true are left alone.
    pub fn paint(
        &mut self,
        owner: OwnerTag,
        cx: f64,
        cy: f64,
        brush_size: u32,
        is_protected: impl Fn(OwnerTag) -> bool,
    ) -> Vec<CellChange> {
        let radius = brush_size / 2;
        let mut changed = Vec::new();
        self.for_each_in_circle(cx, cy, radius, |cells, idx, x, y| {
            let current = cells[idx];
            if current == owner {
                return;
            }
            if current != UNOWNED && is_protected(current) {
                return;
            }
            cells[idx] = owner;
            changed.push(CellChange {
                x,
                y,
                owner: Some(owner),
            });
        });
        changed
    }

    /// Bomb fill: claims the whole circle regardless of shields.
    pub fn fill_circle(&mut self, owner: OwnerTag, cx: f64, cy: f64, radius: u32) -> Vec<CellChange> {
        self.paint(owner, cx, cy, radius * 2, |_| false)
    }

    /// Eraser: returns every owned cell in the circle to unowned, except the
    /// cells held by `protected_owner`.
    pub fn clear_circle(
        &mut self,
        cx: f64,
        cy: f64,
        radius: u32,
        protected_owner: OwnerTag,
    ) -> Vec<CellChange> {
        let mut changed = Vec::new();
        self.for_each_in_circle(cx, cy, radius, |cells, idx, x, y| {
            let current = cells[idx];
            if current == UNOWNED || current == protected_owner {
                return;
            }
            cells[idx] = UNOWNED;
            changed.push(CellChange { x, y, owner: None });
        });
        changed
    }

    /// Full scan; meant for the once-per-second score tick.
    pub fn ownership_counts(&self) -> HashMap<OwnerTag, u32> {
        let mut counts = HashMap::new();
        for &owner in &self.cells {
            if owner != UNOWNED {
                *counts.entry(owner).or_insert(0) += 1;
            }
        }
        counts
    }

    pub fn owned_cell_count(&self) -> usize {
        self.cells.iter().filter(|&&owner| owner != UNOWNED).count()
    }

    fn index(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    fn for_each_in_circle(
        &mut self,
        cx: f64,
        cy: f64,
        radius: u32,
        mut visit: impl FnMut(&mut [OwnerTag], usize, u32, u32),
    ) {
        if !cx.is_finite() || !cy.is_finite() {
            return;
        }
        let cx = cx.floor() as i64;
        let cy = cy.floor() as i64;
        let r = i64::from(radius);
        let r2 = r * r;
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy > r2 {
                    continue;
                }
                let (px, py) = (cx + dx, cy + dy);
                let Some(idx) = self.index(px, py) else {
                    continue;
                };
                visit(&mut self.cells, idx, px as u32, py as u32);
            }
        }
    }
}
