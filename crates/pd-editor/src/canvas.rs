//! Canvas viewport state: zoom and pan.

pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 5.0;
/// Multiplicative step for zoom in/out.
pub const ZOOM_STEP: f64 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasState {
    zoom: f64,
    pan_x: f64,
    pan_y: f64,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
        }
    }
}

impl CanvasState {
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn pan(&self) -> (f64, f64) {
        (self.pan_x, self.pan_y)
    }

    /// Set the zoom factor, clamped to `MIN_ZOOM..=MAX_ZOOM`. Non-finite
    /// input is ignored. Returns whether the state changed.
    pub fn set_zoom(&mut self, zoom: f64) -> bool {
        if !zoom.is_finite() {
            return false;
        }
        let zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        if zoom == self.zoom {
            return false;
        }
        self.zoom = zoom;
        true
    }

    pub fn zoom_in(&mut self) -> bool {
        self.set_zoom(self.zoom * ZOOM_STEP)
    }

    pub fn zoom_out(&mut self) -> bool {
        self.set_zoom(self.zoom / ZOOM_STEP)
    }

    /// Back to 100% and no offset.
    pub fn reset(&mut self) -> bool {
        let changed = *self != Self::default();
        *self = Self::default();
        changed
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) -> bool {
        if !(dx.is_finite() && dy.is_finite()) || (dx == 0.0 && dy == 0.0) {
            return false;
        }
        self.pan_x += dx;
        self.pan_y += dy;
        true
    }
}
