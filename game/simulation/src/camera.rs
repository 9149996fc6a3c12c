use common::*;

/// On-screen bounds of the canvas the simulation is rendered into, in page/client coordinates
/// (§4.10 "mandatory for correctness under page scroll/resize").
#[derive(Debug, Clone, Copy)]
pub struct CanvasRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl CanvasRect {
    pub fn contains(&self, sx: f32, sy: f32) -> bool {
        sx >= self.left
            && sx <= self.left + self.width
            && sy >= self.top
            && sy <= self.top + self.height
    }
}

/// `(x, y, scale)` in world units (§4.10).
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub x: f32,
    pub y: f32,
    pub scale: f32,
}

impl Camera {
    pub fn new(x: f32, y: f32, scale: f32) -> Self {
        Self { x, y, scale }
    }

    /// `canvas_rect` is mandatory: a caller that fakes one up accepts inaccurate projection
    /// under page scroll/resize (§4.10).
    pub fn screen_to_world(&self, sx: f32, sy: f32, canvas_rect: CanvasRect) -> Point2 {
        let canvas_x = sx - canvas_rect.left;
        let canvas_y = sy - canvas_rect.top;
        Point2::new(canvas_x / self.scale + self.x, canvas_y / self.scale + self.y)
    }

    pub fn world_to_screen(&self, wx: f32, wy: f32, canvas_rect: CanvasRect) -> (f32, f32) {
        let canvas_x = (wx - self.x) * self.scale;
        let canvas_y = (wy - self.y) * self.scale;
        (canvas_x + canvas_rect.left, canvas_y + canvas_rect.top)
    }

    pub fn zoom_by(&mut self, factor: f32, min_scale: f32, max_scale: f32) {
        self.scale = (self.scale * factor).clamp(min_scale, max_scale);
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.x += dx / self.scale;
        self.y += dy / self.scale;
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect() -> CanvasRect {
        CanvasRect {
            left: 100.0,
            top: 50.0,
            width: 800.0,
            height: 600.0,
        }
    }

    #[test]
    fn screen_to_world_subtracts_canvas_offset_then_scales() {
        let cam = Camera::new(0.0, 0.0, 1.0);
        let world = cam.screen_to_world(300.0, 250.0, rect());
        assert_eq!(world, Point2::new(200.0, 200.0));
    }

    #[test]
    fn round_trip_is_identity_within_epsilon() {
        let cam = Camera::new(13.0, -42.0, 2.5);
        let original = (321.4_f32, 88.8_f32);
        let world = cam.screen_to_world(original.0, original.1, rect());
        let (sx, sy) = cam.world_to_screen(world.x, world.y, rect());
        assert!((sx - original.0).abs() < 1e-3);
        assert!((sy - original.1).abs() < 1e-3);
    }

    #[test]
    fn boundary_example_from_spec() {
        // canvas_rect.left = 100, top = 100 (page scrolled); click at (150, 100) with camera at
        // origin, scale 1 maps to world (50, 0) (§8 boundary behaviors)
        let cam = Camera::new(0.0, 0.0, 1.0);
        let canvas = CanvasRect {
            left: 100.0,
            top: 100.0,
            width: 800.0,
            height: 600.0,
        };
        let world = cam.screen_to_world(150.0, 100.0, canvas);
        assert_eq!(world, Point2::new(50.0, 0.0));
    }
}
