//! Raw input ingestion and gesture classification (§4.10, §6 "Input event source").

use common::*;

use crate::camera::CanvasRect;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PointerButton {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

/// A raw event as it arrives from the host, in arrival order (§6).
#[derive(Debug, Clone, Copy)]
pub enum RawInputEvent {
    PointerDown {
        button: PointerButton,
        x: f32,
        y: f32,
        modifiers: Modifiers,
        timestamp: f64,
    },
    PointerMove {
        x: f32,
        y: f32,
        timestamp: f64,
    },
    PointerUp {
        button: PointerButton,
        x: f32,
        y: f32,
        timestamp: f64,
    },
    Wheel {
        x: f32,
        y: f32,
        delta_y: f32,
        is_trackpad_guess: bool,
        timestamp: f64,
    },
    Key {
        key: common::input::KeyEvent,
        timestamp: f64,
    },
}

impl RawInputEvent {
    fn screen_xy(&self) -> Option<(f32, f32)> {
        match *self {
            RawInputEvent::PointerDown { x, y, .. }
            | RawInputEvent::PointerMove { x, y, .. }
            | RawInputEvent::PointerUp { x, y, .. }
            | RawInputEvent::Wheel { x, y, .. } => Some((x, y)),
            RawInputEvent::Key { .. } => None,
        }
    }
}

/// A classified gameplay-facing gesture, derived from a stream of [RawInputEvent]s (§4.10).
#[derive(Debug, Clone, Copy)]
pub enum Gesture {
    Tap { world: Point2, modifiers: Modifiers },
    DragStart { world: Point2 },
    DragUpdate { world: Point2 },
    DragEnd { world: Point2, modifiers: Modifiers },
    WheelZoom { world: Point2, delta_y: f32, is_trackpad: bool },
    Pan { dx: f32, dy: f32 },
    PinchZoom { centre_world: Point2, distance_delta: f32 },
    Key(common::input::KeyEvent),
}

/// Tracks in-flight pointer state to turn raw events into [Gesture]s (§4.10 classification
/// rules). One instance per input source; not a specs resource since it's host-session state,
/// not simulation state.
pub struct GestureClassifier {
    drag_threshold_px: f32,
    pinch_threshold_px: f32,
    primary_down_at: Option<(f32, f32)>,
    dragging: bool,
    last_modifiers: Modifiers,
    pinch_last_distance: Option<f32>,
}

impl GestureClassifier {
    pub fn new() -> Self {
        let cfg = config::get();
        Self {
            drag_threshold_px: cfg.input.drag_threshold_px,
            pinch_threshold_px: cfg.input.pinch_threshold_px,
            primary_down_at: None,
            dragging: false,
            last_modifiers: Modifiers::default(),
            pinch_last_distance: None,
        }
    }

    /// Classifies one raw event into zero or one gesture. Events outside `canvas_rect` are
    /// dropped so platform shortcuts and page scrolling keep working (§4.10, §6).
    pub fn classify(
        &mut self,
        event: RawInputEvent,
        camera: &crate::camera::Camera,
        canvas_rect: CanvasRect,
    ) -> Option<Gesture> {
        if let Some((sx, sy)) = event.screen_xy() {
            if !canvas_rect.contains(sx, sy) {
                return None;
            }
        }

        match event {
            RawInputEvent::Key { key, .. } => Some(Gesture::Key(key)),

            RawInputEvent::PointerDown {
                button: PointerButton::Primary,
                x,
                y,
                modifiers,
                ..
            } => {
                self.primary_down_at = Some((x, y));
                self.dragging = false;
                self.last_modifiers = modifiers;
                None
            }

            RawInputEvent::PointerMove { x, y, .. } => {
                if let Some((dx0, dy0)) = self.primary_down_at {
                    let moved = ((x - dx0).powi(2) + (y - dy0).powi(2)).sqrt();
                    if !self.dragging && moved > self.drag_threshold_px {
                        self.dragging = true;
                        let world = camera.screen_to_world(dx0, dy0, canvas_rect);
                        return Some(Gesture::DragStart { world });
                    }
                    if self.dragging {
                        let world = camera.screen_to_world(x, y, canvas_rect);
                        return Some(Gesture::DragUpdate { world });
                    }
                }
                None
            }

            RawInputEvent::PointerUp {
                button: PointerButton::Primary,
                x,
                y,
                ..
            } => {
                let was_dragging = self.dragging;
                let down_at = self.primary_down_at.take();
                self.dragging = false;
                let world = camera.screen_to_world(x, y, canvas_rect);
                if was_dragging {
                    Some(Gesture::DragEnd {
                        world,
                        modifiers: self.last_modifiers,
                    })
                } else if down_at.is_some() {
                    Some(Gesture::Tap {
                        world,
                        modifiers: self.last_modifiers,
                    })
                } else {
                    None
                }
            }

            RawInputEvent::Wheel {
                x,
                y,
                delta_y,
                is_trackpad_guess,
                ..
            } => {
                let world = camera.screen_to_world(x, y, canvas_rect);
                Some(Gesture::WheelZoom {
                    world,
                    delta_y,
                    is_trackpad: is_trackpad_guess,
                })
            }

            // secondary button and other combinations: no gesture assigned yet
            _ => None,
        }
    }

    /// Two-contact pinch/pan tracking (§4.10 "pinch begins when two contacts exist and their
    /// distance changes > 6 px"). Called with the current set of active touch points each frame.
    pub fn classify_contacts(&mut self, contacts: &[(f32, f32)]) -> Option<Gesture> {
        if contacts.len() != 2 {
            self.pinch_last_distance = None;
            return None;
        }

        let (ax, ay) = contacts[0];
        let (bx, by) = contacts[1];
        let distance = ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt();
        let centre_screen = ((ax + bx) / 2.0, (ay + by) / 2.0);

        let gesture = match self.pinch_last_distance {
            Some(last) if (distance - last).abs() > self.pinch_threshold_px => {
                Some(Gesture::PinchZoom {
                    centre_world: Point2::new(centre_screen.0, centre_screen.1),
                    distance_delta: distance - last,
                })
            }
            _ => None,
        };
        self.pinch_last_distance = Some(distance);
        gesture
    }
}

impl Default for GestureClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;

    fn canvas() -> CanvasRect {
        CanvasRect {
            left: 0.0,
            top: 0.0,
            width: 1000.0,
            height: 1000.0,
        }
    }

    #[test]
    fn small_move_is_not_a_drag() {
        config::init_for_testing();
        let mut c = GestureClassifier::new();
        let cam = Camera::default();
        c.classify(
            RawInputEvent::PointerDown {
                button: PointerButton::Primary,
                x: 10.0,
                y: 10.0,
                modifiers: Modifiers::default(),
                timestamp: 0.0,
            },
            &cam,
            canvas(),
        );
        let g = c.classify(
            RawInputEvent::PointerMove {
                x: 11.0,
                y: 10.0,
                timestamp: 1.0,
            },
            &cam,
            canvas(),
        );
        assert!(g.is_none());
    }

    #[test]
    fn move_past_threshold_starts_a_drag() {
        config::init_for_testing();
        let mut c = GestureClassifier::new();
        let cam = Camera::default();
        c.classify(
            RawInputEvent::PointerDown {
                button: PointerButton::Primary,
                x: 10.0,
                y: 10.0,
                modifiers: Modifiers::default(),
                timestamp: 0.0,
            },
            &cam,
            canvas(),
        );
        let g = c.classify(
            RawInputEvent::PointerMove {
                x: 20.0,
                y: 10.0,
                timestamp: 1.0,
            },
            &cam,
            canvas(),
        );
        assert!(matches!(g, Some(Gesture::DragStart { .. })));
    }

    #[test]
    fn events_outside_canvas_are_ignored() {
        config::init_for_testing();
        let mut c = GestureClassifier::new();
        let cam = Camera::default();
        let g = c.classify(
            RawInputEvent::PointerDown {
                button: PointerButton::Primary,
                x: -50.0,
                y: -50.0,
                modifiers: Modifiers::default(),
                timestamp: 0.0,
            },
            &cam,
            canvas(),
        );
        assert!(g.is_none());
    }

    #[test]
    fn tap_without_drag_is_a_tap() {
        config::init_for_testing();
        let mut c = GestureClassifier::new();
        let cam = Camera::default();
        c.classify(
            RawInputEvent::PointerDown {
                button: PointerButton::Primary,
                x: 10.0,
                y: 10.0,
                modifiers: Modifiers::default(),
                timestamp: 0.0,
            },
            &cam,
            canvas(),
        );
        let g = c.classify(
            RawInputEvent::PointerUp {
                button: PointerButton::Primary,
                x: 10.0,
                y: 10.0,
                timestamp: 1.0,
            },
            &cam,
            canvas(),
        );
        assert!(matches!(g, Some(Gesture::Tap { .. })));
    }
}
