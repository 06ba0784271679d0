// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pointer drag sessions.
//!
//! A [`DragController`] converts raw screen movement into absolute logical
//! positions. Movement is recorded on every pointer move but only delivered
//! once per display frame, when the host drives [`DragController::frame`].

use crate::geometry::Point;
use crate::input::PointerButton;
use std::cell::Cell;
use std::rc::Rc;

/// Shared, read-only view of the current zoom factor
#[derive(Debug, Clone)]
pub struct ZoomHandle(Rc<Cell<f64>>);

impl ZoomHandle {
    /// Create a handle holding `zoom`
    pub fn new(zoom: f64) -> Self {
        Self(Rc::new(Cell::new(zoom)))
    }

    /// Current zoom
    pub fn get(&self) -> f64 {
        self.0.get()
    }

    /// Update the zoom seen by every clone
    pub fn set(&self, zoom: f64) {
        self.0.set(zoom);
    }
}

impl Default for ZoomHandle {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// Drag session state machine
#[derive(Debug, Clone)]
pub struct DragController {
    zoom: ZoomHandle,
    /// Position computed from the latest pointer move
    position: Point,
    /// Position last delivered to the frame callback
    delivered: Point,
    /// Logical position at press time
    origin: Point,
    /// Screen point at press time
    press_point: Point,
    dragging: bool,
    scheduled: bool,
}

impl DragController {
    /// Create an idle controller
    pub fn new(initial: Point, zoom: ZoomHandle) -> Self {
        Self {
            zoom,
            position: initial,
            delivered: initial,
            origin: initial,
            press_point: Point::ZERO,
            dragging: false,
            scheduled: false,
        }
    }

    /// Begin a drag. Returns false when the press is ignored (right button or
    /// a session is already running).
    pub fn press(&mut self, button: PointerButton, screen: Point, current: Point) -> bool {
        if button == PointerButton::Secondary || self.dragging {
            return false;
        }
        self.dragging = true;
        self.scheduled = true;
        self.press_point = screen;
        self.origin = current;
        self.position = current;
        self.delivered = current;
        true
    }

    /// Record a pointer move
    pub fn pointer_move(&mut self, button: PointerButton, screen: Point) {
        if button == PointerButton::Secondary || !self.dragging {
            return;
        }
        let delta = (screen - self.press_point).scale_down(self.zoom.get());
        self.position = self.origin + delta;
    }

    /// End the drag. The next frame flushes any pending move and stops.
    pub fn release(&mut self, button: PointerButton) {
        if button == PointerButton::Secondary {
            return;
        }
        self.dragging = false;
    }

    /// Advance one display frame. Returns the new logical position when the
    /// pointer moved since the previous frame.
    pub fn frame(&mut self) -> Option<Point> {
        if !self.scheduled {
            return None;
        }
        if !self.dragging {
            self.scheduled = false;
        }
        if self.position == self.delivered {
            return None;
        }
        self.delivered = self.position;
        Some(self.position)
    }

    /// [`frame`](Self::frame) with a callback instead of a return value
    pub fn on_frame(&mut self, mut on_move: impl FnMut(Point)) {
        if let Some(p) = self.frame() {
            on_move(p);
        }
    }

    /// Whether a session is running
    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Whether the frame loop is still scheduled
    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    /// Stop any session and the frame loop
    pub fn destroy(&mut self) {
        self.dragging = false;
        self.scheduled = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drag_divides_by_zoom() {
        let zoom = ZoomHandle::new(2.0);
        let mut drag = DragController::new(Point::ZERO, zoom);
        assert!(drag.press(PointerButton::Primary, Point::new(10.0, 10.0), Point::new(100.0, 100.0)));
        drag.pointer_move(PointerButton::Primary, Point::new(50.0, 30.0));
        assert_eq!(drag.frame(), Some(Point::new(120.0, 110.0)));
    }

    #[test]
    fn test_moves_coalesce_per_frame() {
        let mut drag = DragController::new(Point::ZERO, ZoomHandle::default());
        drag.press(PointerButton::Primary, Point::ZERO, Point::ZERO);
        drag.pointer_move(PointerButton::Primary, Point::new(1.0, 0.0));
        drag.pointer_move(PointerButton::Primary, Point::new(5.0, 0.0));
        let mut seen = Vec::new();
        drag.on_frame(|p| seen.push(p));
        drag.on_frame(|p| seen.push(p));
        assert_eq!(seen, vec![Point::new(5.0, 0.0)]);
    }

    #[test]
    fn test_release_flushes_then_stops() {
        let mut drag = DragController::new(Point::ZERO, ZoomHandle::default());
        drag.press(PointerButton::Primary, Point::ZERO, Point::ZERO);
        drag.pointer_move(PointerButton::Primary, Point::new(3.0, 4.0));
        drag.release(PointerButton::Primary);
        assert!(drag.is_scheduled());
        assert_eq!(drag.frame(), Some(Point::new(3.0, 4.0)));
        assert!(!drag.is_scheduled());
        drag.pointer_move(PointerButton::Primary, Point::new(9.0, 9.0));
        assert_eq!(drag.frame(), None);
    }

    #[test]
    fn test_right_button_ignored() {
        let mut drag = DragController::new(Point::ZERO, ZoomHandle::default());
        assert!(!drag.press(PointerButton::Secondary, Point::ZERO, Point::ZERO));
        assert!(!drag.is_dragging());

        drag.press(PointerButton::Primary, Point::ZERO, Point::ZERO);
        drag.pointer_move(PointerButton::Secondary, Point::new(7.0, 7.0));
        drag.release(PointerButton::Secondary);
        assert!(drag.is_dragging());
        assert_eq!(drag.frame(), None);
    }

    #[test]
    fn test_second_press_rejected_and_destroy() {
        let mut drag = DragController::new(Point::ZERO, ZoomHandle::default());
        assert!(drag.press(PointerButton::Primary, Point::ZERO, Point::ZERO));
        assert!(!drag.press(PointerButton::Primary, Point::new(1.0, 1.0), Point::ZERO));
        drag.destroy();
        assert!(!drag.is_dragging());
        assert!(!drag.is_scheduled());
    }

    #[test]
    fn test_zoom_is_read_at_move_time() {
        let zoom = ZoomHandle::new(1.0);
        let mut drag = DragController::new(Point::ZERO, zoom.clone());
        drag.press(PointerButton::Primary, Point::ZERO, Point::ZERO);
        zoom.set(4.0);
        drag.pointer_move(PointerButton::Primary, Point::new(8.0, 4.0));
        assert_eq!(drag.frame(), Some(Point::new(2.0, 1.0)));
    }
}
