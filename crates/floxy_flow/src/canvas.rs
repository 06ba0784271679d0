// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pan/zoom surface and drop target.

use crate::config::{clamp_zoom, FlowOptions};
use crate::drag::{DragController, ZoomHandle};
use crate::events::{Emitter, ListenerId};
use crate::geometry::Point;
use crate::input::PointerButton;
use crate::node::NodeConfig;
use tracing::{debug, error};

/// Canvas notifications
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasEvent {
    /// Zoom changed through the wheel
    Zoomed {
        /// New zoom
        zoom: f64,
        /// Pan x
        x: f64,
        /// Pan y
        y: f64,
        /// Requested step
        delta: f64,
    },
    /// Pan offset changed
    Panned {
        /// Pan x
        x: f64,
        /// Pan y
        y: f64,
    },
    /// A palette item was dropped; the config position is container-relative
    /// minus pan and still needs re-centering
    NodeDropped(NodeConfig),
}

/// Data carried by a drop gesture
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropPayload {
    /// View module
    pub module: String,
    /// View group
    pub group: String,
    /// View name
    pub name: String,
    /// Label, empty for none
    pub label: String,
    /// JSON text for the node payload, empty for none
    pub data: String,
}

/// Canvas state: zoom, pan and the background drag
#[derive(Debug)]
pub struct Canvas {
    zoom: ZoomHandle,
    pan: Point,
    min_zoom: f64,
    max_zoom: f64,
    zoom_step: f64,
    drag: DragController,
    events: Emitter<CanvasEvent>,
}

impl Canvas {
    /// Create a canvas from options, writing the initial zoom into `zoom`
    pub fn new(options: &FlowOptions, zoom: ZoomHandle) -> Self {
        zoom.set(options.clamp_zoom(options.zoom));
        Self {
            zoom,
            pan: options.canvas,
            min_zoom: options.min_zoom,
            max_zoom: options.max_zoom,
            zoom_step: options.zoom_step,
            // Panning works in screen pixels
            drag: DragController::new(options.canvas, ZoomHandle::new(1.0)),
            events: Emitter::new(),
        }
    }

    /// Current zoom
    pub fn zoom(&self) -> f64 {
        self.zoom.get()
    }

    /// Shared zoom handle
    pub fn zoom_handle(&self) -> &ZoomHandle {
        &self.zoom
    }

    /// Current pan offset
    pub fn pan(&self) -> Point {
        self.pan
    }

    /// Set the zoom, clamped to the configured bounds
    pub fn set_zoom(&mut self, zoom: f64) {
        self.apply_zoom(zoom);
        self.events.emit(CanvasEvent::Zoomed {
            zoom: self.zoom.get(),
            x: self.pan.x,
            y: self.pan.y,
            delta: 0.0,
        });
    }

    fn apply_zoom(&mut self, zoom: f64) {
        self.zoom.set(clamp_zoom(zoom, self.min_zoom, self.max_zoom));
    }

    /// Set the pan offset
    pub fn set_pan(&mut self, pan: Point) {
        self.pan = pan;
        self.events.emit(CanvasEvent::Panned { x: pan.x, y: pan.y });
    }

    /// Apply one wheel notch. Scrolling down zooms out.
    pub fn wheel(&mut self, delta_y: f64) -> f64 {
        let delta = if delta_y > 0.0 {
            -self.zoom_step
        } else {
            self.zoom_step
        };
        self.apply_zoom(self.zoom.get() + delta);
        let zoom = self.zoom.get();
        debug!("Wheel zoom {} -> {}", delta_y, zoom);
        self.events.emit(CanvasEvent::Zoomed {
            zoom,
            x: self.pan.x,
            y: self.pan.y,
            delta,
        });
        zoom
    }

    /// Container-relative screen point to logical canvas units
    pub fn screen_to_logical(&self, screen: Point) -> Point {
        (screen - self.pan).scale_down(self.zoom.get())
    }

    /// Logical canvas point to container-relative screen point
    pub fn logical_to_screen(&self, logical: Point) -> Point {
        let zoom = self.zoom.get();
        Point::new(logical.x * zoom + self.pan.x, logical.y * zoom + self.pan.y)
    }

    /// Start panning from a background press
    pub fn press(&mut self, button: PointerButton, screen: Point) -> bool {
        self.drag.press(button, screen, self.pan)
    }

    /// Record a pointer move for the pan drag
    pub fn pointer_move(&mut self, button: PointerButton, screen: Point) {
        self.drag.pointer_move(button, screen);
    }

    /// End the pan drag
    pub fn release(&mut self, button: PointerButton) {
        self.drag.release(button);
    }

    /// Whether a pan drag is running
    pub fn is_panning(&self) -> bool {
        self.drag.is_dragging()
    }

    /// Apply the pan drag for this frame
    pub fn frame(&mut self) {
        if let Some(pan) = self.drag.frame() {
            self.set_pan(pan);
        }
    }

    /// Handle a drop at a container-relative point. Returns whether a node
    /// drop was emitted.
    pub fn drop_payload(&mut self, payload: &DropPayload, screen: Point) -> bool {
        if payload.module.is_empty() || payload.group.is_empty() || payload.name.is_empty() {
            return false;
        }
        let data = if payload.data.is_empty() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            match serde_json::from_str(&payload.data) {
                Ok(data) => data,
                Err(err) => {
                    error!("Invalid drop data for {}: {}", payload.name, err);
                    return false;
                }
            }
        };
        let mut config = NodeConfig::new(&payload.name)
            .with_namespace(&payload.module, &payload.group)
            .with_position(screen.x - self.pan.x, screen.y - self.pan.y);
        if !payload.label.is_empty() {
            config.label = Some(payload.label.clone());
        }
        config.data = data;
        debug!("Node dropped: {} at ({}, {})", config.triple(), config.x, config.y);
        self.events.emit(CanvasEvent::NodeDropped(config));
        true
    }

    /// Subscribe to canvas events
    pub fn on(&mut self, listener: impl FnMut(&CanvasEvent) + 'static) -> ListenerId {
        self.events.on(listener)
    }

    /// Unsubscribe
    pub fn off(&mut self, id: ListenerId) -> bool {
        self.events.off(id)
    }

    /// Take queued events
    pub fn drain_events(&mut self) -> Vec<CanvasEvent> {
        self.events.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas() -> Canvas {
        Canvas::new(&FlowOptions::default(), ZoomHandle::default())
    }

    #[test]
    fn test_wheel_steps_and_clamps() {
        let mut canvas = canvas();
        canvas.wheel(-1.0);
        assert!((canvas.zoom() - 1.1).abs() < 1e-9);
        for _ in 0..50 {
            canvas.wheel(1.0);
        }
        assert_eq!(canvas.zoom(), 0.1);
        for _ in 0..50 {
            canvas.wheel(-1.0);
        }
        assert_eq!(canvas.zoom(), 3.0);
        match canvas.drain_events().first() {
            Some(CanvasEvent::Zoomed { delta, .. }) => assert_eq!(*delta, 0.1),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_pan_drag_ignores_zoom() {
        let mut canvas = canvas();
        canvas.set_zoom(2.0);
        assert_eq!(
            canvas.drain_events(),
            vec![CanvasEvent::Zoomed {
                zoom: 2.0,
                x: 0.0,
                y: 0.0,
                delta: 0.0
            }]
        );
        assert!(canvas.press(PointerButton::Primary, Point::new(10.0, 10.0)));
        canvas.pointer_move(PointerButton::Primary, Point::new(30.0, 50.0));
        canvas.release(PointerButton::Primary);
        canvas.frame();
        assert_eq!(canvas.pan(), Point::new(20.0, 40.0));
        assert_eq!(canvas.drain_events(), vec![CanvasEvent::Panned { x: 20.0, y: 40.0 }]);
        assert_eq!(canvas.screen_to_logical(Point::new(60.0, 80.0)), Point::new(20.0, 20.0));
        assert_eq!(canvas.logical_to_screen(Point::new(20.0, 20.0)), Point::new(60.0, 80.0));
    }

    #[test]
    fn test_drop_payload() {
        let mut canvas = canvas();
        canvas.set_pan(Point::new(50.0, 0.0));
        canvas.drain_events();

        let mut payload = DropPayload {
            module: "diagram".to_string(),
            group: "workflow".to_string(),
            name: "action".to_string(),
            label: "Send".to_string(),
            data: r#"{"retries": 3}"#.to_string(),
        };
        assert!(canvas.drop_payload(&payload, Point::new(250.0, 100.0)));
        match canvas.drain_events().pop() {
            Some(CanvasEvent::NodeDropped(config)) => {
                assert_eq!((config.x, config.y), (200.0, 100.0));
                assert_eq!(config.label.as_deref(), Some("Send"));
                assert_eq!(config.data["retries"], 3);
            }
            other => panic!("unexpected event {:?}", other),
        }

        payload.data = "{not json".to_string();
        assert!(!canvas.drop_payload(&payload, Point::ZERO));
        payload.data.clear();
        payload.group.clear();
        assert!(!canvas.drop_payload(&payload, Point::ZERO));
        assert!(canvas.drain_events().is_empty());
    }
}
