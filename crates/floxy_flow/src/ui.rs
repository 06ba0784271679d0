// SPDX-License-Identifier: MIT OR Apache-2.0
//! egui host for a [`Flow`].
//!
//! Paints the retained node and path layers and feeds egui input back into
//! the flow:
//! - Pointer press/move/release and double click
//! - Wheel zoom and Escape
//! - Delete through the `removable` command
//! - Inline label editing
//! - Command toolbar for the current selection

use crate::flow::{Flow, FlowEvent};
use crate::geometry::Point;
use crate::input::{Key, PointerButton};
use crate::node::NodeId;
use crate::path::PathDescription;
use crate::render::{NodeElement, NodeShape, PathElement};
use crate::selection::SelectionTarget;
use crate::port::PortDirection;
use egui::{Color32, Pos2, Rect, Shape, Stroke, Vec2};
use tracing::trace;

/// Node body rounding in screen pixels at zoom 1
const NODE_ROUNDING: f32 = 6.0;
const NODE_SHADOW_OFFSET: f32 = 3.0;
const PORT_RADIUS: f32 = 6.0;
const ARROW_SIZE: f32 = 9.0;
/// Samples per curve when flattening paths for painting
const CURVE_SEGMENTS: usize = 24;
const ELLIPSE_SEGMENTS: usize = 48;
const GRID_SPACING: f32 = 20.0;

const BAD_COLOR: Color32 = Color32::from_rgb(220, 70, 70);
const SELECTED_COLOR: Color32 = Color32::from_rgb(100, 150, 255);
const PATH_COLOR: Color32 = Color32::from_rgb(150, 150, 160);

/// Interactive flow editor widget state
pub struct FlowEditorUi {
    /// Draw the background grid
    pub show_grid: bool,
    /// Show the command toolbar for the selection
    pub show_toolbar: bool,
    label_editor: Option<(NodeId, String)>,
    last_pointer: Option<Pos2>,
    status: Option<String>,
}

impl FlowEditorUi {
    /// Create the widget state
    pub fn new() -> Self {
        Self {
            show_grid: true,
            show_toolbar: true,
            label_editor: None,
            last_pointer: None,
            status: None,
        }
    }

    /// Last user-facing message reported by the flow
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Paint `flow` into the available space and route this pass's input to it
    pub fn ui(&mut self, ui: &mut egui::Ui, flow: &mut Flow) {
        let rect = ui.available_rect_before_wrap();
        let response = ui.allocate_rect(rect, egui::Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        flow.queue_events(true);
        self.handle_input(ui, &response, rect, flow);
        flow.frame();
        self.collect_events(flow);

        painter.rect_filled(rect, 0.0, Color32::from_rgb(30, 30, 32));
        if self.show_grid {
            draw_grid(&painter, rect, flow);
        }
        for element in flow.connections().layer().paths() {
            draw_path(&painter, rect, flow, element);
        }
        for element in flow.nodes().layer().nodes() {
            draw_node(&painter, rect, flow, element);
        }

        self.label_editor_ui(ui, rect, flow);
        if self.show_toolbar {
            self.toolbar_ui(ui, rect, flow);
        }
        self.draw_status_bar(&painter, rect, flow);

        if flow.is_drawing() || response.dragged() {
            ui.ctx().request_repaint();
        }
    }

    fn handle_input(&mut self, ui: &egui::Ui, response: &egui::Response, rect: Rect, flow: &mut Flow) {
        let (pointer, pressed, released, double, scroll, escape, delete) = ui.input(|i| {
            let mut pressed = Vec::new();
            let mut released = Vec::new();
            for (egui_button, button) in BUTTONS {
                if i.pointer.button_pressed(egui_button) {
                    pressed.push(button);
                }
                if i.pointer.button_released(egui_button) {
                    released.push(button);
                }
            }
            (
                i.pointer.latest_pos(),
                pressed,
                released,
                i.pointer.button_double_clicked(egui::PointerButton::Primary),
                i.raw_scroll_delta.y,
                i.key_pressed(egui::Key::Escape),
                i.key_pressed(egui::Key::Delete),
            )
        });

        let Some(pos) = pointer else {
            return;
        };
        let local = to_local(rect, pos);

        if response.hovered() {
            for button in pressed {
                flow.pointer_down(button, local);
            }
            if double {
                flow.double_click(local);
            }
            if scroll != 0.0 {
                // egui scrolls positive upwards
                flow.wheel(-f64::from(scroll));
            }
        }
        if self.last_pointer != Some(pos) {
            let button = if ui.input(|i| i.pointer.secondary_down()) {
                PointerButton::Secondary
            } else {
                PointerButton::Primary
            };
            flow.pointer_move(button, local);
            self.last_pointer = Some(pos);
        }
        for button in released {
            flow.pointer_up(button, local);
        }

        if escape {
            self.label_editor = None;
            flow.key_down(Key::Escape);
        }
        if delete && self.label_editor.is_none() && flow.selection().is_some() {
            flow.execute("removable");
        }
    }

    fn collect_events(&mut self, flow: &mut Flow) {
        for event in flow.drain_events() {
            trace!("Flow event: {:?}", event);
            if let FlowEvent::ConnectionRejected { message, .. } = event {
                self.status = Some(message);
            } else if let FlowEvent::DrawingEnded = event {
                self.status = None;
            }
        }
    }

    fn label_editor_ui(&mut self, ui: &mut egui::Ui, rect: Rect, flow: &mut Flow) {
        let Some(editing) = flow.nodes().editing_label() else {
            self.label_editor = None;
            return;
        };
        if self.label_editor.as_ref().map(|(id, _)| *id) != Some(editing) {
            let label = flow
                .nodes()
                .record(editing)
                .map(|r| r.label.clone())
                .unwrap_or_default();
            self.label_editor = Some((editing, label));
        }
        let Some(element) = flow.nodes().layer().nodes().find(|n| n.node_id == editing) else {
            return;
        };
        let editor_rect = to_screen_rect(rect, flow, element.label_rect);

        let mut commit = None;
        if let Some((id, text)) = self.label_editor.as_mut() {
            let response = ui.put(editor_rect, egui::TextEdit::singleline(text));
            response.request_focus();
            if response.lost_focus() {
                commit = Some((*id, text.clone()));
            }
        }
        if let Some((id, text)) = commit {
            self.label_editor = None;
            flow.commit_label(id, text);
        }
    }

    fn toolbar_ui(&self, ui: &mut egui::Ui, rect: Rect, flow: &mut Flow) {
        if flow.available_commands().is_empty() {
            return;
        }
        let mut clicked = None;
        egui::Area::new(egui::Id::new("floxy-commands"))
            .fixed_pos(rect.left_top() + Vec2::new(8.0, 8.0))
            .show(ui.ctx(), |ui| {
                ui.horizontal(|ui| {
                    let mut group = None;
                    for command in flow.available_commands() {
                        if group.is_some_and(|g| g != command.group()) {
                            ui.separator();
                        }
                        group = Some(command.group());
                        if ui.button(command.label()).clicked() {
                            clicked = Some(command.capability().to_string());
                        }
                    }
                });
            });
        if let Some(tag) = clicked {
            flow.execute(&tag);
        }
    }

    fn draw_status_bar(&self, painter: &egui::Painter, rect: Rect, flow: &Flow) {
        let selection = match flow.selection() {
            Some(SelectionTarget::Node(id)) => format!("node {}", id),
            Some(SelectionTarget::Connection(id)) => format!("connection {}", id),
            None => "none".to_string(),
        };
        let mut text = format!(
            "Nodes: {} | Connections: {} | Zoom: {:.0}% | Selected: {}",
            flow.nodes().len(),
            flow.connections().len(),
            flow.zoom() * 100.0,
            selection,
        );
        if let Some(status) = &self.status {
            text.push_str(" | ");
            text.push_str(status);
        }
        painter.text(
            Pos2::new(rect.left() + 5.0, rect.bottom() - 11.0),
            egui::Align2::LEFT_CENTER,
            text,
            egui::FontId::proportional(11.0),
            Color32::from_gray(150),
        );
    }
}

impl Default for FlowEditorUi {
    fn default() -> Self {
        Self::new()
    }
}

const BUTTONS: [(egui::PointerButton, PointerButton); 3] = [
    (egui::PointerButton::Primary, PointerButton::Primary),
    (egui::PointerButton::Secondary, PointerButton::Secondary),
    (egui::PointerButton::Middle, PointerButton::Middle),
];

/// Screen position to a container-relative point
fn to_local(rect: Rect, pos: Pos2) -> Point {
    Point::new(f64::from(pos.x - rect.min.x), f64::from(pos.y - rect.min.y))
}

/// Logical canvas point to an egui screen position
fn to_screen(rect: Rect, flow: &Flow, p: Point) -> Pos2 {
    let s = flow.canvas().logical_to_screen(p);
    Pos2::new(rect.min.x + s.x as f32, rect.min.y + s.y as f32)
}

fn to_screen_rect(rect: Rect, flow: &Flow, r: crate::geometry::Rect) -> Rect {
    Rect::from_min_max(
        to_screen(rect, flow, r.origin()),
        to_screen(rect, flow, Point::new(r.right(), r.bottom())),
    )
}

/// Parse a `#rrggbb` stroke color
fn parse_color(stroke: Option<&str>) -> Option<Color32> {
    stroke.and_then(|s| Color32::from_hex(s).ok())
}

fn path_color(element: &PathElement) -> Color32 {
    let style = &element.style;
    if style.bad {
        BAD_COLOR
    } else if style.selected {
        SELECTED_COLOR
    } else if style.hover {
        Color32::from_rgb(200, 200, 210)
    } else {
        parse_color(style.stroke.as_deref()).unwrap_or(PATH_COLOR)
    }
}

fn screen_points(rect: Rect, flow: &Flow, path: &PathDescription) -> Vec<Pos2> {
    path.flatten(CURVE_SEGMENTS)
        .into_iter()
        .map(|p| to_screen(rect, flow, p))
        .collect()
}

fn draw_grid(painter: &egui::Painter, rect: Rect, flow: &Flow) {
    let zoom = flow.zoom() as f32;
    let spacing = GRID_SPACING * zoom;
    if spacing < 4.0 {
        return;
    }
    let pan = flow.pan();
    let stroke = Stroke::new(1.0, Color32::from_rgba_unmultiplied(60, 60, 60, 100));

    let mut x = rect.left() + (pan.x as f32).rem_euclid(spacing);
    while x < rect.right() {
        painter.line_segment([Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())], stroke);
        x += spacing;
    }
    let mut y = rect.top() + (pan.y as f32).rem_euclid(spacing);
    while y < rect.bottom() {
        painter.line_segment([Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)], stroke);
        y += spacing;
    }
}

fn draw_path(painter: &egui::Painter, rect: Rect, flow: &Flow, element: &PathElement) {
    let points = screen_points(rect, flow, &element.path);
    if points.len() < 2 {
        return;
    }
    let color = path_color(element);
    let width = element.style.width as f32 * flow.zoom() as f32;
    let stroke = Stroke::new(if element.style.selected { width + 1.0 } else { width }, color);

    if element.style.temp || element.style.dash.is_some() {
        painter.extend(Shape::dashed_line(&points, stroke, 6.0, 4.0));
    } else {
        painter.add(Shape::line(points.clone(), stroke));
    }

    if element.style.arrow_end {
        draw_arrow(painter, points[points.len() - 2], points[points.len() - 1], color);
    }
    if element.style.arrow_start {
        draw_arrow(painter, points[1], points[0], color);
    }
}

/// Arrow head at `tip`, pointing away from `from`
fn draw_arrow(painter: &egui::Painter, from: Pos2, tip: Pos2, color: Color32) {
    let dir = (tip - from).normalized();
    if !dir.x.is_finite() || !dir.y.is_finite() {
        return;
    }
    let normal = Vec2::new(-dir.y, dir.x);
    let base = tip - dir * ARROW_SIZE;
    painter.add(Shape::convex_polygon(
        vec![tip, base + normal * ARROW_SIZE * 0.5, base - normal * ARROW_SIZE * 0.5],
        color,
        Stroke::NONE,
    ));
}

fn ellipse_points(bounds: Rect) -> Vec<Pos2> {
    let center = bounds.center();
    let radius = bounds.size() / 2.0;
    (0..ELLIPSE_SEGMENTS)
        .map(|i| {
            let t = i as f32 / ELLIPSE_SEGMENTS as f32 * std::f32::consts::TAU;
            Pos2::new(center.x + radius.x * t.cos(), center.y + radius.y * t.sin())
        })
        .collect()
}

fn draw_node(painter: &egui::Painter, rect: Rect, flow: &Flow, element: &NodeElement) {
    let zoom = flow.zoom() as f32;
    let bounds = to_screen_rect(rect, flow, element.bounds);
    if !bounds.intersects(rect) {
        return;
    }
    let fill = if element.selected {
        Color32::from_rgb(60, 70, 90)
    } else {
        Color32::from_rgb(45, 45, 48)
    };
    let outline = if element.selected {
        Stroke::new(2.0, SELECTED_COLOR)
    } else {
        Stroke::new(1.0, Color32::from_gray(80))
    };

    match element.shape {
        NodeShape::Card => {
            painter.rect_filled(
                bounds.translate(Vec2::splat(NODE_SHADOW_OFFSET)),
                NODE_ROUNDING * zoom,
                Color32::from_rgba_unmultiplied(0, 0, 0, 60),
            );
            painter.rect(bounds, NODE_ROUNDING * zoom, fill, outline);
            let header = to_screen_rect(rect, flow, element.label_rect);
            painter.rect_filled(
                header,
                egui::Rounding {
                    nw: NODE_ROUNDING * zoom,
                    ne: NODE_ROUNDING * zoom,
                    sw: 0.0,
                    se: 0.0,
                },
                Color32::from_rgb(70, 100, 130),
            );
        }
        NodeShape::Ellipse => {
            painter.add(Shape::convex_polygon(ellipse_points(bounds), fill, outline));
        }
    }

    if !element.editing_label {
        painter.text(
            to_screen_rect(rect, flow, element.label_rect).center(),
            egui::Align2::CENTER_CENTER,
            &element.label,
            egui::FontId::proportional(12.0 * zoom),
            Color32::WHITE,
        );
    }

    if let Some(handle) = element.resize_handle {
        let handle = to_screen_rect(rect, flow, handle);
        painter.add(Shape::convex_polygon(
            vec![handle.right_top(), handle.right_bottom(), handle.left_bottom()],
            Color32::from_gray(110),
            Stroke::NONE,
        ));
    }

    for port in &element.ports {
        let center = to_screen(rect, flow, port.center);
        let color = match port.direction {
            PortDirection::Input => Color32::from_rgb(120, 180, 120),
            PortDirection::Output => Color32::from_rgb(200, 160, 90),
        };
        painter.circle_filled(center, PORT_RADIUS * zoom, color);
        painter.circle_stroke(center, PORT_RADIUS * zoom, Stroke::new(1.0, Color32::from_gray(30)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color(Some("#ff0000")), Some(Color32::from_rgb(255, 0, 0)));
        assert_eq!(parse_color(Some("tomato")), None);
        assert_eq!(parse_color(None), None);
    }

    #[test]
    fn test_to_local_is_container_relative() {
        let rect = Rect::from_min_size(Pos2::new(10.0, 20.0), Vec2::new(100.0, 100.0));
        assert_eq!(to_local(rect, Pos2::new(15.0, 30.0)), Point::new(5.0, 10.0));
    }

    #[test]
    fn test_ellipse_points_stay_in_bounds() {
        let bounds = Rect::from_min_size(Pos2::new(0.0, 0.0), Vec2::new(200.0, 150.0));
        let points = ellipse_points(bounds);
        assert_eq!(points.len(), ELLIPSE_SEGMENTS);
        assert!(points.iter().all(|p| bounds.expand(0.01).contains(*p)));
    }
}
