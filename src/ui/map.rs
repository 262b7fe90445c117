use cgmath::Vector2;
use geo::Point as GeoPoint;
use iced::mouse::{self, Cursor};
use iced::widget::canvas::{self, Path, Program, Stroke};
use iced::{Color, Pixels, Point, Rectangle, Renderer, Size, Theme};

use super::markers::Marker;
use crate::Message;

/// Web Mercator tile size in pixels
pub const TILE_SIZE: f64 = 256.0;
/// Mercator is undefined at the poles
const MAX_LATITUDE: f64 = 85.051_128_78;
/// Cursor distance for picking a marker
const HOVER_RADIUS: f32 = 8.0;
const MARKER_RADIUS: f32 = 5.0;

/// Where the map is looking
#[derive(Debug, Clone, PartialEq)]
pub struct MapCamera {
    /// x = longitude, y = latitude
    pub center: GeoPoint<f64>,
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Pan offset in screen pixels
    pub offset: Vector2<f32>,
}

impl MapCamera {
    pub fn new(center: GeoPoint<f64>, zoom: f64, min_zoom: f64, max_zoom: f64) -> Self {
        Self {
            center,
            zoom,
            min_zoom,
            max_zoom,
            offset: Vector2::new(0.0, 0.0),
        }
    }

    /// World pixel coordinates of a location at the current zoom
    fn world_pixel(&self, location: GeoPoint<f64>) -> (f64, f64) {
        let scale = TILE_SIZE * 2f64.powf(self.zoom);
        let lat = location.y().clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
        let x = (location.x() + 180.0) / 360.0 * scale;
        let y = (1.0 - lat.tan().asinh() / std::f64::consts::PI) / 2.0 * scale;
        (x, y)
    }

    /// Screen position of a location inside a viewport of `size`
    pub fn project(&self, location: GeoPoint<f64>, size: Size) -> Point {
        let (wx, wy) = self.world_pixel(location);
        let (cx, cy) = self.world_pixel(self.center);
        Point::new(
            size.width / 2.0 + (wx - cx) as f32 + self.offset.x,
            size.height / 2.0 + (wy - cy) as f32 + self.offset.y,
        )
    }

    /// World pixel under the top-left corner of a viewport of `size`
    pub fn screen_origin(&self, size: Size) -> (f64, f64) {
        let (cx, cy) = self.world_pixel(self.center);
        (
            cx - f64::from(size.width / 2.0 + self.offset.x),
            cy - f64::from(size.height / 2.0 + self.offset.y),
        )
    }

    pub fn pan(&mut self, delta: Vector2<f32>) {
        self.offset += delta;
    }

    /// Zoom around the viewport centre, staying within the zoom limits
    pub fn zoom_by(&mut self, delta: f64) {
        let new_zoom = (self.zoom + delta).clamp(self.min_zoom, self.max_zoom);
        let factor = 2f64.powf(new_zoom - self.zoom) as f32;
        self.offset = self.offset * factor;
        self.zoom = new_zoom;
    }
}

/// Canvas program drawing the visible tree markers, layered over the tiles
pub struct MapView<'a> {
    pub markers: &'a [Marker],
    pub camera: &'a MapCamera,
}

impl MapView<'_> {
    /// Index of the marker closest to `cursor`, if within the hover radius
    fn hovered(&self, bounds: Rectangle, cursor: Cursor) -> Option<usize> {
        let position = cursor.position_in(bounds)?;
        self.markers
            .iter()
            .enumerate()
            .map(|(i, marker)| {
                let p = self.camera.project(marker.position, bounds.size());
                (i, p.distance(position))
            })
            .filter(|&(_, d)| d <= HOVER_RADIUS)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }
}

impl Program<Message> for MapView<'_> {
    type State = DragState;

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> Vec<canvas::Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());
        let size = bounds.size();

        let marker_fill = Color::from_rgb8(0x2a, 0x81, 0xcb);
        let outline = Stroke::default().with_color(Color::WHITE).with_width(1.5);

        // Draw shortest first so the tallest trees end up on top
        for marker in self.markers.iter().rev() {
            let p = self.camera.project(marker.position, size);
            if p.x < -MARKER_RADIUS
                || p.y < -MARKER_RADIUS
                || p.x > size.width + MARKER_RADIUS
                || p.y > size.height + MARKER_RADIUS
            {
                continue;
            }
            let dot = Path::circle(p, MARKER_RADIUS);
            frame.fill(&dot, marker_fill);
            frame.stroke(&dot, outline.clone());
        }

        if let Some(index) = self.hovered(bounds, cursor) {
            let marker = &self.markers[index];
            let p = self.camera.project(marker.position, size);
            frame.fill(
                &Path::circle(p, MARKER_RADIUS + 2.0),
                Color::from_rgb8(0xe0, 0x6c, 0x1f),
            );
            draw_popup(&mut frame, p, marker, size);
        }

        vec![frame.into_geometry()]
    }

    fn update(
        &self,
        state: &mut Self::State,
        event: canvas::Event,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> (canvas::event::Status, Option<Message>) {
        match event {
            // Mouse wheel for zooming
            canvas::Event::Mouse(mouse::Event::WheelScrolled { delta }) => {
                if !cursor.is_over(bounds) {
                    return (canvas::event::Status::Ignored, None);
                }
                let zoom_delta = match delta {
                    mouse::ScrollDelta::Lines { y, .. } => y * 0.5,
                    mouse::ScrollDelta::Pixels { y, .. } => y * 0.01,
                };
                return (
                    canvas::event::Status::Captured,
                    Some(Message::MapZoomed(zoom_delta)),
                );
            }

            canvas::Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                if let Some(pos) = cursor.position_over(bounds) {
                    state.is_dragging = true;
                    state.last_position = Some(pos);
                    return (canvas::event::Status::Captured, None);
                }
            }

            canvas::Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left)) => {
                if state.is_dragging {
                    state.is_dragging = false;
                    state.last_position = None;
                    return (canvas::event::Status::Captured, None);
                }
            }

            canvas::Event::Mouse(mouse::Event::CursorMoved { .. }) => {
                if let (true, Some(current), Some(last)) =
                    (state.is_dragging, cursor.position(), state.last_position)
                {
                    let delta = Vector2::new(current.x - last.x, current.y - last.y);
                    state.last_position = Some(current);
                    return (
                        canvas::event::Status::Captured,
                        Some(Message::MapPanned(delta)),
                    );
                }
            }

            _ => {}
        }

        (canvas::event::Status::Ignored, None)
    }

    fn mouse_interaction(
        &self,
        state: &Self::State,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> mouse::Interaction {
        if state.is_dragging {
            mouse::Interaction::Grabbing
        } else if self.hovered(bounds, cursor).is_some() {
            mouse::Interaction::Pointer
        } else if cursor.is_over(bounds) {
            mouse::Interaction::Grab
        } else {
            mouse::Interaction::default()
        }
    }
}

/// Popup box next to a hovered marker, kept inside the viewport
fn draw_popup(frame: &mut canvas::Frame, anchor: Point, marker: &Marker, viewport: Size) {
    const LINE_HEIGHT: f32 = 16.0;
    const PADDING: f32 = 8.0;
    const MIN_WIDTH: f32 = 150.0;

    let title = format!("#{} (tree {})", marker.rank, marker.id);
    let lines: Vec<&str> = std::iter::once(title.as_str())
        .chain(marker.popup.lines())
        .collect();
    let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let width = (longest as f32 * 7.0 + 2.0 * PADDING).max(MIN_WIDTH);
    let height = lines.len() as f32 * LINE_HEIGHT + 2.0 * PADDING;

    let x = (anchor.x + 12.0).min(viewport.width - width).max(0.0);
    let y = (anchor.y - height - 12.0).max(0.0);

    let panel = Path::rectangle(Point::new(x, y), Size::new(width, height));
    frame.fill(&panel, Color::WHITE);
    frame.stroke(
        &panel,
        Stroke::default()
            .with_color(Color::from_rgba(0.0, 0.0, 0.0, 0.3))
            .with_width(1.0),
    );

    for (i, line) in lines.iter().enumerate() {
        frame.fill_text(canvas::Text {
            content: line.to_string(),
            position: Point::new(x + PADDING, y + PADDING + i as f32 * LINE_HEIGHT),
            color: Color::from_rgb8(0x22, 0x22, 0x22),
            size: Pixels(13.0),
            ..canvas::Text::default()
        });
    }
}

/// State for drag interactions
#[derive(Debug, Clone, Default)]
pub struct DragState {
    pub is_dragging: bool,
    pub last_position: Option<Point>,
}
