//! OpenStreetMap base layer
//!
//! Tiles are 256px Web Mercator images addressed by `{z}/{x}/{y}`. They are
//! fetched over HTTP, kept on disk under the user cache directory and held
//! in memory as image handles while the map is open.
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use iced::mouse::Cursor;
use iced::widget::canvas::{self, Program};
use iced::widget::image::Handle;
use iced::{Color, Pixels, Point, Rectangle, Renderer, Size, Theme};
use tracing::{debug, warn};

use super::map::{MapCamera, TILE_SIZE};
use crate::error::TileError;
use crate::Message;

pub const OSM_TILE_URL: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";
pub const OSM_ATTRIBUTION: &str = "© OpenStreetMap contributors";

/// Highest zoom level served by the tile server
const MAX_TILE_ZOOM: f64 = 19.0;
/// Tiles kept in memory before other zoom levels are dropped
const MAX_CACHED_TILES: usize = 512;

/// Address of one tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileId {
    pub z: u32,
    pub x: u32,
    pub y: u32,
}

impl TileId {
    /// Fill a `{z}/{x}/{y}` URL template
    pub fn url(&self, template: &str) -> String {
        template
            .replace("{z}", &self.z.to_string())
            .replace("{x}", &self.x.to_string())
            .replace("{y}", &self.y.to_string())
    }

    fn cache_path(&self, root: &std::path::Path) -> PathBuf {
        root.join(self.z.to_string())
            .join(self.x.to_string())
            .join(format!("{}.png", self.y))
    }
}

/// Tiles covering a viewport of `size`, with their screen rectangles
///
/// Tiles come from the zoom level below the camera zoom and are scaled up
/// for fractional zooms. Tiles outside the world are left out.
pub fn visible_tiles(camera: &MapCamera, size: Size) -> Vec<(TileId, Rectangle)> {
    if size.width <= 0.0 || size.height <= 0.0 {
        return Vec::new();
    }

    let z = camera.zoom.floor().clamp(0.0, MAX_TILE_ZOOM);
    let tile_px = TILE_SIZE * 2f64.powf(camera.zoom - z);
    let z = z as u32;
    let count = 1i64 << z;

    let (left, top) = camera.screen_origin(size);
    let span = |start: f64, length: f32| {
        let first = (start / tile_px).floor() as i64;
        let last = ((start + f64::from(length)) / tile_px).ceil() as i64;
        first.max(0)..last.min(count)
    };

    let mut tiles = Vec::new();
    for y in span(top, size.height) {
        for x in span(left, size.width) {
            let bounds = Rectangle::new(
                Point::new(
                    (x as f64 * tile_px - left) as f32,
                    (y as f64 * tile_px - top) as f32,
                ),
                Size::new(tile_px as f32, tile_px as f32),
            );
            let id = TileId {
                z,
                x: x as u32,
                y: y as u32,
            };
            tiles.push((id, bounds));
        }
    }
    tiles
}

/// Where tiles come from
#[derive(Debug, Clone)]
struct TileSource {
    client: reqwest::Client,
    url_template: String,
    cache_dir: Option<PathBuf>,
}

/// One pending tile download
#[derive(Debug)]
pub struct TileRequest {
    pub id: TileId,
    url: String,
    client: reqwest::Client,
    cache_path: Option<PathBuf>,
}

impl TileRequest {
    /// Read the tile from the disk cache, or download and cache it
    pub async fn fetch(self) -> Result<Vec<u8>, TileError> {
        if let Some(path) = &self.cache_path {
            if let Ok(bytes) = tokio::fs::read(path).await {
                return Ok(bytes);
            }
        }

        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(TileError::Status {
                url: self.url,
                status: response.status().as_u16(),
            });
        }
        let bytes = response.bytes().await?.to_vec();

        // A missing disk cache only costs a refetch next session
        if let Some(path) = &self.cache_path {
            if let Some(parent) = path.parent() {
                let _ = tokio::fs::create_dir_all(parent).await;
            }
            if let Err(e) = tokio::fs::write(path, &bytes).await {
                debug!("Could not cache tile at {}: {e}", path.display());
            }
        }

        Ok(bytes)
    }
}

/// In-memory tile store plus bookkeeping of downloads in flight
#[derive(Debug, Default)]
pub struct TileLayer {
    source: Option<TileSource>,
    tiles: HashMap<TileId, Handle>,
    pending: HashSet<TileId>,
    failed: HashSet<TileId>,
}

impl TileLayer {
    /// Tile layer fetching from `url_template`; an empty template turns tiles off
    pub fn new(url_template: &str, cache_dir: Option<PathBuf>) -> Self {
        if url_template.trim().is_empty() {
            return Self::disabled();
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build();

        match client {
            Ok(client) => Self {
                source: Some(TileSource {
                    client,
                    url_template: url_template.to_string(),
                    cache_dir,
                }),
                ..Self::default()
            },
            Err(e) => {
                warn!("Map tiles disabled, HTTP client failed to start: {e}");
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.source.is_some()
    }

    pub fn get(&self, id: &TileId) -> Option<&Handle> {
        self.tiles.get(id)
    }

    /// Downloads for the wanted tiles that are not loaded, in flight or failed
    pub fn request(&mut self, wanted: impl IntoIterator<Item = TileId>) -> Vec<TileRequest> {
        let Some(source) = &self.source else {
            return Vec::new();
        };

        let mut requests = Vec::new();
        for id in wanted {
            if self.tiles.contains_key(&id) || self.failed.contains(&id) {
                continue;
            }
            if !self.pending.insert(id) {
                continue;
            }
            requests.push(TileRequest {
                id,
                url: id.url(&source.url_template),
                client: source.client.clone(),
                cache_path: source.cache_dir.as_deref().map(|dir| id.cache_path(dir)),
            });
        }
        requests
    }

    /// Store the result of a finished download
    pub fn loaded(&mut self, id: TileId, result: Result<Vec<u8>, std::sync::Arc<TileError>>) {
        self.pending.remove(&id);
        match result {
            Ok(bytes) => {
                if self.tiles.len() >= MAX_CACHED_TILES {
                    self.tiles.retain(|cached, _| cached.z == id.z);
                }
                self.tiles.insert(id, Handle::from_bytes(bytes));
            }
            Err(e) => {
                warn!("Failed to load tile {}/{}/{}: {e}", id.z, id.x, id.y);
                self.failed.insert(id);
            }
        }
    }
}

/// Canvas program drawing the base map under the markers
pub struct TileView<'a> {
    pub tiles: &'a TileLayer,
    pub camera: &'a MapCamera,
}

impl Program<Message> for TileView<'_> {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: Cursor,
    ) -> Vec<canvas::Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());
        let size = bounds.size();

        frame.fill_rectangle(Point::ORIGIN, size, Color::from_rgb8(0xe8, 0xec, 0xe4));

        for (id, tile_bounds) in visible_tiles(self.camera, size) {
            if let Some(handle) = self.tiles.get(&id) {
                frame.draw_image(tile_bounds, handle);
            }
        }

        if self.tiles.is_enabled() {
            frame.fill_text(canvas::Text {
                content: OSM_ATTRIBUTION.to_string(),
                position: Point::new(size.width - 180.0, size.height - 18.0),
                color: Color::from_rgb8(0x33, 0x33, 0x33),
                size: Pixels(12.0),
                ..canvas::Text::default()
            });
        }

        vec![frame.into_geometry()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point as GeoPoint;

    fn camera_at(lon: f64, lat: f64, zoom: f64) -> MapCamera {
        MapCamera::new(GeoPoint::new(lon, lat), zoom, 0.0, 19.0)
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tree-batch-map-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_tile_url() {
        let id = TileId { z: 13, x: 8073, y: 5127 };
        assert_eq!(id.url(OSM_TILE_URL), "https://tile.openstreetmap.org/13/8073/5127.png");
        assert_eq!(
            id.cache_path(std::path::Path::new("/cache")),
            PathBuf::from("/cache/13/8073/5127.png")
        );
    }

    #[test]
    fn test_whole_world_at_zoom_zero() {
        let camera = camera_at(0.0, 0.0, 0.0);
        let tiles = visible_tiles(&camera, Size::new(256.0, 256.0));
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].0, TileId { z: 0, x: 0, y: 0 });
        assert_eq!(
            tiles[0].1,
            Rectangle::new(Point::ORIGIN, Size::new(256.0, 256.0))
        );
    }

    #[test]
    fn test_tiles_cover_viewport() {
        let camera = camera_at(174.8213, -41.3095, 13.0);
        let size = Size::new(800.0, 600.0);
        let tiles = visible_tiles(&camera, size);

        assert!((12..=20).contains(&tiles.len()));
        assert!(tiles.iter().all(|(id, b)| id.z == 13 && b.width == 256.0));

        let left = tiles.iter().map(|(_, b)| b.x).fold(f32::MAX, f32::min);
        let top = tiles.iter().map(|(_, b)| b.y).fold(f32::MAX, f32::min);
        let right = tiles.iter().map(|(_, b)| b.x + b.width).fold(f32::MIN, f32::max);
        let bottom = tiles.iter().map(|(_, b)| b.y + b.height).fold(f32::MIN, f32::max);
        assert!(left <= 0.0 && top <= 0.0);
        assert!(right >= size.width && bottom >= size.height);
    }

    #[test]
    fn test_fractional_zoom_scales_tiles() {
        let camera = camera_at(174.8213, -41.3095, 13.5);
        let tiles = visible_tiles(&camera, Size::new(800.0, 600.0));
        let expected = (256.0 * 2f64.sqrt()) as f32;
        assert!(tiles.iter().all(|(id, b)| id.z == 13 && (b.width - expected).abs() < 0.01));
    }

    #[test]
    fn test_empty_viewport_has_no_tiles() {
        let camera = camera_at(174.8213, -41.3095, 13.0);
        assert!(visible_tiles(&camera, Size::ZERO).is_empty());
    }

    #[test]
    fn test_requests_are_not_repeated() {
        let mut layer = TileLayer::new(OSM_TILE_URL, None);
        let a = TileId { z: 13, x: 1, y: 2 };
        let b = TileId { z: 13, x: 2, y: 2 };

        let first = layer.request([a, b]);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].url, "https://tile.openstreetmap.org/13/1/2.png");
        assert!(layer.request([a, b]).is_empty());

        layer.loaded(a, Ok(vec![0u8; 4]));
        assert!(layer.get(&a).is_some());
        layer.loaded(
            b,
            Err(std::sync::Arc::new(TileError::Status {
                url: first[1].url.clone(),
                status: 404,
            })),
        );
        assert!(layer.get(&b).is_none());
        assert!(layer.request([a, b]).is_empty());
    }

    #[test]
    fn test_empty_template_disables_tiles() {
        let mut layer = TileLayer::new("  ", None);
        assert!(!layer.is_enabled());
        assert!(layer.request([TileId { z: 0, x: 0, y: 0 }]).is_empty());
    }

    #[tokio::test]
    async fn test_fetch_reads_disk_cache_first() {
        let dir = temp_dir("tiles");
        let id = TileId { z: 3, x: 7, y: 4 };
        let path = id.cache_path(&dir);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"cached tile").unwrap();

        // Unroutable URL: only the disk cache can answer
        let mut layer = TileLayer::new("http://127.0.0.1:9/{z}/{x}/{y}.png", Some(dir.clone()));
        let request = layer.request([id]).pop().unwrap();
        let bytes = request.fetch().await.unwrap();
        assert_eq!(bytes, b"cached tile");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
