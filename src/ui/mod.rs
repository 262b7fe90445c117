/// UI components
///
/// - `markers.rs` - turns visible tree records into map markers
/// - `map.rs` - canvas program projecting and drawing the markers
/// - `tiles.rs` - OpenStreetMap base tiles drawn under the markers

pub mod map;
pub mod markers;
pub mod tiles;

pub use map::{MapCamera, MapView};
pub use markers::{build_markers, Marker};
pub use tiles::{visible_tiles, TileId, TileLayer, TileView};
