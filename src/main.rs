use iced::widget::{
    button, column, container, horizontal_rule, radio, row, stack, text, Canvas, Column,
};
use iced::{window, Alignment, Element, Length, Size, Subscription, Task, Theme};
use iced_aw::Wrap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod geometry;
mod state;
mod ui;

use config::AppConfig;
use error::{LoadError, TileError};
use state::data::StepSize;
use state::pagination::BatchPaginator;
use state::store::GeoRecordStore;
use ui::{MapCamera, MapView, Marker, TileId, TileLayer, TileView};

/// Where the tree inventory can be downloaded
const DATA_SOURCE_URL: &str = "https://data-wcc.opendata.arcgis.com/datasets/WCC::wcc-trees/about";
const SIDEBAR_WIDTH: f32 = 320.0;
const WINDOW_SIZE: Size = Size::new(1280.0, 800.0);

/// Main application state
struct TreeMap {
    /// Visible count and step size for this window
    paginator: BatchPaginator,
    /// Markers for the currently visible trees, rebuilt after every change
    markers: Vec<Marker>,
    camera: MapCamera,
    /// Base map tiles under the markers
    tiles: TileLayer,
    /// Size of the map area, used to pick the tiles to fetch
    viewport: Size,
    /// Status message to display to the user
    status: String,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    /// Background load of the tree table finished
    DataLoaded(Result<Arc<GeoRecordStore>, Arc<LoadError>>),
    /// User picked a batch size
    StepSizeSelected(usize),
    ShowMore,
    ShowLess,
    Reset,
    /// Map dragged by a screen-space delta
    MapPanned(cgmath::Vector2<f32>),
    /// Zoom in zoom levels, from the wheel or the +/- buttons
    MapZoomed(f32),
    /// Window size changed
    WindowResized(Size),
    /// A base map tile finished downloading
    TileLoaded(TileId, Result<Vec<u8>, Arc<TileError>>),
    /// Copy the data source link to the clipboard
    CopyDataLink,
}

impl TreeMap {
    /// Create a new instance of the application and start loading the data
    fn new(config: AppConfig) -> (Self, Task<Message>) {
        let [lat, lon] = config.map_center;
        let camera = MapCamera::new(
            geo::Point::new(lon, lat),
            config.initial_zoom(),
            config.min_zoom,
            config.max_zoom.max(config.min_zoom),
        );

        let status = format!("Loading {}...", config.data_path.display());
        let mut app = TreeMap {
            paginator: BatchPaginator::new(Arc::new(GeoRecordStore::empty())),
            markers: Vec::new(),
            camera,
            tiles: TileLayer::new(&config.tile_url, AppConfig::tile_cache_dir()),
            viewport: map_viewport(WINDOW_SIZE),
            status,
        };

        let load = GeoRecordStore::load(config.data_path, config.on_malformed);
        let load = Task::perform(load, |result| {
            Message::DataLoaded(result.map(Arc::new).map_err(Arc::new))
        });
        let tiles = app.request_tiles();
        (app, Task::batch([load, tiles]))
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::DataLoaded(Ok(store)) => {
                if store.is_empty() {
                    warn!("Tree table contains no usable rows");
                }
                if let Some(path) = store.source() {
                    info!("Showing trees from {}", path.display());
                }
                self.status = match store.skipped() {
                    0 => format!("Loaded {} trees.", store.len()),
                    skipped => format!(
                        "Loaded {} trees, skipped {skipped} unreadable rows.",
                        store.len()
                    ),
                };
                self.paginator = BatchPaginator::new(store);
                self.refresh_markers();
            }
            Message::DataLoaded(Err(e)) => {
                error!("Failed to load tree data: {e}");
                self.status = format!("Failed to load tree data: {e}");
            }
            Message::StepSizeSelected(n) => {
                if let Err(e) = self.paginator.set_step_size(n) {
                    warn!("{e}");
                }
            }
            Message::ShowMore => {
                if self.paginator.show_more() {
                    self.refresh_markers();
                }
            }
            Message::ShowLess => {
                if self.paginator.show_less() {
                    self.refresh_markers();
                }
            }
            Message::Reset => {
                self.paginator.reset();
                self.refresh_markers();
            }
            Message::MapPanned(delta) => {
                self.camera.pan(delta);
                return self.request_tiles();
            }
            Message::MapZoomed(delta) => {
                self.camera.zoom_by(f64::from(delta));
                return self.request_tiles();
            }
            Message::WindowResized(size) => {
                self.viewport = map_viewport(size);
                return self.request_tiles();
            }
            Message::TileLoaded(id, result) => self.tiles.loaded(id, result),
            Message::CopyDataLink => {
                self.status = "Data source link copied to the clipboard.".to_string();
                return iced::clipboard::write(DATA_SOURCE_URL.to_string());
            }
        }

        Task::none()
    }

    /// Start downloads for the tiles the map area needs and does not have
    fn request_tiles(&mut self) -> Task<Message> {
        let wanted = ui::visible_tiles(&self.camera, self.viewport)
            .into_iter()
            .map(|(id, _)| id);
        let requests = self.tiles.request(wanted);
        if !requests.is_empty() {
            debug!("Fetching {} map tiles", requests.len());
        }

        Task::batch(requests.into_iter().map(|request| {
            let id = request.id;
            Task::perform(request.fetch(), move |result| {
                Message::TileLoaded(id, result.map_err(Arc::new))
            })
        }))
    }

    /// Rebuild the marker list from the controller's visible records
    fn refresh_markers(&mut self) {
        let visible = self.paginator.visible_records();
        if let Some(tallest) = visible.first() {
            debug!(
                "Tallest visible tree {} ({:?}m) at {:.5}, {:.5}",
                tallest.id,
                tallest.height,
                tallest.latitude(),
                tallest.longitude()
            );
        }
        self.markers = ui::build_markers(visible);
        debug!(state = ?self.paginator.state(), "Markers rebuilt");
        info!("{}", self.paginator.caption_text());
    }

    /// Build the user interface
    fn view(&self) -> Element<'_, Message> {
        let selected = self.paginator.step_size().get();
        let choices: Vec<Element<'_, Message>> = StepSize::ALL
            .iter()
            .map(|step| {
                radio(
                    step.to_string(),
                    step.get(),
                    Some(selected),
                    Message::StepSizeSelected,
                )
                .into()
            })
            .collect();

        let sidebar: Column<'_, Message> = column![
            text("Batch loading data").size(28),
            horizontal_rule(1),
            text(
                "Trees owned/maintained by Parks, Sport, and Recreation Business Unit, \
                 Wellington City Council"
            )
            .size(14),
            column![
                button(text("Access the data here").size(14))
                    .style(button::text)
                    .padding(0)
                    .on_press(Message::CopyDataLink),
                text(DATA_SOURCE_URL).size(11),
            ]
            .spacing(4),
            text("Batch Size").size(16),
            Wrap::with_elements(choices).spacing(12.0),
            text(self.paginator.caption_text()).size(14),
            row![
                button("Show less").on_press(Message::ShowLess).padding(8),
                button("Show more").on_press(Message::ShowMore).padding(8),
                button("Reset").on_press(Message::Reset).padding(8),
            ]
            .spacing(8),
            text(&self.status).size(12),
        ]
        .spacing(16)
        .padding(20)
        .align_x(Alignment::Start);

        let base = Canvas::new(TileView {
            tiles: &self.tiles,
            camera: &self.camera,
        })
        .width(Length::Fill)
        .height(Length::Fill);

        let markers = Canvas::new(MapView {
            markers: &self.markers,
            camera: &self.camera,
        })
        .width(Length::Fill)
        .height(Length::Fill);

        let zoom_buttons = container(
            column![
                button(text("+").size(18))
                    .on_press(Message::MapZoomed(1.0))
                    .width(Length::Fixed(36.0)),
                button(text("-").size(18))
                    .on_press(Message::MapZoomed(-1.0))
                    .width(Length::Fixed(36.0)),
            ]
            .spacing(4),
        )
        .padding(10)
        .width(Length::Fill)
        .height(Length::Fill)
        .align_x(Alignment::End)
        .align_y(Alignment::Start);

        let map = stack![base, markers, zoom_buttons];

        row![
            container(sidebar)
                .width(Length::Fixed(SIDEBAR_WIDTH))
                .height(Length::Fill),
            container(map).width(Length::Fill).height(Length::Fill),
        ]
        .into()
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Light
    }

    fn subscription(&self) -> Subscription<Message> {
        window::resize_events().map(|(_id, size)| Message::WindowResized(size))
    }
}

/// Map area left of a window of `size` once the sidebar is taken out
fn map_viewport(size: Size) -> Size {
    Size::new((size.width - SIDEBAR_WIDTH).max(0.0), size.height)
}

fn main() -> iced::Result {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tree_batch_map=info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config = AppConfig::load(&args);
    info!("Tree data: {}", config.data_path.display());

    iced::application("Tree Batch Map", TreeMap::update, TreeMap::view)
        .theme(TreeMap::theme)
        .subscription(TreeMap::subscription)
        .window_size(WINDOW_SIZE)
        .centered()
        .run_with(move || TreeMap::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MalformedPolicy;
    use crate::state::store::TreeRow;

    fn loaded_app(count: usize) -> TreeMap {
        let (mut app, _load) = TreeMap::new(AppConfig::default());
        let rows = (0..count)
            .map(|i| TreeRow {
                object_id: i as i64,
                botanical: Some("Podocarpus totara".to_string()),
                botanical_alt: None,
                height: Some(i as f64),
                girth: Some(80.0),
                address: None,
                geometry: "POINT (174.78 -41.29)".to_string(),
            })
            .collect();
        let store = GeoRecordStore::from_rows(rows, MalformedPolicy::Skip).unwrap();
        let _ = app.update(Message::DataLoaded(Ok(Arc::new(store))));
        app
    }

    #[test]
    fn test_load_shows_first_batch() {
        let app = loaded_app(120);
        assert_eq!(app.markers.len(), 50);
        assert_eq!(app.markers[0].id, 119);
        assert_eq!(app.status, "Loaded 120 trees.");
    }

    #[test]
    fn test_buttons_drive_markers() {
        let mut app = loaded_app(120);
        let _ = app.update(Message::ShowMore);
        assert_eq!(app.markers.len(), 100);
        let _ = app.update(Message::ShowMore);
        assert_eq!(app.markers.len(), 100);

        let _ = app.update(Message::StepSizeSelected(100));
        let _ = app.update(Message::ShowLess);
        assert_eq!(app.markers.len(), 0);

        let _ = app.update(Message::Reset);
        assert_eq!(app.markers.len(), 50);
        assert_eq!(app.paginator.step_size(), StepSize::Fifty);
    }

    #[test]
    fn test_invalid_step_is_ignored() {
        let mut app = loaded_app(120);
        let _ = app.update(Message::StepSizeSelected(999));
        assert_eq!(app.paginator.step_size(), StepSize::Fifty);
        assert_eq!(app.markers.len(), 50);
    }

    #[test]
    fn test_zoom_buttons_step_one_level() {
        let mut app = loaded_app(10);
        let start = app.camera.zoom;
        let _ = app.update(Message::MapZoomed(1.0));
        assert_eq!(app.camera.zoom, start + 1.0);
        let _ = app.update(Message::MapZoomed(-1.0));
        let _ = app.update(Message::MapZoomed(-1.0));
        assert_eq!(app.camera.zoom, start - 1.0);
    }

    #[test]
    fn test_resize_leaves_room_for_sidebar() {
        let mut app = loaded_app(10);
        assert_eq!(app.viewport, Size::new(960.0, 800.0));
        let _ = app.update(Message::WindowResized(Size::new(1000.0, 700.0)));
        assert_eq!(app.viewport, Size::new(680.0, 700.0));
        let _ = app.update(Message::WindowResized(Size::new(200.0, 700.0)));
        assert_eq!(app.viewport, Size::new(0.0, 700.0));
    }

    #[test]
    fn test_loaded_tiles_are_kept() {
        let mut app = loaded_app(10);
        let (id, _) = ui::visible_tiles(&app.camera, app.viewport)[0];
        assert!(app.tiles.get(&id).is_none());
        let _ = app.update(Message::TileLoaded(id, Ok(vec![0u8; 8])));
        assert!(app.tiles.get(&id).is_some());
    }

    #[test]
    fn test_copy_data_link() {
        let mut app = loaded_app(10);
        let _ = app.update(Message::CopyDataLink);
        assert_eq!(app.status, "Data source link copied to the clipboard.");
        assert!(DATA_SOURCE_URL.ends_with("WCC::wcc-trees/about"));
    }

    #[test]
    fn test_failed_load_keeps_empty_map() {
        let (mut app, _load) = TreeMap::new(AppConfig::default());
        let err = LoadError::MissingHeight { id: 3 };
        let _ = app.update(Message::DataLoaded(Err(Arc::new(err))));
        assert!(app.markers.is_empty());
        assert_eq!(app.paginator.total_record_count(), 0);
        assert!(app.status.starts_with("Failed to load tree data"));
    }
}
