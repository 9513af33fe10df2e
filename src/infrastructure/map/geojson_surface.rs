use crate::application::ports::map_surface::{PolygonDrawnHandler, ShapeClickHandler};
use crate::application::ports::{MapSurface, MapSurfaceError};
use crate::domain::entities::Territory;
use crate::domain::value_objects::{Bounds, Coordinates, PolygonRing, TerritoryId};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock};
use tracing::debug;

const FILL_OPACITY: f64 = 0.35;
const STROKE_WEIGHT: u32 = 2;
const COMPLETED_EDGE_WEIGHT: u32 = 5;
const COMPLETED_EDGE_COLOR: &str = "#1d4ed8";

#[derive(Default)]
struct SurfaceState {
    features: Vec<Value>,
    rendered: BTreeSet<TerritoryId>,
    drawing: bool,
    viewport: Option<Bounds>,
}

/// 地図ライブラリに依存しない描画面
///
/// 描画内容はスタイル付きの GeoJSON `FeatureCollection` として保持し、Web ビュー（Leaflet, MapLibre など）がそのまま読み込める。
/// Web ビューから届いた操作はハンドラ呼び出しに変換する
pub struct GeoJsonMapSurface {
    ready: AtomicBool,
    state: Mutex<SurfaceState>,
    click_handlers: RwLock<Vec<ShapeClickHandler>>,
    drawn_handlers: RwLock<Vec<PolygonDrawnHandler>>,
}

impl GeoJsonMapSurface {
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
            state: Mutex::new(SurfaceState::default()),
            click_handlers: RwLock::new(Vec::new()),
            drawn_handlers: RwLock::new(Vec::new()),
        }
    }

    /// 最初から準備済みの描画面
    pub fn ready() -> Self {
        let surface = Self::new();
        surface.set_ready(true);
        surface
    }

    /// Web ビューが地図ライブラリを読み込んだら呼ぶ
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    fn state(&self) -> MutexGuard<'_, SurfaceState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn feature_collection(&self) -> Value {
        json!({
            "type": "FeatureCollection",
            "features": self.state().features.clone(),
        })
    }

    pub fn is_drawing(&self) -> bool {
        self.state().drawing
    }

    pub fn viewport(&self) -> Option<Bounds> {
        self.state().viewport
    }

    /// 図形がクリックされた。未知の ID は無視
    pub fn click(&self, id: &TerritoryId) -> bool {
        if !self.state().rendered.contains(id) {
            debug!(territory_id = %id, "click on unknown shape ignored");
            return false;
        }
        let handlers = self
            .click_handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for handler in handlers.iter() {
            handler(id.clone());
        }
        true
    }

    /// 描画ツールで多角形が閉じられた。描画モードを終えて閉じたリングをハンドラに渡す
    pub fn complete_draw(&self, points: Vec<Coordinates>) -> Result<PolygonRing, MapSurfaceError> {
        {
            let mut state = self.state();
            if !state.drawing {
                return Err(MapSurfaceError::InvalidGeometry(
                    "no polygon capture in progress".to_string(),
                ));
            }
            state.drawing = false;
        }

        let ring = PolygonRing::new(points).map_err(MapSurfaceError::InvalidGeometry)?;
        let handlers = self
            .drawn_handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for handler in handlers.iter() {
            handler(ring.clone());
        }
        Ok(ring)
    }
}

impl Default for GeoJsonMapSurface {
    fn default() -> Self {
        Self::new()
    }
}

fn territory_feature(territory: &Territory) -> Value {
    let color = territory.estado.color();
    json!({
        "type": "Feature",
        "id": territory.id.as_str(),
        "geometry": territory.geometria_poligono.to_geojson(),
        "properties": {
            "kind": "territory",
            "territory_id": territory.id.as_str(),
            "numero": territory.numero,
            "label": territory.display_name(),
            "estado": territory.estado.as_str(),
            "fillColor": color,
            "fillOpacity": FILL_OPACITY,
            "color": color,
            "weight": STROKE_WEIGHT,
        }
    })
}

fn completed_edge_features(territory: &Territory) -> Vec<Value> {
    territory
        .lados_completados
        .iter()
        .filter_map(|&index| {
            let (from, to) = territory.geometria_poligono.edge(index as usize)?;
            Some(json!({
                "type": "Feature",
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[from.lng, from.lat], [to.lng, to.lat]],
                },
                "properties": {
                    "kind": "edge",
                    "territory_id": territory.id.as_str(),
                    "edge": index,
                    "color": COMPLETED_EDGE_COLOR,
                    "weight": COMPLETED_EDGE_WEIGHT,
                }
            }))
        })
        .collect()
}

impl MapSurface for GeoJsonMapSurface {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn render(&self, territories: &[Territory]) -> Result<(), MapSurfaceError> {
        if !self.is_ready() {
            return Err(MapSurfaceError::NotReady);
        }
        let mut features = Vec::with_capacity(territories.len());
        let mut rendered = BTreeSet::new();
        for territory in territories {
            features.push(territory_feature(territory));
            features.extend(completed_edge_features(territory));
            rendered.insert(territory.id.clone());
        }

        let mut state = self.state();
        state.features = features;
        state.rendered = rendered;
        debug!(count = territories.len(), "map shapes redrawn");
        Ok(())
    }

    fn begin_draw(&self) -> Result<(), MapSurfaceError> {
        if !self.is_ready() {
            return Err(MapSurfaceError::NotReady);
        }
        let mut state = self.state();
        if state.drawing {
            return Err(MapSurfaceError::AlreadyDrawing);
        }
        state.drawing = true;
        Ok(())
    }

    fn end_draw(&self) {
        self.state().drawing = false;
    }

    fn fit_to(&self, bounds: Bounds) -> Result<(), MapSurfaceError> {
        if !self.is_ready() {
            return Err(MapSurfaceError::NotReady);
        }
        if bounds.south > bounds.north || bounds.west > bounds.east {
            return Err(MapSurfaceError::InvalidGeometry(
                "bounds are inverted".to_string(),
            ));
        }
        self.state().viewport = Some(bounds);
        Ok(())
    }

    fn on_shape_clicked(&self, handler: ShapeClickHandler) {
        self.click_handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(handler);
    }

    fn on_polygon_drawn(&self, handler: PolygonDrawnHandler) {
        self.drawn_handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(handler);
    }
}
