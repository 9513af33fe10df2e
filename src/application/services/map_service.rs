use super::territory_service::TerritoryService;
use crate::application::ports::{MapSurface, MapSurfaceError};
use crate::domain::entities::Territory;
use crate::domain::value_objects::{PolygonRing, TerritoryId, TerritoryStatus};
use crate::shared::error::AppError;
use crate::shared::validation::ValidationFailureKind;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapView {
    Loading,
    Ready,
}

/// 地図ライブラリから届くユーザー操作
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    ShapeClicked(TerritoryId),
    PolygonDrawn(PolygonRing),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapUiState {
    pub view: MapView,
    pub drawing: bool,
    pub selected: Option<TerritoryId>,
    pub status_panel_open: bool,
    /// 作成ダイアログ待ちの閉じたリング
    pub drawn_polygon: Option<PolygonRing>,
}

impl Default for MapUiState {
    fn default() -> Self {
        Self {
            view: MapView::Loading,
            drawing: false,
            selected: None,
            status_panel_open: false,
            drawn_polygon: None,
        }
    }
}

fn surface_error(err: MapSurfaceError) -> AppError {
    match err {
        MapSurfaceError::InvalidGeometry(message) => AppError::validation(
            ValidationFailureKind::InvalidPolygon,
            message,
        ),
        other => AppError::InvalidInput(other.to_string()),
    }
}

/// 地図の表示を領域一覧に合わせ、地図上の操作を領域の操作に変換する
pub struct MapController {
    surface: Arc<dyn MapSurface>,
    territories: Arc<TerritoryService>,
    events: tokio::sync::Mutex<mpsc::UnboundedReceiver<MapEvent>>,
    ui: Mutex<MapUiState>,
}

impl MapController {
    pub fn new(surface: Arc<dyn MapSurface>, territories: Arc<TerritoryService>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        let click_tx = tx.clone();
        surface.on_shape_clicked(Box::new(move |id| {
            let _ = click_tx.send(MapEvent::ShapeClicked(id));
        }));
        surface.on_polygon_drawn(Box::new(move |ring| {
            let _ = tx.send(MapEvent::PolygonDrawn(ring));
        }));

        Self {
            surface,
            territories,
            events: tokio::sync::Mutex::new(rx),
            ui: Mutex::new(MapUiState::default()),
        }
    }

    fn ui(&self) -> MutexGuard<'_, MapUiState> {
        self.ui.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn ui_state(&self) -> MapUiState {
        self.ui().clone()
    }

    /// 全図形を消して状態色で描き直す。地図が未準備なら `Loading` のまま
    pub async fn refresh(&self) -> Result<MapView, AppError> {
        if !self.surface.is_ready() {
            self.ui().view = MapView::Loading;
            return Ok(MapView::Loading);
        }

        let territories = self.territories.list_territories().await?;
        self.render(&territories);
        Ok(self.ui().view)
    }

    fn render(&self, territories: &[Territory]) {
        match self.surface.render(territories) {
            Ok(()) => self.ui().view = MapView::Ready,
            Err(MapSurfaceError::NotReady) => self.ui().view = MapView::Loading,
            Err(e) => warn!(error = %e, "failed to draw territories"),
        }
    }

    pub fn set_draw_mode(&self, enabled: bool) -> Result<(), AppError> {
        if enabled {
            self.surface.begin_draw().map_err(surface_error)?;
        } else {
            self.surface.end_draw();
        }
        self.ui().drawing = enabled;
        Ok(())
    }

    /// 届いている地図操作をすべて処理し、処理した件数を返す
    pub async fn process_pending_events(&self) -> usize {
        let mut events = self.events.lock().await;
        let mut handled = 0;
        while let Ok(event) = events.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    pub fn handle_event(&self, event: MapEvent) {
        let mut ui = self.ui();
        match event {
            MapEvent::PolygonDrawn(ring) => {
                debug!(vertices = ring.points().len(), "polygon captured");
                ui.drawing = false;
                ui.drawn_polygon = Some(ring);
            }
            MapEvent::ShapeClicked(id) => {
                debug!(territory_id = %id, "territory selected on map");
                ui.selected = Some(id);
                ui.status_panel_open = true;
            }
        }
    }

    /// 描いた多角形から領域を作る。失敗時は多角形を残すのでダイアログから再試行できる
    pub async fn create_from_drawing(
        &self,
        numero: u32,
        nombre: Option<String>,
    ) -> Result<Territory, AppError> {
        let drawn = self.ui().drawn_polygon.clone();
        let Some(ring) = drawn else {
            return Err(AppError::validation(
                ValidationFailureKind::InvalidPolygon,
                "Dibuja el territorio en el mapa primero",
            ));
        };

        let created = self
            .territories
            .create_territory(numero, nombre, ring)
            .await?;
        self.ui().drawn_polygon = None;
        self.redraw().await;
        Ok(created)
    }

    pub fn cancel_drawing(&self) {
        self.surface.end_draw();
        let mut ui = self.ui();
        ui.drawing = false;
        ui.drawn_polygon = None;
    }

    /// 地図の外（一覧など）から選択された場合は図形に合わせて表示範囲を動かす
    pub async fn select_territory(&self, id: &TerritoryId) -> Result<(), AppError> {
        let territory = self
            .territories
            .get_territory(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("territorio {id}")))?;
        self.ui().selected = Some(territory.id.clone());

        match territory.bounds() {
            Ok(bounds) => {
                if let Err(e) = self.surface.fit_to(bounds) {
                    warn!(territory_id = %id, error = %e, "could not fit map to territory");
                }
            }
            Err(e) => warn!(territory_id = %id, error = %e, "territory has no usable bounds"),
        }
        Ok(())
    }

    /// 選択中の領域の状態を変えてパネルを閉じる
    pub async fn change_status(&self, status: TerritoryStatus) -> Result<Territory, AppError> {
        let selected = self.ui().selected.clone();
        let Some(id) = selected else {
            return Err(AppError::InvalidInput(
                "No hay ningún territorio seleccionado".to_string(),
            ));
        };

        let result = self.territories.update_status(&id, status).await;
        self.ui().status_panel_open = false;
        self.redraw().await;
        result
    }

    pub fn close_status_panel(&self) {
        self.ui().status_panel_open = false;
    }

    async fn redraw(&self) {
        if let Err(e) = self.refresh().await {
            warn!(error = %e, "failed to refresh map");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::territory_service::tests::{
        fixture, MockTerritoryGw, StaticActor,
    };
    use crate::domain::entities::territory::fixtures::{square_ring, territory};
    use crate::infrastructure::map::GeoJsonMapSurface;

    fn controller(
        gateway: MockTerritoryGw,
        actor: StaticActor,
        surface: Arc<GeoJsonMapSurface>,
    ) -> MapController {
        let service = Arc::new(fixture(gateway, actor, true).service);
        MapController::new(surface, service)
    }

    #[tokio::test]
    async fn stays_loading_until_surface_is_ready() {
        let mut gateway = MockTerritoryGw::new();
        gateway
            .expect_list_territories()
            .times(1)
            .returning(|| Ok(vec![territory(1, TerritoryStatus::Pendiente)]));
        let surface = Arc::new(GeoJsonMapSurface::new());
        let map = controller(gateway, StaticActor::publicador(), surface.clone());

        assert_eq!(map.refresh().await.unwrap(), MapView::Loading);

        surface.set_ready(true);
        assert_eq!(map.refresh().await.unwrap(), MapView::Ready);
        let features = surface.feature_collection();
        assert_eq!(features["features"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn drawn_polygon_opens_create_dialog() {
        let mut gateway = MockTerritoryGw::new();
        gateway.expect_list_territories().returning(|| Ok(vec![]));
        gateway
            .expect_create_territory()
            .withf(|draft| draft.numero == 12)
            .times(1)
            .returning(|_| Ok(territory(12, TerritoryStatus::Pendiente)));
        let surface = Arc::new(GeoJsonMapSurface::ready());
        let map = controller(gateway, StaticActor::admin(), surface.clone());

        map.set_draw_mode(true).unwrap();
        assert!(map.set_draw_mode(true).is_err());
        surface
            .complete_draw(square_ring().points().to_vec())
            .unwrap();
        assert_eq!(map.process_pending_events().await, 1);

        let ui = map.ui_state();
        assert!(!ui.drawing);
        assert!(ui.drawn_polygon.is_some());

        let created = map
            .create_from_drawing(12, Some("Centro".into()))
            .await
            .unwrap();
        assert_eq!(created.numero, 12);
        assert!(map.ui_state().drawn_polygon.is_none());
    }

    #[tokio::test]
    async fn click_then_status_change_closes_panel() {
        let mut gateway = MockTerritoryGw::new();
        gateway
            .expect_list_territories()
            .returning(|| Ok(vec![territory(3, TerritoryStatus::Pendiente)]));
        gateway
            .expect_update_territory_status()
            .times(1)
            .returning(|_, _| Ok(territory(3, TerritoryStatus::Iniciado)));
        let surface = Arc::new(GeoJsonMapSurface::ready());
        let map = controller(gateway, StaticActor::publicador(), surface.clone());
        map.refresh().await.unwrap();

        let id = TerritoryId::new("t-3".into()).unwrap();
        assert!(surface.click(&id));
        map.process_pending_events().await;
        let ui = map.ui_state();
        assert_eq!(ui.selected.as_ref(), Some(&id));
        assert!(ui.status_panel_open);

        let updated = map.change_status(TerritoryStatus::Iniciado).await.unwrap();
        assert_eq!(updated.estado, TerritoryStatus::Iniciado);
        assert!(!map.ui_state().status_panel_open);
    }

    #[tokio::test]
    async fn selecting_from_list_fits_view() {
        let mut gateway = MockTerritoryGw::new();
        gateway
            .expect_list_territories()
            .returning(|| Ok(vec![territory(4, TerritoryStatus::Completado)]));
        let surface = Arc::new(GeoJsonMapSurface::ready());
        let map = controller(gateway, StaticActor::publicador(), surface.clone());

        map.select_territory(&TerritoryId::new("t-4".into()).unwrap())
            .await
            .unwrap();
        let expected = territory(4, TerritoryStatus::Completado).bounds().unwrap();
        assert_eq!(surface.viewport(), Some(expected));

        assert!(matches!(
            map.select_territory(&TerritoryId::new("nope".into()).unwrap())
                .await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn cancelling_draw_discards_capture() {
        let surface = Arc::new(GeoJsonMapSurface::ready());
        let map = controller(MockTerritoryGw::new(), StaticActor::admin(), surface.clone());

        map.set_draw_mode(true).unwrap();
        map.cancel_drawing();
        assert!(!surface.is_drawing());
        assert!(matches!(
            map.create_from_drawing(1, None).await,
            Err(AppError::ValidationError { .. })
        ));
    }
}
