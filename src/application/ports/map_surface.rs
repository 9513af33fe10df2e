use crate::domain::entities::Territory;
use crate::domain::value_objects::{Bounds, PolygonRing, TerritoryId};

pub type ShapeClickHandler = Box<dyn Fn(TerritoryId) + Send + Sync>;
pub type PolygonDrawnHandler = Box<dyn Fn(PolygonRing) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MapSurfaceError {
    #[error("map library is not loaded")]
    NotReady,
    #[error("a polygon capture is already in progress")]
    AlreadyDrawing,
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
}

/// プラットフォームの地図ライブラリが提供する描画・表示機能
///
/// ライブラリのハンドルは実装側が持つ。グローバルな状態は持たない
pub trait MapSurface: Send + Sync {
    fn is_ready(&self) -> bool;
    /// 全図形を消して渡された領域を描く
    fn render(&self, territories: &[Territory]) -> Result<(), MapSurfaceError>;
    /// 多角形の描画を開始する
    fn begin_draw(&self) -> Result<(), MapSurfaceError>;
    /// 描画中なら取り消す
    fn end_draw(&self);
    fn fit_to(&self, bounds: Bounds) -> Result<(), MapSurfaceError>;
    fn on_shape_clicked(&self, handler: ShapeClickHandler);
    /// 多角形が閉じられたら閉じたリングを渡して呼ばれる
    fn on_polygon_drawn(&self, handler: PolygonDrawnHandler);
}
