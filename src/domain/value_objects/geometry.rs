use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

/// WGS84 の点。`{"lat": .., "lng": ..}` でシリアライズ
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Result<Self, String> {
        if !lat.is_finite() || !lng.is_finite() {
            return Err("Coordinates must be finite numbers".to_string());
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(format!("Latitude out of range: {lat}"));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(format!("Longitude out of range: {lng}"));
        }
        Ok(Self { lat, lng })
    }
}

/// 表示範囲合わせに使う外接矩形
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    pub fn from_points(points: &[Coordinates]) -> Result<Self, String> {
        let mut min_lng = f64::INFINITY;
        let mut max_lng = f64::NEG_INFINITY;
        let mut min_lat = f64::INFINITY;
        let mut max_lat = f64::NEG_INFINITY;

        for p in points {
            if p.lat.is_finite() && p.lng.is_finite() {
                min_lng = min_lng.min(p.lng);
                max_lng = max_lng.max(p.lng);
                min_lat = min_lat.min(p.lat);
                max_lat = max_lat.max(p.lat);
            }
        }

        if !min_lng.is_finite() || !min_lat.is_finite() {
            return Err("Cannot compute bounds of an empty geometry".to_string());
        }

        Ok(Self {
            south: min_lat,
            west: min_lng,
            north: max_lat,
            east: max_lng,
        })
    }

    pub fn center(&self) -> Coordinates {
        Coordinates {
            lat: (self.south + self.north) * 0.5,
            lng: (self.west + self.east) * 0.5,
        }
    }

    pub fn contains(&self, point: &Coordinates) -> bool {
        point.lat >= self.south
            && point.lat <= self.north
            && point.lng >= self.west
            && point.lng <= self.east
    }
}

/// 領域の多角形の閉じたリング（始点 == 終点）
///
/// 辺 `i` は点 `i` から点 `i + 1` まで。完了済みの辺番号はこの位置を指すので、点の並びが変わると意味を失う
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GeoJsonPolygon", into = "GeoJsonPolygon")]
pub struct PolygonRing(Vec<Coordinates>);

impl PolygonRing {
    pub const MIN_VERTICES: usize = 3;

    pub fn new(points: Vec<Coordinates>) -> Result<Self, String> {
        let mut points = points;
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }

        if points.len() < Self::MIN_VERTICES {
            return Err(format!(
                "A polygon needs at least {} vertices (got {})",
                Self::MIN_VERTICES,
                points.len()
            ));
        }
        for p in &points {
            Coordinates::new(p.lat, p.lng)?;
        }
        let distinct = points
            .iter()
            .enumerate()
            .filter(|(i, p)| !points[..*i].contains(p))
            .count();
        if distinct < Self::MIN_VERTICES {
            return Err("A polygon needs at least 3 distinct vertices".to_string());
        }

        let first = points[0];
        points.push(first);
        Ok(Self(points))
    }

    /// 閉じるための終点も含めた全点
    pub fn points(&self) -> &[Coordinates] {
        &self.0
    }

    pub fn edge_count(&self) -> usize {
        self.0.len() - 1
    }

    pub fn edge(&self, index: usize) -> Option<(Coordinates, Coordinates)> {
        if index >= self.edge_count() {
            return None;
        }
        Some((self.0[index], self.0[index + 1]))
    }

    pub fn bounds(&self) -> Result<Bounds, String> {
        Bounds::from_points(&self.0)
    }

    pub fn to_geojson(&self) -> serde_json::Value {
        serde_json::to_value(GeoJsonPolygon::from(self.clone()))
            .unwrap_or(serde_json::Value::Null)
    }
}

/// 通信上の形。外周リング1本の GeoJSON `Polygon`、座標は `[lng, lat]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoJsonPolygon {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Vec<Vec<[f64; 2]>>,
}

impl TryFrom<GeoJsonPolygon> for PolygonRing {
    type Error = String;

    fn try_from(value: GeoJsonPolygon) -> Result<Self, Self::Error> {
        if value.kind != "Polygon" {
            return Err(format!("Expected GeoJSON Polygon, got {}", value.kind));
        }
        let outer = value
            .coordinates
            .into_iter()
            .next()
            .ok_or_else(|| "GeoJSON polygon has no rings".to_string())?;
        let points = outer
            .into_iter()
            .map(|[lng, lat]| Coordinates { lat, lng })
            .collect();
        PolygonRing::new(points)
    }
}

impl From<PolygonRing> for GeoJsonPolygon {
    fn from(ring: PolygonRing) -> Self {
        Self {
            kind: "Polygon".to_string(),
            coordinates: vec![ring.0.iter().map(|p| [p.lng, p.lat]).collect()],
        }
    }
}
