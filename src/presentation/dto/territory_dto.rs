use super::Validate;
use crate::domain::entities::Territory;
use crate::domain::value_objects::{Coordinates, GeoJsonPolygon, TerritoryStatus};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// レスポンスDTO
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TerritoryResponse {
    pub id: String,
    pub numero: u32,
    pub nombre: Option<String>,
    pub label: String,
    pub estado: String,
    pub estado_label: String,
    pub color: String,
    pub geometria_poligono: GeoJsonPolygon,
    pub lados_completados: Vec<u32>,
    pub ultima_fecha_completado: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<Territory> for TerritoryResponse {
    fn from(territory: Territory) -> Self {
        Self {
            id: territory.id.to_string(),
            numero: territory.numero,
            label: territory.display_name(),
            nombre: territory.nombre,
            estado: territory.estado.as_str().to_string(),
            estado_label: territory.estado.label().to_string(),
            color: territory.estado.color().to_string(),
            geometria_poligono: territory.geometria_poligono.into(),
            lados_completados: territory.lados_completados.into_iter().collect(),
            ultima_fecha_completado: territory.ultima_fecha_completado.map(|at| at.timestamp()),
            created_at: territory.created_at.timestamp(),
            updated_at: territory.updated_at.timestamp(),
        }
    }
}

/// 番号はフォームの文字列のまま受け取る
pub fn parse_numero(raw: &str) -> Result<u32, String> {
    match raw.trim().parse::<u32>() {
        Ok(numero) if numero > 0 => Ok(numero),
        _ => Err("El número de territorio debe ser un entero positivo".to_string()),
    }
}

// リクエストDTO
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTerritoryRequest {
    pub numero: String,
    pub nombre: Option<String>,
    pub puntos: Vec<Coordinates>,
}

impl Validate for CreateTerritoryRequest {
    fn validate(&self) -> Result<(), String> {
        if self.numero.trim().is_empty() {
            return Err("El número es obligatorio".to_string());
        }
        if self.puntos.len() < 3 {
            return Err("Dibuja el territorio en el mapa primero".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateTerritoryStatusRequest {
    pub territory_id: String,
    pub estado: String,
}

impl UpdateTerritoryStatusRequest {
    pub fn status(&self) -> Result<TerritoryStatus, String> {
        TerritoryStatus::from_str(&self.estado)
    }
}

impl Validate for UpdateTerritoryStatusRequest {
    fn validate(&self) -> Result<(), String> {
        if self.territory_id.trim().is_empty() {
            return Err("Territory ID is required".to_string());
        }
        self.status().map(|_| ())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleEdgeRequest {
    pub territory_id: String,
    pub edge: u32,
}

impl Validate for ToggleEdgeRequest {
    fn validate(&self) -> Result<(), String> {
        if self.territory_id.trim().is_empty() {
            return Err("Territory ID is required".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateGeometryRequest {
    pub territory_id: String,
    pub puntos: Vec<Coordinates>,
}

impl Validate for UpdateGeometryRequest {
    fn validate(&self) -> Result<(), String> {
        if self.territory_id.trim().is_empty() {
            return Err("Territory ID is required".to_string());
        }
        if self.puntos.len() < 3 {
            return Err("El polígono necesita al menos 3 vértices".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteTerritoryRequest {
    pub territory_id: String,
}

impl Validate for DeleteTerritoryRequest {
    fn validate(&self) -> Result<(), String> {
        if self.territory_id.trim().is_empty() {
            return Err("Territory ID is required".to_string());
        }
        Ok(())
    }
}
