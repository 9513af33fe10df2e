use super::Validate;
use crate::domain::entities::Observation;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ObservationResponse {
    pub id: String,
    pub territorio_id: String,
    pub lat: f64,
    pub lng: f64,
    pub comentario: String,
    pub usuario_id: Option<String>,
    pub created_at: i64,
    /// まだサーバーに送られていない
    pub pending_sync: bool,
}

impl From<Observation> for ObservationResponse {
    fn from(observation: Observation) -> Self {
        Self {
            pending_sync: observation.is_pending_sync(),
            id: observation.id.to_string(),
            territorio_id: observation.territorio_id.to_string(),
            lat: observation.coordenadas.lat,
            lng: observation.coordenadas.lng,
            comentario: observation.comentario,
            usuario_id: observation.usuario_id.map(|id| id.to_string()),
            created_at: observation.created_at.timestamp(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct ListObservationsRequest {
    pub territorio_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateObservationRequest {
    pub territorio_id: String,
    pub lat: f64,
    pub lng: f64,
    pub comentario: String,
}

impl Validate for CreateObservationRequest {
    fn validate(&self) -> Result<(), String> {
        if self.territorio_id.trim().is_empty() {
            return Err("Territory ID is required".to_string());
        }
        if self.comentario.trim().is_empty() {
            return Err("El comentario no puede estar vacío".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateObservationRequest {
    pub observation_id: String,
    pub comentario: String,
}

impl Validate for UpdateObservationRequest {
    fn validate(&self) -> Result<(), String> {
        if self.observation_id.trim().is_empty() {
            return Err("Observation ID is required".to_string());
        }
        if self.comentario.trim().is_empty() {
            return Err("El comentario no puede estar vacío".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteObservationRequest {
    pub observation_id: String,
}

impl Validate for DeleteObservationRequest {
    fn validate(&self) -> Result<(), String> {
        if self.observation_id.trim().is_empty() {
            return Err("Observation ID is required".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TerritoryObservationsResponse {
    pub territorio_id: String,
    pub observations: Vec<ObservationResponse>,
}
