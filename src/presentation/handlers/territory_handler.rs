use super::validate_input;
use crate::{
    application::services::TerritoryService,
    domain::value_objects::{PolygonRing, TerritoryId},
    presentation::dto::territory_dto::{
        parse_numero, CreateTerritoryRequest, DeleteTerritoryRequest, TerritoryResponse,
        ToggleEdgeRequest, UpdateGeometryRequest, UpdateTerritoryStatusRequest,
    },
    shared::{error::AppError, ValidationFailureKind},
};
use std::sync::Arc;

pub struct TerritoryHandler {
    territory_service: Arc<TerritoryService>,
}

pub(crate) fn parse_territory_id(raw: &str) -> Result<TerritoryId, AppError> {
    TerritoryId::new(raw.trim().to_string()).map_err(AppError::InvalidInput)
}

fn parse_ring(points: Vec<crate::domain::value_objects::Coordinates>) -> Result<PolygonRing, AppError> {
    PolygonRing::new(points)
        .map_err(AppError::validation_mapper(ValidationFailureKind::InvalidPolygon))
}

impl TerritoryHandler {
    pub fn new(territory_service: Arc<TerritoryService>) -> Self {
        Self { territory_service }
    }

    pub async fn list_territories(&self) -> Result<Vec<TerritoryResponse>, AppError> {
        let territories = self.territory_service.list_territories().await?;
        Ok(territories.into_iter().map(TerritoryResponse::from).collect())
    }

    pub async fn field_work_list(&self) -> Result<Vec<TerritoryResponse>, AppError> {
        let territories = self.territory_service.field_work_list().await?;
        Ok(territories.into_iter().map(TerritoryResponse::from).collect())
    }

    pub async fn create_territory(
        &self,
        request: CreateTerritoryRequest,
    ) -> Result<TerritoryResponse, AppError> {
        validate_input(&request)?;

        let numero = parse_numero(&request.numero)
            .map_err(AppError::validation_mapper(ValidationFailureKind::InvalidNumber))?;
        let ring = parse_ring(request.puntos)?;

        let territory = self
            .territory_service
            .create_territory(numero, request.nombre, ring)
            .await?;
        Ok(territory.into())
    }

    pub async fn update_status(
        &self,
        request: UpdateTerritoryStatusRequest,
    ) -> Result<TerritoryResponse, AppError> {
        validate_input(&request)?;
        let status = request
            .status()
            .map_err(AppError::validation_mapper(ValidationFailureKind::UnknownValue))?;
        let id = parse_territory_id(&request.territory_id)?;

        Ok(self
            .territory_service
            .update_status(&id, status)
            .await?
            .into())
    }

    pub async fn toggle_edge(&self, request: ToggleEdgeRequest) -> Result<TerritoryResponse, AppError> {
        validate_input(&request)?;
        let id = parse_territory_id(&request.territory_id)?;

        Ok(self
            .territory_service
            .toggle_edge(&id, request.edge)
            .await?
            .into())
    }

    pub async fn update_geometry(
        &self,
        request: UpdateGeometryRequest,
    ) -> Result<TerritoryResponse, AppError> {
        validate_input(&request)?;
        let id = parse_territory_id(&request.territory_id)?;
        let ring = parse_ring(request.puntos)?;

        Ok(self
            .territory_service
            .update_geometry(&id, ring)
            .await?
            .into())
    }

    pub async fn delete_territory(&self, request: DeleteTerritoryRequest) -> Result<(), AppError> {
        validate_input(&request)?;
        let id = parse_territory_id(&request.territory_id)?;
        self.territory_service.delete_territory(&id).await
    }
}
