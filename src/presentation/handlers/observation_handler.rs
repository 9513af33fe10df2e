use super::territory_handler::parse_territory_id;
use super::validate_input;
use crate::{
    application::services::ObservationService,
    domain::value_objects::{Coordinates, ObservationId},
    presentation::dto::observation_dto::{
        CreateObservationRequest, DeleteObservationRequest, ListObservationsRequest,
        ObservationResponse, TerritoryObservationsResponse, UpdateObservationRequest,
    },
    shared::{error::AppError, ValidationFailureKind},
};
use std::sync::Arc;

pub struct ObservationHandler {
    observation_service: Arc<ObservationService>,
}

fn parse_observation_id(raw: &str) -> Result<ObservationId, AppError> {
    ObservationId::new(raw.trim().to_string()).map_err(AppError::InvalidInput)
}

impl ObservationHandler {
    pub fn new(observation_service: Arc<ObservationService>) -> Self {
        Self {
            observation_service,
        }
    }

    pub async fn list_observations(
        &self,
        request: ListObservationsRequest,
    ) -> Result<Vec<ObservationResponse>, AppError> {
        let territory_id = request
            .territorio_id
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .map(parse_territory_id)
            .transpose()?;

        let observations = self
            .observation_service
            .list_observations(territory_id)
            .await?;
        Ok(observations.into_iter().map(ObservationResponse::from).collect())
    }

    /// 領域ごとにまとめた一覧
    pub async fn grouped_by_territory(
        &self,
    ) -> Result<Vec<TerritoryObservationsResponse>, AppError> {
        let groups = self.observation_service.grouped_by_territory().await?;
        Ok(groups
            .into_iter()
            .map(|(territory_id, observations)| TerritoryObservationsResponse {
                territorio_id: territory_id.to_string(),
                observations: observations.into_iter().map(ObservationResponse::from).collect(),
            })
            .collect())
    }

    pub async fn create_observation(
        &self,
        request: CreateObservationRequest,
    ) -> Result<ObservationResponse, AppError> {
        validate_input(&request)?;
        let territory_id = parse_territory_id(&request.territorio_id)?;
        let coordinates = Coordinates::new(request.lat, request.lng)
            .map_err(AppError::validation_mapper(ValidationFailureKind::InvalidCoordinates))?;

        let observation = self
            .observation_service
            .create_observation(territory_id, coordinates, &request.comentario)
            .await?;
        Ok(observation.into())
    }

    pub async fn update_observation(
        &self,
        request: UpdateObservationRequest,
    ) -> Result<ObservationResponse, AppError> {
        validate_input(&request)?;
        let id = parse_observation_id(&request.observation_id)?;

        Ok(self
            .observation_service
            .update_observation(&id, &request.comentario)
            .await?
            .into())
    }

    pub async fn delete_observation(&self, request: DeleteObservationRequest) -> Result<(), AppError> {
        validate_input(&request)?;
        let id = parse_observation_id(&request.observation_id)?;
        self.observation_service.delete_observation(&id).await
    }
}
