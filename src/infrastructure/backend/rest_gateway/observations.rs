use super::RestGateway;
use crate::application::ports::ObservationGateway;
use crate::domain::entities::{NewObservation, Observation, TABLE_OBSERVATIONS};
use crate::domain::value_objects::{ObservationId, TerritoryId};
use crate::infrastructure::backend::rows::CommentPatch;
use crate::shared::error::AppError;
use async_trait::async_trait;

#[async_trait]
impl ObservationGateway for RestGateway {
    async fn list_observations(
        &self,
        territory_id: Option<TerritoryId>,
    ) -> Result<Vec<Observation>, AppError> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("order", "created_at.desc".to_string()),
        ];
        if let Some(id) = &territory_id {
            query.push(("territorio_id", format!("eq.{id}")));
        }
        self.client.select(TABLE_OBSERVATIONS, &query).await
    }

    async fn create_observation(&self, draft: &NewObservation) -> Result<Observation, AppError> {
        self.client.insert(TABLE_OBSERVATIONS, draft).await
    }

    async fn update_observation(
        &self,
        id: &ObservationId,
        comentario: &str,
    ) -> Result<Observation, AppError> {
        let rows: Vec<Observation> = self
            .client
            .update(
                TABLE_OBSERVATIONS,
                "id",
                id.as_str(),
                &CommentPatch { comentario },
            )
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("observación {id}")))
    }

    async fn delete_observation(&self, id: &ObservationId) -> Result<(), AppError> {
        let removed = self
            .client
            .delete(TABLE_OBSERVATIONS, "id", id.as_str())
            .await?;
        if removed == 0 {
            return Err(AppError::NotFound(format!("observación {id}")));
        }
        Ok(())
    }
}
