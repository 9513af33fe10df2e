use super::RestGateway;
use crate::application::ports::TerritoryGateway;
use crate::domain::entities::{NewTerritory, Territory, TerritoryStatusPatch, TABLE_TERRITORIES};
use crate::domain::value_objects::{PolygonRing, TerritoryId};
use crate::infrastructure::backend::rows::{EdgesPatch, GeometryPatch};
use crate::shared::error::AppError;
use async_trait::async_trait;
use std::collections::BTreeSet;

impl RestGateway {
    async fn patch_territory<B>(&self, id: &TerritoryId, body: &B) -> Result<Territory, AppError>
    where
        B: serde::Serialize + Sync,
    {
        let rows: Vec<Territory> = self
            .client
            .update(TABLE_TERRITORIES, "id", id.as_str(), body)
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("territorio {id}")))
    }
}

#[async_trait]
impl TerritoryGateway for RestGateway {
    async fn list_territories(&self) -> Result<Vec<Territory>, AppError> {
        let mut territories: Vec<Territory> = self
            .client
            .select(
                TABLE_TERRITORIES,
                &[("select", "*".into()), ("order", "numero.asc".into())],
            )
            .await?;
        // サーバー側の並び順に依存しない
        territories.sort_by_key(|t| t.numero);
        Ok(territories)
    }

    async fn create_territory(&self, draft: &NewTerritory) -> Result<Territory, AppError> {
        self.client.insert(TABLE_TERRITORIES, draft).await
    }

    async fn update_territory_status(
        &self,
        id: &TerritoryId,
        patch: &TerritoryStatusPatch,
    ) -> Result<Territory, AppError> {
        self.patch_territory(id, patch).await
    }

    async fn update_completed_edges(
        &self,
        id: &TerritoryId,
        edges: &BTreeSet<u32>,
    ) -> Result<Territory, AppError> {
        self.patch_territory(
            id,
            &EdgesPatch {
                lados_completados: edges,
            },
        )
        .await
    }

    async fn update_territory_geometry(
        &self,
        id: &TerritoryId,
        ring: &PolygonRing,
    ) -> Result<Territory, AppError> {
        self.patch_territory(
            id,
            &GeometryPatch {
                geometria_poligono: ring,
                lados_completados: BTreeSet::new(),
            },
        )
        .await
    }

    async fn delete_territory(&self, id: &TerritoryId) -> Result<(), AppError> {
        let removed = self
            .client
            .delete(TABLE_TERRITORIES, "id", id.as_str())
            .await?;
        if removed == 0 {
            return Err(AppError::NotFound(format!("territorio {id}")));
        }
        Ok(())
    }
}
