use crate::domain::value_objects::{Bounds, PolygonRing, TerritoryId, TerritoryStatus, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Territory {
    pub id: TerritoryId,
    pub numero: u32,
    #[serde(default)]
    pub nombre: Option<String>,
    pub geometria_poligono: PolygonRing,
    #[serde(default)]
    pub estado: TerritoryStatus,
    #[serde(default)]
    pub ultima_fecha_completado: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub lados_completados: BTreeSet<u32>,
    #[serde(default)]
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Territory {
    /// 状態を変える。完了日時は `completado` になるときだけ書く
    pub fn apply_status(&mut self, status: TerritoryStatus, now: DateTime<Utc>) {
        let patch = TerritoryStatusPatch::for_transition(status, now);
        self.estado = patch.estado;
        if let Some(completed_at) = patch.ultima_fecha_completado {
            self.ultima_fecha_completado = Some(completed_at);
        }
        self.updated_at = now;
    }

    /// 辺1本の完了フラグを反転し、新しい値を返す
    pub fn toggle_edge(&mut self, index: u32) -> Result<bool, String> {
        let edges = self.geometria_poligono.edge_count();
        if index as usize >= edges {
            return Err(format!(
                "Edge {index} is out of range (territory has {edges} edges)"
            ));
        }
        let completed = if self.lados_completados.remove(&index) {
            false
        } else {
            self.lados_completados.insert(index);
            true
        };
        self.updated_at = Utc::now();
        Ok(completed)
    }

    /// リングを差し替える。辺番号は位置依存なので完了済みの辺はクリアする
    pub fn replace_geometry(&mut self, ring: PolygonRing) {
        if ring != self.geometria_poligono {
            self.lados_completados.clear();
            self.geometria_poligono = ring;
            self.updated_at = Utc::now();
        }
    }

    pub fn bounds(&self) -> Result<Bounds, String> {
        self.geometria_poligono.bounds()
    }

    pub fn display_name(&self) -> String {
        match &self.nombre {
            Some(nombre) => format!("#{} {}", self.numero, nombre),
            None => format!("#{}", self.numero),
        }
    }
}

/// `territorios` テーブルへの挿入内容
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewTerritory {
    pub numero: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nombre: Option<String>,
    pub geometria_poligono: PolygonRing,
    pub estado: TerritoryStatus,
    pub lados_completados: BTreeSet<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<UserId>,
}

impl NewTerritory {
    pub fn new(
        numero: u32,
        nombre: Option<String>,
        geometria_poligono: PolygonRing,
        created_by: Option<UserId>,
    ) -> Self {
        Self {
            numero,
            nombre: nombre
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            geometria_poligono,
            estado: TerritoryStatus::Pendiente,
            lados_completados: BTreeSet::new(),
            created_by,
        }
    }
}

/// 状態変更の更新内容
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TerritoryStatusPatch {
    pub estado: TerritoryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ultima_fecha_completado: Option<DateTime<Utc>>,
}

impl TerritoryStatusPatch {
    pub fn for_transition(status: TerritoryStatus, now: DateTime<Utc>) -> Self {
        Self {
            estado: status,
            ultima_fecha_completado: (status == TerritoryStatus::Completado).then_some(now),
        }
    }
}

pub fn ensure_unique_numero(existing: &[Territory], numero: u32) -> Result<(), String> {
    if numero == 0 {
        return Err("El número de territorio debe ser un entero positivo".to_string());
    }
    if existing.iter().any(|t| t.numero == numero) {
        return Err(format!("Ya existe un territorio con el número {numero}"));
    }
    Ok(())
}

/// 現地作業リストの並び順
///
/// `pendiente` を番号順で先頭に置き、残りは完了日時の古い順（未完了が先）。同じなら番号順
pub fn field_work_cmp(a: &Territory, b: &Territory) -> Ordering {
    let a_pending = a.estado == TerritoryStatus::Pendiente;
    let b_pending = b.estado == TerritoryStatus::Pendiente;
    match (a_pending, b_pending) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => a.numero.cmp(&b.numero),
        (false, false) => a
            .ultima_fecha_completado
            .cmp(&b.ultima_fecha_completado)
            .then_with(|| a.numero.cmp(&b.numero)),
    }
}

pub fn sort_for_field_work(territories: &[Territory]) -> Vec<Territory> {
    let mut sorted = territories.to_vec();
    sorted.sort_by(field_work_cmp);
    sorted
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<BTreeSet<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<BTreeSet<u32>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::domain::value_objects::Coordinates;

    pub fn square_ring() -> PolygonRing {
        PolygonRing::new(vec![
            Coordinates { lat: 40.0, lng: -3.0 },
            Coordinates { lat: 40.0, lng: -2.9 },
            Coordinates { lat: 40.1, lng: -2.9 },
            Coordinates { lat: 40.1, lng: -3.0 },
        ])
        .unwrap()
    }

    pub fn territory(numero: u32, estado: TerritoryStatus) -> Territory {
        let now = Utc::now();
        Territory {
            id: TerritoryId::new(format!("t-{numero}")).unwrap(),
            numero,
            nombre: None,
            geometria_poligono: square_ring(),
            estado,
            ultima_fecha_completado: None,
            lados_completados: BTreeSet::new(),
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{square_ring, territory};
    use super::*;
    use crate::domain::value_objects::Coordinates;
    use chrono::Duration;

    #[test]
    fn completing_stamps_timestamp() {
        let mut t = territory(1, TerritoryStatus::Iniciado);
        let now = Utc::now();
        t.apply_status(TerritoryStatus::Completado, now);
        assert_eq!(t.estado, TerritoryStatus::Completado);
        assert_eq!(t.ultima_fecha_completado, Some(now));
    }

    #[test]
    fn other_transitions_never_set_completion() {
        for status in [TerritoryStatus::Pendiente, TerritoryStatus::Iniciado] {
            let mut t = territory(1, TerritoryStatus::Pendiente);
            t.apply_status(status, Utc::now());
            assert!(t.ultima_fecha_completado.is_none());

            let patch = TerritoryStatusPatch::for_transition(status, Utc::now());
            let body = serde_json::to_value(&patch).unwrap();
            assert!(body.get("ultima_fecha_completado").is_none());
        }
    }

    #[test]
    fn duplicate_numbers_are_rejected() {
        let existing = vec![territory(12, TerritoryStatus::Pendiente)];
        assert!(ensure_unique_numero(&existing, 12).is_err());
        assert!(ensure_unique_numero(&existing, 0).is_err());
        assert!(ensure_unique_numero(&existing, 13).is_ok());
    }

    #[test]
    fn field_work_puts_pending_first_then_oldest_completion() {
        let now = Utc::now();
        let mut recent = territory(1, TerritoryStatus::Completado);
        recent.ultima_fecha_completado = Some(now);
        let mut old = territory(2, TerritoryStatus::Completado);
        old.ultima_fecha_completado = Some(now - Duration::days(30));
        let started = territory(3, TerritoryStatus::Iniciado);
        let pending_high = territory(9, TerritoryStatus::Pendiente);
        let pending_low = territory(4, TerritoryStatus::Pendiente);

        let sorted = sort_for_field_work(&[recent, old, started, pending_high, pending_low]);
        let numbers: Vec<u32> = sorted.iter().map(|t| t.numero).collect();
        assert_eq!(numbers, vec![4, 9, 3, 2, 1]);
    }

    #[test]
    fn toggle_edge_checks_range() {
        let mut t = territory(1, TerritoryStatus::Iniciado);
        assert_eq!(t.toggle_edge(2), Ok(true));
        assert!(t.lados_completados.contains(&2));
        assert_eq!(t.toggle_edge(2), Ok(false));
        assert!(t.toggle_edge(4).is_err());
    }

    #[test]
    fn geometry_change_clears_completed_edges() {
        let mut t = territory(1, TerritoryStatus::Iniciado);
        t.toggle_edge(0).unwrap();

        t.replace_geometry(square_ring());
        assert_eq!(t.lados_completados.len(), 1);

        let triangle = PolygonRing::new(vec![
            Coordinates { lat: 40.0, lng: -3.0 },
            Coordinates { lat: 40.0, lng: -2.9 },
            Coordinates { lat: 40.1, lng: -2.9 },
        ])
        .unwrap();
        t.replace_geometry(triangle);
        assert!(t.lados_completados.is_empty());
    }

    #[test]
    fn null_completed_edges_deserialize_as_empty() {
        let json = serde_json::json!({
            "id": "abc",
            "numero": 5,
            "nombre": null,
            "geometria_poligono": square_ring().to_geojson(),
            "estado": "pendiente",
            "ultima_fecha_completado": null,
            "lados_completados": null,
            "created_by": null,
            "created_at": "2024-05-01T10:00:00+00:00",
            "updated_at": "2024-05-01T10:00:00+00:00"
        });
        let t: Territory = serde_json::from_value(json).unwrap();
        assert!(t.lados_completados.is_empty());
        assert_eq!(t.numero, 5);
    }
}
