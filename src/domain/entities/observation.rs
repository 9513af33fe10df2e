use crate::domain::value_objects::{Coordinates, ObservationId, TerritoryId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    pub id: ObservationId,
    pub territorio_id: TerritoryId,
    pub coordenadas: Coordinates,
    pub comentario: String,
    #[serde(default)]
    pub usuario_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Observation {
    /// 送信できずキューに回したときに呼び出し元へ返す値
    pub fn local(change_id: &str, draft: &NewObservation, created_at: DateTime<Utc>) -> Self {
        Self {
            id: ObservationId::local(change_id),
            territorio_id: draft.territorio_id.clone(),
            coordenadas: draft.coordenadas,
            comentario: draft.comentario.clone(),
            usuario_id: Some(draft.usuario_id.clone()),
            created_at,
        }
    }

    pub fn is_pending_sync(&self) -> bool {
        self.id.is_local()
    }
}

/// `observaciones` テーブルへの挿入内容
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewObservation {
    pub territorio_id: TerritoryId,
    pub coordenadas: Coordinates,
    pub comentario: String,
    pub usuario_id: UserId,
}

/// 領域ごとにまとめる。各グループは新しい順
pub fn group_by_territory(observations: &[Observation]) -> BTreeMap<TerritoryId, Vec<Observation>> {
    let mut groups: BTreeMap<TerritoryId, Vec<Observation>> = BTreeMap::new();
    for observation in observations {
        groups
            .entry(observation.territorio_id.clone())
            .or_default()
            .push(observation.clone());
    }
    for group in groups.values_mut() {
        group.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn observation(id: &str, territory: &str, created_at: DateTime<Utc>) -> Observation {
        Observation {
            id: ObservationId::new(id.into()).unwrap(),
            territorio_id: TerritoryId::new(territory.into()).unwrap(),
            coordenadas: Coordinates { lat: 1.0, lng: 2.0 },
            comentario: "Nadie en casa".into(),
            usuario_id: None,
            created_at,
        }
    }

    #[test]
    fn groups_by_territory_newest_first() {
        let now = Utc::now();
        let list = vec![
            observation("o1", "t1", now - Duration::hours(2)),
            observation("o2", "t2", now),
            observation("o3", "t1", now),
        ];

        let groups = group_by_territory(&list);
        assert_eq!(groups.len(), 2);
        let t1 = &groups[&TerritoryId::new("t1".into()).unwrap()];
        assert_eq!(t1[0].id.as_str(), "o3");
        assert_eq!(t1[1].id.as_str(), "o1");
    }

    #[test]
    fn local_observation_is_marked_pending() {
        let draft = NewObservation {
            territorio_id: TerritoryId::new("t1".into()).unwrap(),
            coordenadas: Coordinates { lat: 1.0, lng: 2.0 },
            comentario: "Perro".into(),
            usuario_id: UserId::new("u1".into()).unwrap(),
        };
        let local = Observation::local("abc", &draft, Utc::now());
        assert!(local.is_pending_sync());
        assert_eq!(local.comentario, "Perro");
    }
}
