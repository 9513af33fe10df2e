use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// 領域の作業状態（`estado` 列）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TerritoryStatus {
    #[default]
    Pendiente,
    Iniciado,
    Completado,
}

impl TerritoryStatus {
    pub const ALL: [TerritoryStatus; 3] = [
        TerritoryStatus::Pendiente,
        TerritoryStatus::Iniciado,
        TerritoryStatus::Completado,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TerritoryStatus::Pendiente => "pendiente",
            TerritoryStatus::Iniciado => "iniciado",
            TerritoryStatus::Completado => "completado",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TerritoryStatus::Pendiente => "Pendiente",
            TerritoryStatus::Iniciado => "Iniciado",
            TerritoryStatus::Completado => "Completado",
        }
    }

    /// 地図に描くときの塗り色
    pub fn color(&self) -> &'static str {
        match self {
            TerritoryStatus::Pendiente => "#ef4444",
            TerritoryStatus::Iniciado => "#f59e0b",
            TerritoryStatus::Completado => "#22c55e",
        }
    }
}

impl fmt::Display for TerritoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TerritoryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pendiente" => Ok(TerritoryStatus::Pendiente),
            "iniciado" => Ok(TerritoryStatus::Iniciado),
            "completado" => Ok(TerritoryStatus::Completado),
            other => Err(format!("Unknown territory status: {other}")),
        }
    }
}
