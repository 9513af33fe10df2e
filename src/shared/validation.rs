use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// フォーム入力やドメイン検証の失敗理由。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ValidationFailureKind {
    /// 汎用的なバリデーションエラー。
    Generic,
    /// 必須項目が空の場合。
    EmptyField,
    /// 番号が正の整数でない場合。
    InvalidNumber,
    /// 既存の領域と番号が重複した場合。
    DuplicateNumber,
    /// ポリゴンの頂点数や座標が不正な場合。
    InvalidPolygon,
    /// 座標が範囲外の場合。
    InvalidCoordinates,
    /// 辺のインデックスがリングの範囲外の場合。
    EdgeOutOfRange,
    /// 不明な状態・ロール値。
    UnknownValue,
}

impl ValidationFailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationFailureKind::Generic => "generic",
            ValidationFailureKind::EmptyField => "empty_field",
            ValidationFailureKind::InvalidNumber => "invalid_number",
            ValidationFailureKind::DuplicateNumber => "duplicate_number",
            ValidationFailureKind::InvalidPolygon => "invalid_polygon",
            ValidationFailureKind::InvalidCoordinates => "invalid_coordinates",
            ValidationFailureKind::EdgeOutOfRange => "edge_out_of_range",
            ValidationFailureKind::UnknownValue => "unknown_value",
        }
    }
}

impl fmt::Display for ValidationFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationFailureKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generic" => Ok(ValidationFailureKind::Generic),
            "empty_field" => Ok(ValidationFailureKind::EmptyField),
            "invalid_number" => Ok(ValidationFailureKind::InvalidNumber),
            "duplicate_number" => Ok(ValidationFailureKind::DuplicateNumber),
            "invalid_polygon" => Ok(ValidationFailureKind::InvalidPolygon),
            "invalid_coordinates" => Ok(ValidationFailureKind::InvalidCoordinates),
            "edge_out_of_range" => Ok(ValidationFailureKind::EdgeOutOfRange),
            "unknown_value" => Ok(ValidationFailureKind::UnknownValue),
            _ => Err(()),
        }
    }
}
