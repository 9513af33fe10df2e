use crate::domain::entities::{AuthUser, Session, UserAccount};
use crate::domain::value_objects::{PolygonRing, Role, UserId};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// PostgREST と認証サーバーのエラー本文
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserRoleRow {
    pub user_id: UserId,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileRow {
    pub user_id: UserId,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Unix 秒
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

#[derive(Debug, Serialize)]
pub struct PasswordCredentials<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SignUpBody<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub data: SignUpMetadata,
}

#[derive(Debug, Serialize)]
pub struct SignUpMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EdgesPatch<'a> {
    pub lados_completados: &'a BTreeSet<u32>,
}

#[derive(Debug, Serialize)]
pub struct GeometryPatch<'a> {
    pub geometria_poligono: &'a PolygonRing,
    pub lados_completados: BTreeSet<u32>,
}

#[derive(Debug, Serialize)]
pub struct CommentPatch<'a> {
    pub comentario: &'a str,
}

#[derive(Debug, Serialize)]
pub struct UpdateRoleParams<'a> {
    pub user_id: &'a UserId,
    pub new_role: Role,
}

pub fn session_from_token(token: TokenResponse, now: DateTime<Utc>) -> Session {
    let expires_at = token
        .expires_at
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .or_else(|| token.expires_in.map(|secs| now + Duration::seconds(secs)));

    Session {
        access_token: token.access_token,
        refresh_token: token.refresh_token,
        expires_at,
        user: token.user,
    }
}

/// ロール行とプロフィールを結合する
///
/// ロール行のないユーザーは含めない。プロフィールがなければ氏名は空
pub fn join_accounts(roles: Vec<UserRoleRow>, profiles: Vec<ProfileRow>) -> Vec<UserAccount> {
    let mut by_user: HashMap<UserId, ProfileRow> = profiles
        .into_iter()
        .map(|p| (p.user_id.clone(), p))
        .collect();

    let mut accounts: Vec<UserAccount> = roles
        .into_iter()
        .map(|row| {
            let profile = by_user.remove(&row.user_id);
            UserAccount {
                id: row.user_id,
                email: profile.as_ref().and_then(|p| p.email.clone()),
                full_name: profile.and_then(|p| p.full_name),
                role: row.role,
            }
        })
        .collect();

    accounts.sort_by_key(|a| a.display_name().to_lowercase());
    accounts
}
