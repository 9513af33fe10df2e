mod auth;
mod observations;
mod replay;
mod territories;
mod users;

use super::client::RestClient;

pub const TABLE_USER_ROLES: &str = "user_roles";
pub const TABLE_PROFILES: &str = "profiles";

/// ホスト型バックエンドへのゲートウェイ。各ポートの実装はテーブルごとのファイルに分割している
#[derive(Clone)]
pub struct RestGateway {
    client: RestClient,
}

impl RestGateway {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &RestClient {
        &self.client
    }
}
