use super::rows::ErrorBody;
use crate::application::ports::SessionToken;
use crate::shared::config::BackendConfig;
use crate::shared::error::AppError;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const REST_PATH: &str = "rest/v1";
const AUTH_PATH: &str = "auth/v1";

/// PostgREST と認証サーバー向けの薄いクライアント
///
/// 全リクエストに公開キーを付ける。Bearer はセッショントークンがあればそれ、なければ公開キー
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    token: SessionToken,
}

impl RestClient {
    pub fn new(config: &BackendConfig, token: SessionToken) -> Result<Self, AppError> {
        // 起動時にURLの形式だけ検証しておく
        Url::parse(&config.url)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .build()?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            token,
        })
    }

    pub fn session_token(&self) -> &SessionToken {
        &self.token
    }

    fn url(&self, prefix: &str, path: &str, query: &[(&str, String)]) -> Result<Url, AppError> {
        let mut url = Url::parse(&format!("{}/{}/{}", self.base_url, prefix, path))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let bearer = self
            .token
            .get()
            .await
            .unwrap_or_else(|| self.anon_key.clone());
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    /// `GET /rest/v1/<table>`。クエリは PostgREST 形式
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, AppError> {
        let url = self.url(REST_PATH, table, query)?;
        debug!(table, "select");
        let response = self.request(Method::GET, url).await.send().await?;
        read_json(response).await
    }

    /// 1行挿入して保存後の行を返す
    pub async fn insert<B, T>(&self, table: &str, body: &B) -> Result<T, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(REST_PATH, table, &[])?;
        debug!(table, "insert");
        let response = self
            .request(Method::POST, url)
            .await
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        let rows: Vec<T> = read_json(response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AppError::Internal(format!("insert into {table} returned no row")))
    }

    /// `column=eq.value` に一致する行を更新して返す。一致なしは `NotFound`
    pub async fn update<B, T>(
        &self,
        table: &str,
        column: &str,
        value: &str,
        body: &B,
    ) -> Result<Vec<T>, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(REST_PATH, table, &[(column, format!("eq.{value}"))])?;
        debug!(table, column, value, "update");
        let response = self
            .request(Method::PATCH, url)
            .await
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        let rows: Vec<T> = read_json(response).await?;
        if rows.is_empty() {
            return Err(AppError::NotFound(format!("{table} {value}")));
        }
        Ok(rows)
    }

    /// `column=eq.value` に一致する行を削除し、削除件数を返す
    pub async fn delete(&self, table: &str, column: &str, value: &str) -> Result<usize, AppError> {
        let url = self.url(REST_PATH, table, &[(column, format!("eq.{value}"))])?;
        debug!(table, column, value, "delete");
        let response = self
            .request(Method::DELETE, url)
            .await
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let rows: Vec<serde_json::Value> = read_json(response).await?;
        Ok(rows.len())
    }

    /// `POST /rest/v1/rpc/<name>`
    pub async fn rpc<B, T>(&self, name: &str, body: &B) -> Result<T, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(REST_PATH, &format!("rpc/{name}"), &[])?;
        debug!(name, "rpc");
        let response = self
            .request(Method::POST, url)
            .await
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }

    /// 認証エンドポイントを呼ぶ。`bearer` を渡すと保持中のトークンより優先
    pub async fn auth<B, T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
        bearer: Option<&str>,
    ) -> Result<T, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(AUTH_PATH, path, query)?;
        let mut builder = self
            .http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer.unwrap_or(self.anon_key.as_str()));
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = builder.send().await?;
        read_json(response).await
    }

    /// [`RestClient::auth`] と同じだがレスポンス本文は読まない
    pub async fn auth_no_content(&self, path: &str, bearer: &str) -> Result<(), AppError> {
        let url = self.url(AUTH_PATH, path, &[])?;
        let response = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
            .send()
            .await?;
        check_status(response).await.map(|_| ())
    }
}

async fn check_status(response: Response) -> Result<Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    });
    warn!(status = status.as_u16(), %message, "backend rejected request");
    Err(AppError::Backend {
        status: status.as_u16(),
        message,
    })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, AppError> {
    let response = check_status(response).await?;
    let bytes = response.bytes().await?;
    // 本文なしの 204 は null として扱う
    let slice: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
    serde_json::from_slice(slice).map_err(|e| AppError::DeserializationError(e.to_string()))
}

/// エラー本文から表示用のメッセージを取り出す
pub(crate) fn error_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed
        .message
        .or(parsed.msg)
        .or(parsed.error_description)
        .or(parsed.error)
        .filter(|m| !m.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> BackendConfig {
        BackendConfig {
            url: url.to_string(),
            anon_key: "anon".to_string(),
            request_timeout: 5,
        }
    }

    #[test]
    fn builds_postgrest_urls() {
        let client = RestClient::new(&config("https://demo.supabase.co/"), SessionToken::new())
            .unwrap();
        let url = client
            .url(
                REST_PATH,
                "territorios",
                &[("select", "*".into()), ("order", "numero.asc".into())],
            )
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://demo.supabase.co/rest/v1/territorios?select=*&order=numero.asc"
        );
    }

    #[test]
    fn rejects_malformed_base_url() {
        let result = RestClient::new(&config("not a url"), SessionToken::new());
        assert!(matches!(result, Err(AppError::ConfigurationError(_))));
    }

    #[test]
    fn error_message_prefers_message_field() {
        let body = r#"{"code":"23505","message":"duplicate key value violates unique constraint"}"#;
        assert_eq!(
            error_message(body).as_deref(),
            Some("duplicate key value violates unique constraint")
        );
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#)
                .as_deref(),
            Some("Invalid login credentials")
        );
        assert_eq!(error_message("<html>"), None);
    }
}
