use std::fmt;

use crate::{
    amount::Amount,
    error::{
        ApiError,
        ApiResult,
    },
    round::{
        BetRecord,
        BetTotals,
        Color,
        HistoryEntry,
        Round,
    },
};
use reqwest::RequestBuilder;
use serde::{
    Deserialize,
    Serialize,
    de::DeserializeOwned,
};

pub const USER_ID_HEADER: &str = "X-Telegram-User-Id";
pub const INIT_DATA_HEADER: &str = "X-Telegram-Init-Data";

const CURRENT_PATH: &str = "/api/games/rolls/current";
const BET_PATH: &str = "/api/games/rolls/bet";
const HISTORY_PATH: &str = "/api/games/rolls/history";
const BETS_PATH: &str = "/api/games/rolls/bets";
const BALANCE_PATH: &str = "/api/user/balance";

/// Identity pair supplied by the host environment. Opaque to this client.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UserIdentity {
    pub user_id: u64,
    pub init_data: String,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize)]
pub struct Balance {
    pub balance: Amount,
    #[serde(default)]
    pub ref_balance: Amount,
}

/// The backend operations the Rolls screen depends on.
pub trait RollsApi {
    fn current_round(&self) -> impl Future<Output = ApiResult<Round>> + Send;

    fn place_bet(
        &self,
        color: Color,
        amount: Amount,
    ) -> impl Future<Output = ApiResult<()>> + Send;

    /// Most recent resolved rounds, newest first.
    fn history(
        &self,
        limit: usize,
    ) -> impl Future<Output = ApiResult<Vec<HistoryEntry>>> + Send;

    fn bet_totals(
        &self,
        game_number: u64,
    ) -> impl Future<Output = ApiResult<BetTotals>> + Send;

    fn balance(&self) -> impl Future<Output = ApiResult<Balance>> + Send;
}

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    identity: UserIdentity,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct PlaceBetDto {
    color: Color,
    amount: Amount,
}

#[derive(Deserialize)]
struct RejectionDto {
    error: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, identity: UserIdentity) -> ApiResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .build()
            .map_err(|source| ApiError::Network {
                endpoint: base_url.clone(),
                source,
            })?;
        Ok(Self {
            base_url,
            identity,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn with_identity(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(USER_ID_HEADER, self.identity.user_id.to_string())
            .header(INIT_DATA_HEADER, self.identity.init_data.as_str())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ApiResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let request = self.with_identity(self.http.get(url).query(query));
        self.send_json(path, request).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> ApiResult<T> {
        let res = request.send().await.map_err(|source| ApiError::Network {
            endpoint: endpoint.to_string(),
            source,
        })?;
        let status = res.status();
        let bytes = res.bytes().await.map_err(|source| ApiError::Network {
            endpoint: endpoint.to_string(),
            source,
        })?;
        if !status.is_success() {
            return Err(ApiError::Rejected {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                reason: rejection_reason(&bytes, status),
            });
        }
        serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
        })
    }
}

impl RollsApi for ApiClient {
    async fn current_round(&self) -> ApiResult<Round> {
        self.get_json(CURRENT_PATH, &[]).await
    }

    async fn place_bet(&self, color: Color, amount: Amount) -> ApiResult<()> {
        let url = format!("{}{}", self.base_url, BET_PATH);
        let request = self
            .with_identity(self.http.post(url))
            .json(&PlaceBetDto { color, amount });
        let _: serde_json::Value = self.send_json(BET_PATH, request).await?;
        Ok(())
    }

    async fn history(&self, limit: usize) -> ApiResult<Vec<HistoryEntry>> {
        self.get_json(HISTORY_PATH, &[("limit", limit.to_string())])
            .await
    }

    async fn bet_totals(&self, game_number: u64) -> ApiResult<BetTotals> {
        let records: Vec<BetRecord> = self
            .get_json(BETS_PATH, &[("game_number", game_number.to_string())])
            .await?;
        Ok(BetTotals::from_records(game_number, &records))
    }

    async fn balance(&self) -> ApiResult<Balance> {
        self.get_json(BALANCE_PATH, &[]).await
    }
}

fn rejection_reason(body: &[u8], status: reqwest::StatusCode) -> String {
    if let Ok(dto) = serde_json::from_slice::<RejectionDto>(body) {
        return dto.error;
    }
    let text = String::from_utf8_lossy(body).trim().to_string();
    if text.is_empty() {
        status.to_string()
    } else {
        text
    }
}

impl fmt::Display for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn rejection_reason__json_error_body__uses_error_field() {
        let body = br#"{"error": "Insufficient balance"}"#;
        assert_eq!(
            rejection_reason(body, StatusCode::BAD_REQUEST),
            "Insufficient balance"
        );
    }

    #[test]
    fn rejection_reason__empty_body__falls_back_to_status() {
        assert_eq!(
            rejection_reason(b"", StatusCode::SERVICE_UNAVAILABLE),
            "503 Service Unavailable"
        );
    }

    #[test]
    fn place_bet_dto__serializes_amount_in_ton() {
        let dto = PlaceBetDto {
            color: Color::Green,
            amount: Amount::from_nanotons(250_000_000),
        };
        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json, serde_json::json!({"color": "green", "amount": 0.25}));
    }

    #[test]
    fn new__trims_trailing_slash() {
        let client = ApiClient::new("http://localhost:8080/", UserIdentity::default()).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
    }
}
