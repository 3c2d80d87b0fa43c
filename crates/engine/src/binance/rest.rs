use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::{debug, info};

use common::{AccountProvider, AccountSettings, Candle, CandleSource, Error, Result};

const BASE_URL: &str = "https://api.binance.com";
const KLINES_PAGE_LIMIT: usize = 1000;
const ONE_MINUTE_MS: i64 = 60_000;

/// REST API client for Binance. Used for historical candles and account queries.
pub struct BinanceClient {
    api_key: String,
    secret: String,
    quote_asset: String,
    http: Client,
}

impl BinanceClient {
    pub fn new(
        api_key: impl Into<String>,
        secret: impl Into<String>,
        quote_asset: impl Into<String>,
    ) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            api_key: api_key.into(),
            secret: secret.into(),
            quote_asset: quote_asset.into(),
            http,
        })
    }

    /// Check the credentials by reading the account. Logs what the key can do.
    pub async fn verify(&self) -> Result<()> {
        info!("Start client verification");
        let account = self.account().await?;
        info!(
            account_type = %account.account_type,
            can_trade = account.can_trade,
            balances = account.balances.len(),
            "Verification has been passed successfully"
        );
        Ok(())
    }

    fn sign(&self, query: &str) -> Result<String> {
        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| Error::Exchange(e.to_string()))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    async fn signed_get(&self, path: &str, params: &str) -> Result<String> {
        let ts = Utc::now().timestamp_millis();
        let query = if params.is_empty() {
            format!("timestamp={ts}")
        } else {
            format!("{params}&timestamp={ts}")
        };
        let signature = self.sign(&query)?;
        let url = format!("{BASE_URL}{path}?{query}&signature={signature}");

        let resp = self
            .http
            .get(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        read_body(resp).await
    }

    async fn public_get(&self, path: &str, params: &str) -> Result<String> {
        let url = format!("{BASE_URL}{path}?{params}");
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        read_body(resp).await
    }

    async fn account(&self) -> Result<AccountResponse> {
        let body = self.signed_get("/api/v3/account", "").await?;
        serde_json::from_str(&body).map_err(|e| Error::Exchange(e.to_string()))
    }
}

async fn read_body(resp: reqwest::Response) -> Result<String> {
    let status = resp.status();
    let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

    if !status.is_success() {
        return Err(Error::Exchange(format!("HTTP {status}: {body}")));
    }
    Ok(body)
}

#[async_trait]
impl CandleSource for BinanceClient {
    async fn historic_candles(
        &self,
        instrument: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        let end_ms = to.timestamp_millis();
        let mut start_ms = from.timestamp_millis();
        let mut candles = Vec::new();

        while start_ms < end_ms {
            let params = format!(
                "symbol={instrument}&interval=1m&startTime={start_ms}&endTime={end_ms}&limit={KLINES_PAGE_LIMIT}"
            );
            let body = self.public_get("/api/v3/klines", &params).await?;
            let rows: Vec<Vec<Value>> = serde_json::from_str(&body)?;
            let page_len = rows.len();

            for row in &rows {
                candles.push(parse_kline_row(instrument, row)?);
            }
            debug!(instrument, page = page_len, total = candles.len(), "Downloaded klines page");

            match candles.last() {
                Some(last) if page_len == KLINES_PAGE_LIMIT => {
                    start_ms = last.timestamp.timestamp_millis() + ONE_MINUTE_MS;
                }
                _ => break,
            }
        }

        info!(instrument, count = candles.len(), %from, %to, "Historic candles downloaded");
        Ok(candles)
    }
}

#[async_trait]
impl AccountProvider for BinanceClient {
    async fn trading_account_id(&self, settings: &AccountSettings) -> Result<Option<String>> {
        let account = self.account().await?;
        info!(
            account_type = %account.account_type,
            can_trade = account.can_trade,
            "Client account"
        );
        Ok(select_account(&account, &self.quote_asset, settings))
    }

    async fn cash_balance(&self, account_id: &str) -> Result<Decimal> {
        let account = self.account().await?;
        let cash = account.free_balance(&self.quote_asset);
        debug!(account_id, asset = %self.quote_asset, %cash, "Cash balance");
        Ok(cash)
    }
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    can_trade: bool,
    account_type: String,
    #[serde(default)]
    uid: u64,
    balances: Vec<Balance>,
}

impl AccountResponse {
    fn free_balance(&self, asset: &str) -> Decimal {
        self.balances
            .iter()
            .find(|b| b.asset == asset)
            .and_then(|b| b.free.parse().ok())
            .unwrap_or(Decimal::ZERO)
    }
}

#[derive(Debug, Deserialize)]
struct Balance {
    asset: String,
    free: String,
}

/// Accept the account when it can trade and holds enough free quote asset.
fn select_account(
    account: &AccountResponse,
    quote_asset: &str,
    settings: &AccountSettings,
) -> Option<String> {
    if !account.can_trade {
        return None;
    }
    let liquid = account.free_balance(quote_asset);
    if liquid < settings.min_liquid_portfolio {
        info!(%liquid, required = %settings.min_liquid_portfolio, "Account balance is below the minimum");
        return None;
    }
    Some(format!("{}-{}", account.account_type.to_lowercase(), account.uid))
}

/// Binance kline row: `[openTime, open, high, low, close, volume, closeTime, ...]`
/// with prices and volume as strings.
fn parse_kline_row(instrument: &str, row: &[Value]) -> Result<Candle> {
    let field = |i: usize| -> Result<Decimal> {
        row.get(i)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Exchange(format!("kline field {i} missing")))?
            .parse()
            .map_err(|e| Error::Exchange(format!("kline field {i}: {e}")))
    };
    let open_time = row
        .first()
        .and_then(Value::as_i64)
        .ok_or_else(|| Error::Exchange("kline open time missing".into()))?;
    let timestamp = Utc
        .timestamp_millis_opt(open_time)
        .single()
        .ok_or_else(|| Error::Exchange(format!("kline open time {open_time} out of range")))?;

    Ok(Candle {
        instrument: instrument.to_string(),
        open: field(1)?,
        high: field(2)?,
        low: field(3)?,
        close: field(4)?,
        volume: field(5)?,
        timestamp,
    })
}
