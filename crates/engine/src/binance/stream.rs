use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use futures_util::StreamExt;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tracing::{info, warn};
use url::Url;

use common::{Candle, CandleFeed, CandleSubscription, Error, Result};

const CHANNEL_CAPACITY: usize = 1024;
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Live 1-minute candles from Binance kline WebSocket streams.
#[derive(Debug, Clone, Default)]
pub struct BinanceFeed;

impl CandleFeed for BinanceFeed {
    fn subscribe(&self, instruments: &[String]) -> CandleSubscription {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        // One WebSocket stream per instrument
        let tasks = instruments
            .iter()
            .map(|instrument| tokio::spawn(KlineStream::new(instrument.clone(), tx.clone()).run()))
            .collect();

        info!(?instruments, "Subscribed to candle streams");
        CandleSubscription::new(rx, tasks)
    }
}

/// Kline stream for a single instrument.
///
/// Forwards closed candles only and reconnects with exponential backoff
/// until the receiving side goes away.
struct KlineStream {
    instrument: String,
    tx: mpsc::Sender<Candle>,
}

impl KlineStream {
    fn new(instrument: String, tx: mpsc::Sender<Candle>) -> Self {
        Self { instrument, tx }
    }

    async fn run(self) {
        let mut backoff = Duration::from_secs(1);

        while !self.tx.is_closed() {
            info!(instrument = %self.instrument, "Connecting to Binance WebSocket stream");
            match self.connect_once().await {
                Ok(()) => {
                    info!(instrument = %self.instrument, "WebSocket stream closed cleanly");
                    // Binance closes streams after 24h, reconnect after a short delay
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    backoff = Duration::from_secs(1);
                }
                Err(e) => {
                    warn!(instrument = %self.instrument, error = %e, backoff = ?backoff, "WebSocket error, reconnecting");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
        info!(instrument = %self.instrument, "Candle receiver dropped, stream stopped");
    }

    async fn connect_once(&self) -> Result<()> {
        let url_str = format!(
            "wss://stream.binance.com:9443/ws/{}@kline_1m",
            self.instrument.to_lowercase()
        );
        let url = Url::parse(&url_str).map_err(|e| Error::WebSocket(e.to_string()))?;

        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))?;

        let (_, mut read) = ws_stream.split();

        while let Some(msg) = read.next().await {
            let msg = msg.map_err(|e| Error::WebSocket(e.to_string()))?;

            if let tokio_tungstenite::tungstenite::Message::Text(text) = msg {
                match parse_kline_event(&self.instrument, &text) {
                    Ok(Some(candle)) => {
                        if self.tx.send(candle).await.is_err() {
                            return Ok(());
                        }
                    }
                    Ok(None) => {} // non-kline message or candle still open
                    Err(e) => {
                        warn!(error = %e, "Failed to parse kline event");
                    }
                }
            }
        }

        Ok(())
    }
}

// ─── Binance kline JSON parsing ──────────────────────────────────────────────

#[derive(Deserialize)]
struct KlineWrapper {
    k: KlineData,
}

#[derive(Deserialize)]
struct KlineData {
    #[serde(rename = "t")]
    open_time_ms: i64,
    #[serde(rename = "o")]
    open: Decimal,
    #[serde(rename = "h")]
    high: Decimal,
    #[serde(rename = "l")]
    low: Decimal,
    #[serde(rename = "c")]
    close: Decimal,
    #[serde(rename = "v")]
    volume: Decimal,
    #[serde(rename = "x")]
    is_closed: bool,
}

/// A closed candle from a kline message; `None` for anything else.
fn parse_kline_event(instrument: &str, text: &str) -> Result<Option<Candle>> {
    // Kline messages have an "e" field set to "kline"
    let wrapper: serde_json::Value = serde_json::from_str(text)?;
    if wrapper.get("e").and_then(|v| v.as_str()) != Some("kline") {
        return Ok(None);
    }

    let k = serde_json::from_value::<KlineWrapper>(wrapper)?.k;
    if !k.is_closed {
        return Ok(None);
    }

    let timestamp: DateTime<Utc> = Utc
        .timestamp_millis_opt(k.open_time_ms)
        .single()
        .ok_or_else(|| Error::WebSocket(format!("kline open time {} out of range", k.open_time_ms)))?;

    Ok(Some(Candle {
        instrument: instrument.to_string(),
        open: k.open,
        high: k.high,
        low: k.low,
        close: k.close,
        volume: k.volume,
        timestamp,
    }))
}
