//! WebSocket session with ibkr-bridge
//!
//! One reader task routes historical-bar replies to the request awaiting them
//! (by `req_id`) and forwards ticks into a channel; one writer task owns the
//! sink and keeps the connection alive with pings.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use super::MarketDataSource;
use super::protocol::{BridgeMessage, ClientMessage};
use crate::shared::config::{BridgeConfig, HistoryWindow};
use crate::shared::error::BridgeError;
use crate::shared::types::{Bar, Contract, Tick};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type BarsReply = oneshot::Sender<Result<Vec<Bar>, BridgeError>>;
type PendingRequests = Arc<Mutex<HashMap<u64, BarsReply>>>;

/// Connection status for ibkr-bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

/// Live session with ibkr-bridge
pub struct BridgeSession {
    url: String,
    outbound_tx: mpsc::UnboundedSender<Message>,
    pending: PendingRequests,
    next_req_id: AtomicU64,
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
    status_rx: watch::Receiver<ConnectionStatus>,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl BridgeSession {
    /// Connect and complete the hello/welcome handshake.
    ///
    /// Returns the session and the receiver for ticks of subscribed contracts.
    pub async fn connect(config: BridgeConfig) -> Result<(Self, mpsc::Receiver<Tick>), BridgeError> {
        let url = config.url();
        info!("Connecting to ibkr-bridge at {}", url);

        let ws_stream = match tokio::time::timeout(config.connect_timeout, connect_async(&url)).await {
            Ok(Ok((ws_stream, _))) => ws_stream,
            Ok(Err(e)) => {
                return Err(BridgeError::Connect {
                    url,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(BridgeError::Connect {
                    url,
                    reason: format!("no response within {:?}", config.connect_timeout),
                });
            }
        };

        let (mut write, mut read) = ws_stream.split();

        let hello = ClientMessage::Hello {
            client_id: config.client_id,
            readonly: config.readonly,
        };
        write
            .send(Message::Text(serde_json::to_string(&hello)?.into()))
            .await?;

        let welcome = tokio::time::timeout(config.connect_timeout, await_welcome(&mut read))
            .await
            .map_err(|_| {
                BridgeError::Handshake(format!("no welcome within {:?}", config.connect_timeout))
            })??;
        info!(
            client_id = config.client_id,
            readonly = config.readonly,
            "Connected to ibkr-bridge{}",
            welcome.map(|m| format!(": {}", m)).unwrap_or_default()
        );

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (tick_tx, tick_rx) = mpsc::channel(config.tick_buffer_size);
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connected);
        let status_tx = Arc::new(status_tx);
        let pending = PendingRequests::default();

        let writer = tokio::spawn(run_writer(write, outbound_rx, config.ping_interval));
        let reader = tokio::spawn(run_reader(
            read,
            Arc::clone(&pending),
            tick_tx,
            Arc::clone(&status_tx),
        ));

        let session = Self {
            url,
            outbound_tx,
            pending,
            next_req_id: AtomicU64::new(1),
            status_tx,
            status_rx,
            reader: Some(reader),
            writer: Some(writer),
        };

        Ok((session, tick_rx))
    }

    /// Watch connection status changes
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn send(&self, message: &ClientMessage) -> Result<(), BridgeError> {
        let text = serde_json::to_string(message)?;
        self.outbound_tx
            .send(Message::Text(text.into()))
            .map_err(|_| BridgeError::ConnectionClosed)
    }
}

#[async_trait]
impl MarketDataSource for BridgeSession {
    fn is_connected(&self) -> bool {
        *self.status_rx.borrow() == ConnectionStatus::Connected
    }

    async fn historical_bars(
        &self,
        contract: &Contract,
        window: &HistoryWindow,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, BridgeError> {
        if !self.is_connected() {
            return Err(BridgeError::NotConnected);
        }

        let req_id = self.next_req_id.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.lock().insert(req_id, reply_tx);

        let request = ClientMessage::HistoricalBars {
            req_id,
            symbol: contract.symbol.clone(),
            exchange: contract.exchange.clone(),
            currency: contract.currency.clone(),
            end_date_time: end.format("%Y%m%d-%H:%M:%S").to_string(),
            duration: window.duration.clone(),
            bar_size: window.bar_size.clone(),
            what_to_show: window.what_to_show.clone(),
            use_rth: window.use_rth,
            timezone: window.timezone.clone(),
        };
        if let Err(e) = self.send(&request) {
            self.pending.lock().remove(&req_id);
            return Err(e);
        }
        debug!(req_id, symbol = %contract.symbol, "Requested historical bars");

        match tokio::time::timeout(window.timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(BridgeError::ConnectionClosed),
            Err(_) => {
                self.pending.lock().remove(&req_id);
                Err(BridgeError::Timeout {
                    secs: window.timeout.as_secs(),
                })
            }
        }
    }

    async fn subscribe_ticks(&self, contract: &Contract) -> Result<(), BridgeError> {
        if !self.is_connected() {
            return Err(BridgeError::NotConnected);
        }
        self.send(&ClientMessage::SubscribeTicks {
            symbol: contract.symbol.clone(),
            exchange: contract.exchange.clone(),
            currency: contract.currency.clone(),
        })?;
        info!("Subscribed to ticks for {}", contract);
        Ok(())
    }

    async fn disconnect(&mut self) {
        let Some(writer) = self.writer.take() else {
            return;
        };

        // Writer exits after forwarding the close frame
        let _ = self.send(&ClientMessage::Goodbye);
        let _ = self.outbound_tx.send(Message::Close(None));
        if tokio::time::timeout(Duration::from_secs(2), writer).await.is_err() {
            debug!("ibkr-bridge writer did not finish in time");
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }

        let _ = self.status_tx.send(ConnectionStatus::Disconnected);
        fail_pending(&self.pending, BridgeError::ConnectionClosed);
        info!("Disconnected from ibkr-bridge");
    }
}

impl Drop for BridgeSession {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// Wait for the welcome frame, skipping anything else the bridge sends first
async fn await_welcome(read: &mut SplitStream<WsStream>) -> Result<Option<String>, BridgeError> {
    while let Some(msg) = read.next().await {
        match msg? {
            Message::Text(text) => match serde_json::from_str::<BridgeMessage>(&text) {
                Ok(BridgeMessage::Welcome { message }) => return Ok(message),
                Ok(BridgeMessage::Error { message, .. }) => return Err(BridgeError::Handshake(message)),
                Ok(_) => {}
                Err(e) => debug!("Ignoring unparseable handshake frame: {}", e),
            },
            Message::Close(_) => return Err(BridgeError::ConnectionClosed),
            _ => {}
        }
    }
    Err(BridgeError::ConnectionClosed)
}

async fn run_writer(
    mut write: SplitSink<WsStream, Message>,
    mut outbound_rx: mpsc::UnboundedReceiver<Message>,
    ping_interval: Duration,
) {
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + ping_interval, ping_interval);

    loop {
        tokio::select! {
            msg = outbound_rx.recv() => {
                let Some(msg) = msg else {
                    break;
                };
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = write.send(msg).await {
                    debug!("Failed to send to ibkr-bridge: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
            _ = interval.tick() => {
                if write.send(Message::Ping(vec![].into())).await.is_err() {
                    debug!("Failed to send ping, connection likely dead");
                    break;
                }
            }
        }
    }
}

async fn run_reader(
    mut read: SplitStream<WsStream>,
    pending: PendingRequests,
    tick_tx: mpsc::Sender<Tick>,
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
) {
    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<BridgeMessage>(&text) {
                Ok(bridge_msg) => route_message(bridge_msg, &pending, &tick_tx, &status_tx),
                Err(e) => {
                    // Don't spam logs for every unparseable message
                    let preview: String = text.chars().take(100).collect();
                    debug!("Failed to parse ibkr message: {} - {}", e, preview);
                }
            },
            Ok(Message::Close(_)) => {
                warn!("ibkr-bridge connection closed");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                error!("ibkr-bridge error: {}", e);
                break;
            }
        }
    }

    let _ = status_tx.send(ConnectionStatus::Disconnected);
    fail_pending(&pending, BridgeError::ConnectionClosed);
}

fn route_message(
    msg: BridgeMessage,
    pending: &PendingRequests,
    tick_tx: &mpsc::Sender<Tick>,
    status_tx: &watch::Sender<ConnectionStatus>,
) {
    match msg {
        BridgeMessage::HistoricalBars { req_id, bars } => {
            let bars: Vec<Bar> = bars.into_iter().filter_map(|b| b.into_bar()).collect();
            complete(pending, req_id, Ok(bars));
        }
        BridgeMessage::Error {
            req_id: Some(req_id),
            code,
            message,
        } => {
            complete(
                pending,
                req_id,
                Err(BridgeError::Remote {
                    code: code.unwrap_or(-1),
                    message,
                }),
            );
        }
        BridgeMessage::Error { code, message, .. } => {
            warn!(?code, "ibkr-bridge: {}", message);
        }
        tick @ BridgeMessage::Tick { .. } => {
            if let Some(tick) = tick.into_tick() {
                if let Err(mpsc::error::TrySendError::Full(_)) = tick_tx.try_send(tick) {
                    debug!("Tick channel full, dropping tick");
                }
            }
        }
        BridgeMessage::Status { connected } => {
            let status = match connected {
                Some(false) => ConnectionStatus::Disconnected,
                _ => ConnectionStatus::Connected,
            };
            debug!(?status, "Received status from ibkr-bridge");
            let _ = status_tx.send(status);
        }
        BridgeMessage::Welcome { .. } => {
            debug!("Received welcome from ibkr-bridge");
        }
    }
}

fn complete(pending: &PendingRequests, req_id: u64, result: Result<Vec<Bar>, BridgeError>) {
    match pending.lock().remove(&req_id) {
        Some(reply) => {
            let _ = reply.send(result);
        }
        None => debug!(req_id, "Reply for unknown or expired request"),
    }
}

fn fail_pending(pending: &PendingRequests, error: BridgeError) {
    for (_, reply) in pending.lock().drain() {
        let _ = reply.send(Err(error.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    /// Loopback bridge stub: answers every client frame with `handler`'s replies
    async fn spawn_stub<F>(handler: F) -> u16
    where
        F: Fn(serde_json::Value) -> Vec<String> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = accept_async(stream).await.unwrap();
            let (mut write, mut read) = ws.split();
            while let Some(Ok(msg)) = read.next().await {
                if let Message::Text(text) = msg {
                    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
                    for reply in handler(value) {
                        if write.send(Message::Text(reply.into())).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });

        port
    }

    fn default_handler(value: serde_json::Value) -> Vec<String> {
        match value["type"].as_str() {
            Some("hello") => vec![r#"{"type":"welcome","message":"stub"}"#.to_string()],
            Some("historical_bars") => {
                let req_id = value["req_id"].as_u64().unwrap();
                let close = if value["symbol"] == "NVDA" { 100.0 } else { 50.0 };
                vec![format!(
                    r#"{{"type":"historical_bars","req_id":{},"bars":[{{"ts":1717421400000,"open":{c},"high":{c},"low":{c},"close":{c}}},{{"ts":1717421460000,"open":{c},"high":{c},"low":{c},"close":{c}}}]}}"#,
                    req_id,
                    c = close
                )]
            }
            Some("subscribe_ticks") => vec![format!(
                r#"{{"type":"tick","symbol":{},"ts":1717421400000,"px":101.25}}"#,
                value["symbol"]
            )],
            _ => vec![],
        }
    }

    fn config(port: u16) -> BridgeConfig {
        BridgeConfig::default()
            .with_address("127.0.0.1", port)
            .with_connect_timeout(Duration::from_secs(2))
    }

    fn window(timeout: Duration) -> HistoryWindow {
        HistoryWindow {
            timeout,
            ..HistoryWindow::console()
        }
    }

    #[tokio::test]
    async fn test_historical_bars_round_trip() {
        let port = spawn_stub(default_handler).await;
        let (mut session, _ticks) = BridgeSession::connect(config(port)).await.unwrap();
        assert!(session.is_connected());

        let nvda = Contract::stock("NVDA", "NASDAQ");
        let tsm = Contract::stock("TSM", "NASDAQ");
        let w = window(Duration::from_secs(2));

        let a = session.historical_bars(&nvda, &w, Utc::now()).await.unwrap();
        let b = session.historical_bars(&tsm, &w, Utc::now()).await.unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(a[0].close, 100.0);
        assert_eq!(b[1].close, 50.0);
        assert_eq!(a[1].time.timestamp_millis(), 1_717_421_460_000);

        session.disconnect().await;
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_ticks_forwarded_to_channel() {
        let port = spawn_stub(default_handler).await;
        let (mut session, mut ticks) = BridgeSession::connect(config(port)).await.unwrap();

        session
            .subscribe_ticks(&Contract::stock("NVDA", "NASDAQ"))
            .await
            .unwrap();

        let tick = tokio::time::timeout(Duration::from_secs(2), ticks.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tick.symbol, "NVDA");
        assert_eq!(tick.last, Some(101.25));

        session.disconnect().await;
    }

    #[tokio::test]
    async fn test_unanswered_request_times_out() {
        let port = spawn_stub(|value| match value["type"].as_str() {
            Some("hello") => vec![r#"{"type":"welcome"}"#.to_string()],
            _ => vec![],
        })
        .await;
        let (session, _ticks) = BridgeSession::connect(config(port)).await.unwrap();

        let result = session
            .historical_bars(
                &Contract::stock("NVDA", "NASDAQ"),
                &window(Duration::from_millis(200)),
                Utc::now(),
            )
            .await;
        assert_eq!(result, Err(BridgeError::Timeout { secs: 0 }));
        assert!(session.pending.lock().is_empty());
    }

    #[tokio::test]
    async fn test_error_frame_fails_request() {
        let port = spawn_stub(|value| match value["type"].as_str() {
            Some("hello") => vec![r#"{"type":"welcome"}"#.to_string()],
            Some("historical_bars") => vec![format!(
                r#"{{"type":"error","req_id":{},"code":162,"message":"HMDS query returned no data"}}"#,
                value["req_id"]
            )],
            _ => vec![],
        })
        .await;
        let (session, _ticks) = BridgeSession::connect(config(port)).await.unwrap();

        let result = session
            .historical_bars(
                &Contract::stock("TSM", "NASDAQ"),
                &window(Duration::from_secs(2)),
                Utc::now(),
            )
            .await;
        assert!(matches!(result, Err(BridgeError::Remote { code: 162, .. })));
    }

    #[tokio::test]
    async fn test_rejected_handshake() {
        let port = spawn_stub(|_| vec![r#"{"type":"error","message":"client id in use"}"#.to_string()]).await;
        let result = BridgeSession::connect(config(port)).await;
        assert!(matches!(result, Err(BridgeError::Handshake(msg)) if msg == "client id in use"));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = BridgeSession::connect(config(port)).await;
        let err = result.err().unwrap();
        assert!(matches!(err, BridgeError::Connect { .. }));
        assert!(err.is_terminal());
    }
}
