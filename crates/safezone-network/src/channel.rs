//! 스트리밍 듀플렉스 채널 — `StreamLink` 포트 구현.
//!
//! 클라이언트당 논리 채널은 항상 1개다. `connect()`는 기존 채널을
//! 먼저 해체하고, 해체는 읽기 태스크 중단 + 보류 중 재연결 취소 +
//! 연결 epoch 증가로 이루어진다. 전송 오류 시 즉시 `Lost`를 알리고
//! 고정 지연 후 단 한 번의 `ReconnectDue(epoch)` 신호를 보낸다 —
//! 재연결을 실제로 수행할지는 수신측(세션 컨트롤러)이 판단하며,
//! epoch가 다른 신호는 양쪽 모두에서 폐기된다.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use safezone_core::config::ServerConfig;
use safezone_core::error::CoreError;
use safezone_core::models::channel::{ChannelEvent, ChannelState};
use safezone_core::models::frame::StreamFrame;
use safezone_core::ports::stream::StreamLink;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// 스트리밍 엔드포인트 경로
const WS_PATH: &str = "/ws";

/// 소유자와 읽기 태스크가 공유하는 채널 상태.
/// `ChannelState`는 이 객체가 단독으로 소유/전이한다.
struct Shared {
    state: Mutex<ChannelState>,
    epoch: AtomicU64,
}

/// WebSocket 듀플렉스 채널
pub struct StreamChannel {
    ws_url: String,
    reconnect_delay: Duration,
    events_tx: mpsc::Sender<ChannelEvent>,
    shared: Arc<Shared>,
    write: Option<Arc<tokio::sync::Mutex<WsSink>>>,
    read_task: Option<JoinHandle<()>>,
}

impl StreamChannel {
    /// 새 채널 생성. 수신 이벤트는 `events_tx`로 전달된다.
    pub fn new(config: &ServerConfig, events_tx: mpsc::Sender<ChannelEvent>) -> Self {
        let ws_url = format!(
            "{}{}",
            config
                .base_url
                .trim_end_matches('/')
                .replace("http://", "ws://")
                .replace("https://", "wss://"),
            WS_PATH
        );

        Self {
            ws_url,
            reconnect_delay: config.reconnect_delay(),
            events_tx,
            shared: Arc::new(Shared {
                state: Mutex::new(ChannelState::Closed),
                epoch: AtomicU64::new(0),
            }),
            write: None,
            read_task: None,
        }
    }

    /// 기존 채널 해체 — epoch 증가로 이전 태스크의 모든 후속
    /// 이벤트(보류 중 재연결 포함)를 무효화한다.
    fn teardown(&mut self) {
        self.shared.epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = self.read_task.take() {
            task.abort();
        }
        self.write = None;
        *self.shared.state.lock() = ChannelState::Closed;
    }
}

#[async_trait]
impl StreamLink for StreamChannel {
    async fn connect(&mut self) -> Result<(), CoreError> {
        // 논리 채널은 항상 1개 — 이전 채널을 먼저 해체한다
        self.teardown();

        *self.shared.state.lock() = ChannelState::Connecting;
        info!("채널 연결: {}", self.ws_url);

        let (ws_stream, _) = match tokio_tungstenite::connect_async(&self.ws_url).await {
            Ok(ok) => ok,
            Err(e) => {
                *self.shared.state.lock() = ChannelState::Closed;
                return Err(CoreError::Channel(format!("채널 연결 실패: {e}")));
            }
        };

        let (write, read) = ws_stream.split();
        self.write = Some(Arc::new(tokio::sync::Mutex::new(write)));
        *self.shared.state.lock() = ChannelState::Open;

        let epoch = self.shared.epoch.load(Ordering::SeqCst);
        self.read_task = Some(tokio::spawn(read_loop(
            read,
            self.shared.clone(),
            epoch,
            self.events_tx.clone(),
            self.reconnect_delay,
        )));

        let _ = self.events_tx.send(ChannelEvent::Opened).await;
        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Some(write) = self.write.take() {
            let mut sink = write.lock().await;
            if let Err(e) = sink.send(Message::Close(None)).await {
                debug!("채널 종료 프레임 전송 실패 (무시): {e}");
            }
        }
        self.teardown();
        debug!("채널 해제 완료");
    }

    fn state(&self) -> ChannelState {
        *self.shared.state.lock()
    }

    fn epoch(&self) -> u64 {
        self.shared.epoch.load(Ordering::SeqCst)
    }

    async fn send_raw(&self, text: &str) -> Result<(), CoreError> {
        let write = self
            .write
            .as_ref()
            .ok_or_else(|| CoreError::Channel("채널이 열려 있지 않음".to_string()))?;

        write
            .lock()
            .await
            .send(Message::text(text))
            .await
            .map_err(|e| CoreError::Channel(format!("채널 전송 실패: {e}")))
    }
}

impl Drop for StreamChannel {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// 수신 루프.
///
/// 전송 오류 시: 상태를 Erroring으로 전이, `Lost` 통지, 지연 후
/// epoch가 여전히 현재일 때만 `ReconnectDue`를 1회 보내고 종료한다.
async fn read_loop(
    mut read: SplitStream<WsStream>,
    shared: Arc<Shared>,
    epoch: u64,
    events_tx: mpsc::Sender<ChannelEvent>,
    reconnect_delay: Duration,
) {
    let stale = |shared: &Shared| shared.epoch.load(Ordering::SeqCst) != epoch;

    while let Some(message) = read.next().await {
        if stale(&shared) {
            return;
        }

        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<StreamFrame>(&text) {
                Ok(frame) => {
                    if events_tx.send(ChannelEvent::Frame(frame)).await.is_err() {
                        return;
                    }
                }
                // 서비스는 프레임 외의 진단 메시지도 보낼 수 있다
                Err(e) => debug!("프레임이 아닌 메시지 무시: {e}"),
            },
            Ok(Message::Close(_)) => {
                if !stale(&shared) {
                    *shared.state.lock() = ChannelState::Closed;
                    let _ = events_tx.send(ChannelEvent::Closed).await;
                }
                return;
            }
            Ok(_) => {} // Ping/Pong은 자동 처리
            Err(e) => {
                if stale(&shared) {
                    return;
                }
                warn!("채널 수신 에러: {e}");
                *shared.state.lock() = ChannelState::Erroring;
                let _ = events_tx.send(ChannelEvent::Lost(e.to_string())).await;

                // 단발 재연결 신호. disconnect()가 이 태스크를 중단하므로
                // 의도적 해제 뒤에는 신호가 살아남지 않는다.
                tokio::time::sleep(reconnect_delay).await;
                if !stale(&shared) {
                    let _ = events_tx.send(ChannelEvent::ReconnectDue(epoch)).await;
                }
                return;
            }
        }
    }

    // Close 프레임 없이 스트림 소진 — 정상 종료로 취급
    if !stale(&shared) {
        *shared.state.lock() = ChannelState::Closed;
        let _ = events_tx.send(ChannelEvent::Closed).await;
    }
}
