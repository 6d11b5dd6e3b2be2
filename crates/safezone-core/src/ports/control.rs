//! 탐지 서비스 제어 플레인 포트.
//!
//! 구현: `safezone-network` crate (reqwest)

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::CoreError;
use crate::models::region::Region;
use crate::models::source::VideoSource;

/// 제어 엔드포인트 공통 응답
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse {
    /// 처리 결과 ("success" 등)
    pub status: String,
    /// 사람이 읽을 메시지
    #[serde(default)]
    pub message: String,
}

/// 서비스 헬스 체크 응답
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub model_loaded: bool,
}

/// HTTP 제어 플레인 클라이언트.
///
/// 전부 단발(one-shot) 호출이다. non-2xx는 `CoreError::Request`로
/// 실패하며, 호출자는 실패 시 채널을 열어서는 안 된다.
#[async_trait]
pub trait ControlApi: Send + Sync {
    /// 서비스 헬스 체크 (`GET /`)
    async fn health(&self) -> Result<HealthResponse, CoreError>;

    /// 프리뷰 시작 (`POST /start-preview`).
    ///
    /// 탐지 미무장 상태이므로 제로 영역 플레이스홀더를 보낸다.
    async fn start_preview(
        &self,
        source: VideoSource,
        rtsp_url: Option<&str>,
    ) -> Result<ApiResponse, CoreError>;

    /// 탐지 시작 (`POST /start-detection`) — 실제 영역 + 소스 메타데이터
    async fn start_detection(
        &self,
        source: VideoSource,
        region: Region,
        rtsp_url: Option<&str>,
    ) -> Result<ApiResponse, CoreError>;

    /// 탐지 중지 (`POST /stop-detection`)
    async fn stop_detection(&self) -> Result<ApiResponse, CoreError>;

    /// 종료 시 단방향 탐지 중지 통보 (fire-and-forget).
    ///
    /// 응답 여부에 정확성이 의존하면 안 된다 — 실패는 로그만 남긴다.
    fn notify_stop_detection(&self);
}
