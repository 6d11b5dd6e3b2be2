//! SafeZone 핵심 에러 타입.
//!
//! 모든 어댑터 crate는 실패를 `CoreError`로 매핑해 세션 컨트롤러 경계까지
//! 전달한다. 어떤 변형도 프로세스를 종료시키지 않는다 — 전부 사용자 알림과
//! 결정적 상태 롤백으로 번역된다.

use thiserror::Error;

/// 코어 레이어 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 카메라 하드웨어/권한 실패 — 세션은 Idle로 복귀
    #[error("카메라 에러: {0}")]
    Capture(String),

    /// 제어 플레인 실패 (non-2xx 응답)
    #[error("Server Error: {status} - {message}")]
    Request {
        /// HTTP 상태 코드
        status: u16,
        /// 서버 메시지 (`detail` 필드 우선)
        message: String,
    },

    /// 클라이언트 측 네트워크 에러 — 응답 코드 이전의 실패 (연결 거부, 타임아웃)
    #[error("Client Error: {0}")]
    Network(String),

    /// 스트리밍 채널 전송 계층 실패
    #[error("채널 에러: {0}")]
    Channel(String),

    /// 사용자 동작의 사전 조건 미충족 (영역 없음, 빈 URL 등) — 상태 변화 없음
    #[error("사전 조건 위반: {0}")]
    Precondition(String),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),
}

impl CoreError {
    /// non-2xx 응답을 `Request` 에러로 변환.
    ///
    /// 본문이 JSON이고 `detail` 필드를 포함하면 그 값을 메시지로 쓴다
    /// (서비스의 에러 관례).
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(String::from))
            .unwrap_or_else(|| body.to_string());
        CoreError::Request { status, message }
    }
}
