//! 애플리케이션 설정 구조체.
//!
//! 서버 주소, 캔버스 해상도, 캡처 포맷, 렌더링 옵션 등 런타임 설정을
//! 정의한다. `ConfigManager`가 파일에서 로드/저장한다.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 탐지 서비스 연결 설정
    pub server: ServerConfig,
    /// 캔버스(프레임버퍼) 설정
    #[serde(default)]
    pub canvas: CanvasConfig,
    /// 로컬 카메라 캡처 설정
    #[serde(default)]
    pub capture: CaptureConfig,
    /// 렌더링 설정
    #[serde(default)]
    pub render: RenderConfig,
    /// 세션 설정
    #[serde(default)]
    pub session: SessionConfig,
}

/// 탐지 서비스 연결 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 제어 플레인 베이스 URL (스트리밍은 동일 호스트의 `/ws`)
    pub base_url: String,
    /// 제어 요청 타임아웃 (초)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// 탐지 시작 후 채널 오픈까지의 안정화 지연 (밀리초).
    /// 서비스가 영상 소스를 여는 동안 기다리는 외부 관찰 요구사항.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// 채널 오류 후 단발 재연결 지연 (초)
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

/// 캔버스 설정 — 고정 해상도 프레임버퍼
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CanvasConfig {
    /// 캔버스 너비 (픽셀)
    pub width: u32,
    /// 캔버스 높이 (픽셀)
    pub height: u32,
}

/// 로컬 카메라 캡처 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// 카메라 장치 인덱스
    pub camera_index: u32,
    /// 요청 해상도 너비 (ideal — 장치가 가장 가까운 포맷 선택)
    pub ideal_width: u32,
    /// 요청 해상도 높이 (ideal)
    pub ideal_height: u32,
    /// 목표 프레임레이트
    pub fps: u32,
}

/// 렌더링 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderConfig {
    /// 오버레이 텍스트용 TTF 폰트 경로.
    /// 없으면 텍스트 레이어는 배경 도형만 그린다.
    #[serde(default)]
    pub font_path: Option<PathBuf>,
}

/// 세션 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// 결과 로그에 보관할 최근 프레임 수 (가장 오래된 것부터 축출)
    pub results_log_capacity: usize,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_settle_delay_ms() -> u64 {
    1_000
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            ideal_width: 1_280,
            ideal_height: 720,
            fps: 30,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            results_log_capacity: 10,
        }
    }
}

impl AppConfig {
    /// 기본 설정 생성 (로컬 개발 서비스 대상)
    pub fn default_config() -> Self {
        Self {
            server: ServerConfig {
                base_url: "http://127.0.0.1:5000".to_string(),
                request_timeout_secs: default_request_timeout_secs(),
                settle_delay_ms: default_settle_delay_ms(),
                reconnect_delay_secs: default_reconnect_delay_secs(),
            },
            canvas: CanvasConfig::default(),
            capture: CaptureConfig::default(),
            render: RenderConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// 제어 요청 타임아웃
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// 탐지 안정화 지연
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// 재연결 지연
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}
