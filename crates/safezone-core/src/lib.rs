//! # safezone-core
//!
//! SafeZone 클라이언트의 도메인 모델, 포트(trait) 정의, 에러 타입.
//! 모든 크레이트가 공유하는 핵심 타입과 인터페이스를 제공한다.
//!
//! ## 구조
//!
//! - [`models`] — 도메인/와이어 데이터 구조체 (serde Serialize/Deserialize)
//! - [`ports`] — Hexagonal Architecture 포트 인터페이스 (async_trait)
//! - [`error`] — 핵심 에러 타입 (thiserror)
//! - [`config`] — 애플리케이션 설정 구조체
//! - [`config_manager`] — 설정 파일 관리 (로드/저장)

pub mod config;
pub mod config_manager;
pub mod error;
pub mod models;
pub mod ports;

#[cfg(test)]
mod tests {
    #[test]
    fn config_defaults() {
        let config = crate::config::AppConfig::default_config();
        assert_eq!(config.canvas.width, 800);
        assert_eq!(config.canvas.height, 600);
        assert_eq!(config.capture.ideal_width, 1_280);
        assert_eq!(config.capture.ideal_height, 720);
        assert_eq!(config.server.settle_delay_ms, 1_000);
        assert_eq!(config.server.reconnect_delay_secs, 5);
        assert_eq!(config.session.results_log_capacity, 10);
    }

    #[test]
    fn detection_mode_requires_nondegenerate_region() {
        use crate::models::region::Region;

        // 탐지 무장 경로는 커밋된 영역만 통과시킨다 — 커밋 규칙이
        // 곧 비퇴화 불변식이다.
        assert!(Region::from_drag((0.0, 0.0), (9.0, 9.0)).is_none());
        assert!(Region::from_drag((0.0, 0.0), (11.0, 11.0)).is_some());
    }
}
