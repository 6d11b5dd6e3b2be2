//! 로컬 캡처 포트.
//!
//! 구현: `safezone-capture` crate (nokhwa)

use async_trait::async_trait;

use crate::error::CoreError;

/// 로컬 비디오 캡처 소스.
///
/// 프레임은 구현체가 생성 시 받은 채널로 전달된다. 컨트롤러는
/// 수신 시점에 세션 모드를 재확인한 뒤에만 그린다.
#[async_trait]
pub trait CaptureSource: Send {
    /// 캡처 시작.
    ///
    /// 이전 캡처가 있으면 먼저 중지한다. 장치 접근 거부/부재 시
    /// `CoreError::Capture`를 반환하고 세션은 계속된다.
    async fn start(&mut self) -> Result<(), CoreError>;

    /// 캡처 중지. 멱등 — 아무것도 활성 상태가 아니어도 안전하다.
    ///
    /// 반환 시점에 워커가 종료되고 장치가 해제되어 있음을 보장한다.
    async fn stop(&mut self);

    /// 현재 캡처 활성 여부
    fn is_active(&self) -> bool;
}
