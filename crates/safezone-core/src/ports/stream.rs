//! 스트리밍 채널 포트.
//!
//! 구현: `safezone-network` crate (tokio-tungstenite)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::channel::ChannelState;

/// 듀플렉스 스트리밍 채널 — 클라이언트당 논리 채널 1개.
///
/// 수신 이벤트([`crate::models::channel::ChannelEvent`])는 구현체가
/// 생성 시 받은 채널로 전달된다.
#[async_trait]
pub trait StreamLink: Send {
    /// 채널 연결.
    ///
    /// 기존 채널이 있으면 항상 먼저 해체한다(읽기 태스크 중단,
    /// 보류 중 재연결 취소, epoch 증가). 실패 시 상태는 Closed로
    /// 남고 `CoreError::Channel`을 반환한다.
    async fn connect(&mut self) -> Result<(), CoreError>;

    /// 채널 완료 및 참조 해제.
    ///
    /// 이후의 `connect()`가 이전 상태를 관찰할 수 없게 한다.
    async fn disconnect(&mut self);

    /// 현재 채널 상태 (채널 객체가 단독 소유)
    fn state(&self) -> ChannelState;

    /// 현재 연결 epoch. 재연결 신호의 신선도 판별에 쓴다.
    fn epoch(&self) -> u64;

    /// 불투명 메시지 통과 전송 (escape hatch — 정상 상태 프로토콜 아님)
    async fn send_raw(&self, text: &str) -> Result<(), CoreError>;
}
