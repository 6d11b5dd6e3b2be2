//! # safezone-network
//!
//! 탐지 서비스 네트워크 어댑터.
//! 단발 HTTP 제어 플레인([`control`])과 프레임 스트리밍용 WebSocket
//! 듀플렉스 채널([`channel`])을 담당한다.

pub mod channel;
pub mod control;

pub use channel::StreamChannel;
pub use control::DetectionApiClient;
