//! # safezone-session
//!
//! 최상위 세션 상태 기계.
//! 어떤 비디오 소스가 활성인지, 탐지가 실행 중인지를 단독으로 소유하고,
//! 캡처/네트워크 어댑터를 포트로 구동하며, 이전 상태의 자원이 완전히
//! 해제된 뒤에만 다음 상태를 시작한다.

pub mod controller;
pub mod results;

pub use controller::SessionController;
