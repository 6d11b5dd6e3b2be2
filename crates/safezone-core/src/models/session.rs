//! 세션 상태 모델과 사용자 명령.

use std::path::PathBuf;

use crate::models::region::PointerEvent;

/// 세션 모드 — 최상위 상태 기계의 상태.
///
/// `Idle → PreviewingLocal | PreviewingRemote → ArmingDetection → Detecting → Idle`.
/// 모든 전이는 이전 상태의 자원을 먼저 완전히 해제한다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// 활성 소스 없음 — 캔버스는 플레이스홀더
    Idle,
    /// 로컬 웹캠 프리뷰
    PreviewingLocal,
    /// 원격(RTSP) 프리뷰 — 채널로 프레임 수신
    PreviewingRemote,
    /// 탐지 시작 승인됨, 안정화 지연 대기 중
    ArmingDetection,
    /// 탐지 모드 — 서비스가 주석 프레임을 스트리밍
    Detecting,
}

impl SessionMode {
    /// 프리뷰 상태 여부 (영역 드래그가 허용되는 상태)
    pub fn is_previewing(self) -> bool {
        matches!(
            self,
            SessionMode::PreviewingLocal | SessionMode::PreviewingRemote
        )
    }

    /// 원격 채널이 캔버스를 구동하는 상태 여부
    pub fn is_remote(self) -> bool {
        matches!(
            self,
            SessionMode::PreviewingRemote | SessionMode::ArmingDetection | SessionMode::Detecting
        )
    }
}

/// 사용자 의도 + 내부 타이머가 세션 컨트롤러 루프로 보내는 명령
#[derive(Debug)]
pub enum SessionCommand {
    /// 웹캠 소스 선택
    SelectWebcam,
    /// 비디오 파일 소스 선택
    SelectFile(PathBuf),
    /// RTSP 스트림 연결
    ConnectRtsp(String),
    /// 드래그 시작
    PointerDown(PointerEvent),
    /// 드래그 이동 (advisory — 라이브 사각형 렌더링용)
    PointerMove(PointerEvent),
    /// 드래그 종료 — 영역 커밋 시도
    PointerUp(PointerEvent),
    /// 영역 명시적 해제
    ClearRegion,
    /// 탐지 시작
    StartDetection,
    /// 탐지 중지
    StopDetection,
    /// 안정화 타이머 만료 (내부). payload는 예약 당시 arm 토큰;
    /// 세션이 그 사이 이동했으면 폐기된다.
    SettleElapsed(u64),
    /// 세션 종료 — 모든 자원 해제 후 루프 탈출
    Shutdown,
}
