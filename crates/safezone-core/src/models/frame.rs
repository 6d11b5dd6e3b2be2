//! 스트리밍 프레임 모델.
//!
//! 탐지 서비스가 듀플렉스 채널로 푸시하는 메시지 한 건에 해당한다.
//! 프레임 이미지는 서비스가 이미 주석을 그려 넣은 JPEG이다.

use serde::{Deserialize, Serialize};

/// 서비스가 푸시하는 프레임 + 탐지 메타데이터
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamFrame {
    /// Base64 인코딩된 JPEG. 소비 측에서 data URI 접두사가 붙을 수 있어
    /// 디코딩 시 관용적으로 허용한다.
    pub frame: String,
    /// 탐지 결과 목록 (순서 유지)
    #[serde(default)]
    pub detections: Vec<Detection>,
    /// 서버 타임스탬프 (epoch 밀리초)
    pub timestamp: i64,
}

/// 탐지 결과 한 건
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    /// 클래스 이름 (`class` 별칭 허용)
    #[serde(alias = "class")]
    pub class_name: String,
    /// 신뢰도 (0.0 ~ 1.0)
    pub confidence: f64,
    /// 바운딩 박스 [x, y, w, h] (프레임 픽셀)
    pub bbox: [i32; 4],
}
