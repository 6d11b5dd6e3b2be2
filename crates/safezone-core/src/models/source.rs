//! 비디오 소스 모델.

use serde::{Deserialize, Serialize};

/// 선택 가능한 비디오 소스.
///
/// 와이어 값은 서비스 관례를 따른다: `webcam` / `video` / `rtsp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoSource {
    /// 로컬 웹캠
    Webcam,
    /// 업로드된 비디오 파일
    #[serde(rename = "video")]
    File,
    /// 원격 RTSP 스트림
    Rtsp,
}

impl std::fmt::Display for VideoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoSource::Webcam => write!(f, "webcam"),
            VideoSource::File => write!(f, "video"),
            VideoSource::Rtsp => write!(f, "rtsp"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values_match_service_convention() {
        assert_eq!(
            serde_json::to_string(&VideoSource::Webcam).unwrap(),
            r#""webcam""#
        );
        assert_eq!(
            serde_json::to_string(&VideoSource::File).unwrap(),
            r#""video""#
        );
        assert_eq!(
            serde_json::to_string(&VideoSource::Rtsp).unwrap(),
            r#""rtsp""#
        );
    }
}
