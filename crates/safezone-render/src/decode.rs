//! 스트림 프레임 디코딩.
//!
//! 서비스가 보내는 base64 JPEG 문자열을 그리기 가능한 RGBA 버퍼로
//! 변환한다. 그 이상도 이하도 아니다.

use base64::{engine::general_purpose::STANDARD as B64, Engine};
use image::RgbaImage;
use safezone_core::error::CoreError;

/// 브라우저 소비자가 붙이는 data URI 접두사 — 디코딩 시 관용 허용
const DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// base64 JPEG 페이로드를 RGBA 이미지로 디코딩
pub fn decode_frame_image(frame: &str) -> Result<RgbaImage, CoreError> {
    let payload = frame.strip_prefix(DATA_URI_PREFIX).unwrap_or(frame);

    let bytes = B64
        .decode(payload.trim())
        .map_err(|e| CoreError::Channel(format!("프레임 base64 디코딩 실패: {e}")))?;

    let decoded = image::load_from_memory(&bytes)
        .map_err(|e| CoreError::Channel(format!("프레임 이미지 디코딩 실패: {e}")))?;

    Ok(decoded.to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::jpeg::JpegEncoder;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn encoded_test_frame(w: u32, h: u32) -> String {
        let img = RgbImage::from_pixel(w, h, Rgb([200, 50, 50]));
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(Cursor::new(&mut jpeg), 85)
            .encode_image(&img)
            .unwrap();
        B64.encode(&jpeg)
    }

    #[test]
    fn decodes_plain_base64_jpeg() {
        let frame = encoded_test_frame(32, 24);
        let image = decode_frame_image(&frame).unwrap();
        assert_eq!(image.dimensions(), (32, 24));
    }

    #[test]
    fn tolerates_data_uri_prefix() {
        let frame = format!("data:image/jpeg;base64,{}", encoded_test_frame(16, 16));
        let image = decode_frame_image(&frame).unwrap();
        assert_eq!(image.dimensions(), (16, 16));
    }

    #[test]
    fn rejects_invalid_base64() {
        let result = decode_frame_image("@@not-base64@@");
        assert!(matches!(result, Err(CoreError::Channel(_))));
    }

    #[test]
    fn rejects_non_image_payload() {
        let garbage = B64.encode(b"definitely not a jpeg");
        let result = decode_frame_image(&garbage);
        assert!(matches!(result, Err(CoreError::Channel(_))));
    }
}
