//! 관심 영역(Region) 모델.
//!
//! 캔버스 픽셀 좌표계의 축 정렬 사각형. 드래그 릴리즈 시 커밋되고
//! 소스 전환마다 암묵적으로 해제된다.

use serde::{Deserialize, Serialize};

/// 커밋 가능한 최소 변 길이 (캔버스 픽셀, 배타적).
/// 실수 클릭이 탐지를 무장시키지 않도록 하는 하한선.
pub const MIN_REGION_DIM: f64 = 10.0;

/// 탐지 관심 영역 — 캔버스 픽셀 좌표
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// 드래그 시작/끝 점(캔버스 좌표)에서 영역 계산.
    ///
    /// min/max 스왑으로 음수 크기를 제거하고, 두 변이 모두
    /// [`MIN_REGION_DIM`]을 초과할 때만 `Some`을 반환한다. 경계값
    /// (정확히 10)은 커밋되지 않는다. 커밋 값은 정수 픽셀로 반올림.
    pub fn from_drag(start: (f64, f64), end: (f64, f64)) -> Option<Self> {
        let width = (end.0 - start.0).abs();
        let height = (end.1 - start.1).abs();

        if width <= MIN_REGION_DIM || height <= MIN_REGION_DIM {
            return None;
        }

        let x = start.0.min(end.0);
        let y = start.1.min(end.1);

        Some(Self {
            x: x.round() as u32,
            y: y.round() as u32,
            width: width.round() as u32,
            height: height.round() as u32,
        })
    }

    /// 탐지 미무장 프리뷰용 제로 영역 플레이스홀더.
    /// 서비스 관례상 {0, 0, 1, 1}을 보낸다.
    pub fn preview_placeholder() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 1,
            height: 1,
        }
    }
}

/// 디스플레이(창) 좌표계의 포인터 이벤트.
///
/// 캔버스 고유 해상도와 창 크기가 다르므로, 모든 산술 전에
/// 축별 독립 비율로 캔버스 좌표로 변환해야 한다.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    /// 디스플레이 X (창 픽셀)
    pub x: f64,
    /// 디스플레이 Y (창 픽셀)
    pub y: f64,
    /// 이벤트 시점의 뷰포트(창) 크기
    pub viewport: Viewport,
}

/// 캔버스가 렌더링되는 뷰포트 크기
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drag_commits_above_threshold() {
        let region = Region::from_drag((100.0, 100.0), (300.0, 250.0)).unwrap();
        assert_eq!(
            region,
            Region {
                x: 100,
                y: 100,
                width: 200,
                height: 150
            }
        );
    }

    #[test]
    fn drag_swaps_inverted_corners() {
        let region = Region::from_drag((300.0, 250.0), (100.0, 100.0)).unwrap();
        assert_eq!(region.x, 100);
        assert_eq!(region.y, 100);
        assert_eq!(region.width, 200);
        assert_eq!(region.height, 150);
    }

    #[test]
    fn drag_of_exactly_threshold_is_discarded() {
        // 정확히 10px은 커밋 불가 (배타적 경계)
        assert!(Region::from_drag((0.0, 0.0), (10.0, 50.0)).is_none());
        assert!(Region::from_drag((0.0, 0.0), (50.0, 10.0)).is_none());
    }

    #[test]
    fn drag_just_above_threshold_commits() {
        assert!(Region::from_drag((0.0, 0.0), (10.1, 10.1)).is_some());
    }

    #[test]
    fn preview_placeholder_is_zero_area() {
        let r = Region::preview_placeholder();
        assert_eq!((r.x, r.y, r.width, r.height), (0, 0, 1, 1));
    }

    #[test]
    fn region_serializes_with_wire_field_names() {
        let r = Region {
            x: 1,
            y: 2,
            width: 3,
            height: 4,
        };
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"x": 1, "y": 2, "width": 3, "height": 4})
        );
    }
}
