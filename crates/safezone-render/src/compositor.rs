//! 캔버스 합성 루틴.
//!
//! 로컬 캡처 경로와 원격 프레임 경로가 공유하는 저수준 그리기.
//! 캔버스 외의 가변 상태는 없다 — 모든 함수는 전달받은 캔버스만 변경한다.
//!
//! 오버레이 텍스트는 설정된 TTF에서 렌더링한다. 폰트가 없으면 텍스트
//! 레이어는 배경 도형만 남긴다(캔버스는 항상 그리기 가능 상태 유지).

use ab_glyph::{FontVec, PxScale};
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_text_mut;
use safezone_core::error::CoreError;
use safezone_core::models::region::Region;
use std::path::Path;
use tracing::{debug, warn};

use crate::canvas::Canvas;
use crate::resize::fast_resize;

/// 유휴 플레이스홀더 배경
const BG_IDLE: Rgba<u8> = Rgba([0x1a, 0x1a, 0x1a, 0xff]);
/// 비디오 레터박스 배경
const BG_VIDEO: Rgba<u8> = Rgba([0, 0, 0, 0xff]);
const WHITE: Rgba<u8> = Rgba([0xff, 0xff, 0xff, 0xff]);
const GRAY: Rgba<u8> = Rgba([0x99, 0x99, 0x99, 0xff]);
const GREEN: Rgba<u8> = Rgba([0, 0xff, 0, 0xff]);
const RED: Rgba<u8> = Rgba([0xff, 0, 0, 0xff]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 0xff]);

/// 글자 폭 추정 비율 (폰트 크기 대비, 대략치)
const CHAR_WIDTH_RATIO: f32 = 0.55;

/// 캔버스 합성기.
///
/// 폰트 핸들 외의 상태는 없다. 어느 콜백에서 호출해도 안전하다.
pub struct Compositor {
    font: Option<FontVec>,
}

impl Compositor {
    /// 텍스트 없이 합성기 생성
    pub fn new() -> Self {
        Self { font: None }
    }

    /// TTF 경로에서 폰트를 로드해 합성기 생성.
    /// 로드 실패는 경고만 남기고 도형 전용으로 계속한다.
    pub fn with_font_path(path: Option<&Path>) -> Self {
        let font = path.and_then(|p| match std::fs::read(p) {
            Ok(bytes) => match FontVec::try_from_vec(bytes) {
                Ok(font) => {
                    debug!("오버레이 폰트 로드: {}", p.display());
                    Some(font)
                }
                Err(e) => {
                    warn!("폰트 파싱 실패, 텍스트 없이 진행: {}: {e}", p.display());
                    None
                }
            },
            Err(e) => {
                warn!("폰트 읽기 실패, 텍스트 없이 진행: {}: {e}", p.display());
                None
            }
        });
        Self { font }
    }

    /// 오버레이 텍스트 렌더링 가능 여부
    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    // ------------------------------------------------------------
    // 플레이스홀더
    // ------------------------------------------------------------

    /// 유휴 플레이스홀더 — 소스 없음
    pub fn draw_idle_placeholder(&self, canvas: &mut Canvas) {
        let (w, h) = (canvas.width() as i32, canvas.height() as i32);
        canvas.fill(BG_IDLE);
        let image = canvas.image_mut();
        self.text_centered(image, "Click 'Webcam' to start", w / 2, h / 2 - 44, 24.0, WHITE);
        self.text_centered(
            image,
            "Then draw a region for detection",
            w / 2,
            h / 2 + 8,
            16.0,
            GRAY,
        );
    }

    /// RTSP 연결 중 플레이스홀더
    pub fn draw_connecting_placeholder(&self, canvas: &mut Canvas, url: &str) {
        let (w, h) = (canvas.width() as i32, canvas.height() as i32);
        canvas.fill(BG_IDLE);
        let image = canvas.image_mut();
        self.text_centered(
            image,
            "Connecting to RTSP stream...",
            w / 2,
            h / 2 - 40,
            20.0,
            WHITE,
        );
        self.text_centered(image, url, w / 2, h / 2 + 8, 14.0, GRAY);
    }

    /// 탐지 시작 중 플레이스홀더
    pub fn draw_starting_placeholder(&self, canvas: &mut Canvas) {
        let (w, h) = (canvas.width() as i32, canvas.height() as i32);
        canvas.fill(BG_VIDEO);
        let image = canvas.image_mut();
        self.text_centered(image, "Starting detection...", w / 2, h / 2 - 10, 20.0, WHITE);
    }

    /// 연결 상실 플레이스홀더
    pub fn draw_lost_placeholder(&self, canvas: &mut Canvas) {
        let (w, h) = (canvas.width() as i32, canvas.height() as i32);
        canvas.fill(BG_VIDEO);
        let image = canvas.image_mut();
        self.text_centered(image, "Connection Lost", w / 2, h / 2 - 10, 20.0, RED);
    }

    // ------------------------------------------------------------
    // 프레임 합성
    // ------------------------------------------------------------

    /// scale-to-fit 블릿 — 종횡비 보존 균일 스케일 + 중앙 정렬, 검정 레터박스
    pub fn blit_fit(&self, canvas: &mut Canvas, frame: &RgbaImage) -> Result<(), CoreError> {
        let (cw, ch) = (canvas.width(), canvas.height());
        let (fw, fh) = frame.dimensions();

        if fw == 0 || fh == 0 {
            return Err(CoreError::Internal("빈 프레임은 블릿 불가".to_string()));
        }

        let scale = (cw as f64 / fw as f64).min(ch as f64 / fh as f64);
        let sw = (((fw as f64) * scale).round() as u32).clamp(1, cw);
        let sh = (((fh as f64) * scale).round() as u32).clamp(1, ch);

        let resized = fast_resize(frame, sw, sh)?;

        canvas.fill(BG_VIDEO);
        let ox = ((cw - sw) / 2) as i64;
        let oy = ((ch - sh) / 2) as i64;
        image::imageops::overlay(canvas.image_mut(), &resized, ox, oy);
        Ok(())
    }

    // ------------------------------------------------------------
    // 오버레이
    // ------------------------------------------------------------

    /// 커밋된 영역 외곽선 + 라벨 칩
    pub fn draw_region_outline(&self, canvas: &mut Canvas, region: &Region) {
        let image = canvas.image_mut();
        draw_dashed_rect(
            image,
            region.x as i32,
            region.y as i32,
            region.width,
            region.height,
            GREEN,
            3,
            10,
            5,
        );

        // 라벨 칩 — 외곽선 위쪽, 화면 밖으로 나가면 안쪽으로 클램프
        let chip_y = (region.y as i32 - 30).max(0);
        fill_rect_blend(image, region.x as i32, chip_y, 150, 30, [0, 0xff, 0], 0.8);
        self.text(image, "Detection Zone", region.x as i32 + 5, chip_y + 7, 14.0, BLACK);
    }

    /// 진행 중 드래그 사각형 (캔버스 좌표)
    pub fn draw_drag_rect(&self, canvas: &mut Canvas, rect: (f64, f64, f64, f64)) {
        let (x, y, w, h) = rect;
        if w < 1.0 || h < 1.0 {
            return;
        }
        draw_dashed_rect(
            canvas.image_mut(),
            x.round() as i32,
            y.round() as i32,
            w.round() as u32,
            h.round() as u32,
            GREEN,
            2,
            5,
            5,
        );
    }

    /// 영역 미선택 시 도움말 배너
    pub fn draw_help_banner(&self, canvas: &mut Canvas) {
        let h = canvas.height() as i32;
        let image = canvas.image_mut();
        fill_rect_blend(image, 10, h - 60, 350, 50, [0, 0, 0], 0.7);
        self.text(
            image,
            "Click and drag to select detection zone",
            20,
            h - 46,
            16.0,
            GREEN,
        );
    }

    /// 탐지 통계 패널 — 라이브 표시 + 탐지 수
    pub fn draw_stats_panel(&self, canvas: &mut Canvas, detection_count: usize) {
        let image = canvas.image_mut();
        fill_rect_blend(image, 10, 10, 220, 80, [0, 0, 0], 0.8);
        self.text(image, "SafeZone AI", 20, 16, 16.0, WHITE);
        self.text(image, "LIVE", 20, 42, 14.0, RED);
        self.text(
            image,
            &format!("Detections: {detection_count}"),
            20,
            62,
            14.0,
            WHITE,
        );
        self.text(image, "FPS: ~30", 150, 62, 14.0, WHITE);
    }

    /// 원격 프리뷰 소스 칩
    pub fn draw_rtsp_chip(&self, canvas: &mut Canvas) {
        let image = canvas.image_mut();
        fill_rect_blend(image, 10, 10, 200, 40, [0, 100, 0], 0.9);
        self.text(image, "RTSP PREVIEW", 20, 22, 14.0, WHITE);
    }

    // ------------------------------------------------------------
    // 텍스트 헬퍼
    // ------------------------------------------------------------

    fn text(&self, image: &mut RgbaImage, s: &str, x: i32, y: i32, px: f32, color: Rgba<u8>) {
        if let Some(font) = &self.font {
            draw_text_mut(image, color, x, y, PxScale::from(px), font, s);
        }
    }

    fn text_centered(
        &self,
        image: &mut RgbaImage,
        s: &str,
        cx: i32,
        y: i32,
        px: f32,
        color: Rgba<u8>,
    ) {
        let estimated = (s.len() as f32 * px * CHAR_WIDTH_RATIO) as i32;
        self.text(image, s, cx - estimated / 2, y, px, color);
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new()
    }
}

/// 알파 블렌딩 사각형 채우기 (이미지 경계로 클립)
fn fill_rect_blend(image: &mut RgbaImage, x: i32, y: i32, w: u32, h: u32, color: [u8; 3], alpha: f32) {
    let (iw, ih) = (image.width() as i32, image.height() as i32);
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + w as i32).min(iw);
    let y1 = (y + h as i32).min(ih);

    for py in y0..y1 {
        for px in x0..x1 {
            let pixel = image.get_pixel_mut(px as u32, py as u32);
            for c in 0..3 {
                let old = pixel.0[c] as f32;
                pixel.0[c] = (old * (1.0 - alpha) + color[c] as f32 * alpha).round() as u8;
            }
        }
    }
}

/// 점선 사각형 외곽선 (이미지 경계로 클립)
#[allow(clippy::too_many_arguments)]
fn draw_dashed_rect(
    image: &mut RgbaImage,
    x: i32,
    y: i32,
    w: u32,
    h: u32,
    color: Rgba<u8>,
    thickness: u32,
    dash_on: u32,
    dash_off: u32,
) {
    if w == 0 || h == 0 {
        return;
    }
    let period = (dash_on + dash_off).max(1);
    let (iw, ih) = (image.width() as i32, image.height() as i32);
    let x1 = x + w as i32 - 1;
    let y1 = y + h as i32 - 1;

    let mut put = |px: i32, py: i32| {
        if px >= 0 && py >= 0 && px < iw && py < ih {
            image.put_pixel(px as u32, py as u32, color);
        }
    };

    // 수평 변 (위/아래)
    for dx in 0..w {
        if dx % period < dash_on {
            for t in 0..thickness as i32 {
                put(x + dx as i32, y + t);
                put(x + dx as i32, y1 - t);
            }
        }
    }

    // 수직 변 (좌/우)
    for dy in 0..h {
        if dy % period < dash_on {
            for t in 0..thickness as i32 {
                put(x + t, y + dy as i32);
                put(x1 - t, y + dy as i32);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(w: u32, h: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(color))
    }

    #[test]
    fn blit_fit_letterboxes_wide_frame() {
        let compositor = Compositor::new();
        let mut canvas = Canvas::new(800, 600);
        // 1280×720 → 800×450, 세로 오프셋 75
        let frame = solid_frame(1280, 720, [10, 200, 30, 255]);

        compositor.blit_fit(&mut canvas, &frame).unwrap();

        // 중앙은 프레임 색
        let center = canvas.image().get_pixel(400, 300);
        assert_eq!(center.0[1], 200);
        // 상단 레터박스는 검정
        let top = canvas.image().get_pixel(400, 10);
        assert_eq!(top.0, [0, 0, 0, 255]);
        // 프레임 영역 시작 직후는 프레임 색
        let inside = canvas.image().get_pixel(400, 80);
        assert_eq!(inside.0[1], 200);
    }

    #[test]
    fn blit_fit_rejects_empty_frame() {
        let compositor = Compositor::new();
        let mut canvas = Canvas::new(100, 100);
        let frame = RgbaImage::new(0, 0);
        assert!(compositor.blit_fit(&mut canvas, &frame).is_err());
    }

    #[test]
    fn region_outline_touches_edges() {
        let compositor = Compositor::new();
        let mut canvas = Canvas::new(400, 300);
        canvas.fill(Rgba([0, 0, 0, 255]));

        let region = Region {
            x: 50,
            y: 50,
            width: 100,
            height: 80,
        };
        compositor.draw_region_outline(&mut canvas, &region);

        // 점선의 첫 구간은 모서리에서 시작
        assert_eq!(canvas.image().get_pixel(50, 50).0, [0, 0xff, 0, 0xff]);
        // 점선 off 구간은 비어 있음 (dash_on 10, dash_off 5 → x=61은 off)
        assert_eq!(canvas.image().get_pixel(50 + 11, 50).0[1], 0);
    }

    #[test]
    fn stats_panel_darkens_background() {
        let compositor = Compositor::new();
        let mut canvas = Canvas::new(400, 300);
        canvas.fill(Rgba([200, 200, 200, 255]));

        compositor.draw_stats_panel(&mut canvas, 2);

        // 패널 내부는 80% 어둡게 블렌딩
        let inside = canvas.image().get_pixel(20, 20);
        assert!(inside.0[0] < 60, "blended value: {}", inside.0[0]);
        // 패널 밖은 그대로
        let outside = canvas.image().get_pixel(300, 200);
        assert_eq!(outside.0[0], 200);
    }

    #[test]
    fn drag_rect_ignores_degenerate_size() {
        let compositor = Compositor::new();
        let mut canvas = Canvas::new(100, 100);
        canvas.fill(Rgba([0, 0, 0, 255]));

        compositor.draw_drag_rect(&mut canvas, (10.0, 10.0, 0.5, 0.5));
        assert!(canvas.image().pixels().all(|p| p.0 == [0, 0, 0, 255]));
    }

    #[test]
    fn blend_clips_to_canvas_bounds() {
        let mut image = RgbaImage::from_pixel(50, 50, Rgba([100, 100, 100, 255]));
        // 일부가 화면 밖으로 나가는 사각형
        fill_rect_blend(&mut image, 40, 40, 30, 30, [0, 0, 0], 0.5);
        assert_eq!(image.get_pixel(45, 45).0[0], 50);
        assert_eq!(image.get_pixel(10, 10).0[0], 100);
    }
}
