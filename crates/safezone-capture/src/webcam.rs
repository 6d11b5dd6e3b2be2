//! 웹캠 캡처 어댑터 — `CaptureSource` 포트 구현.
//!
//! 카메라 핸들은 전용 워커 스레드에만 존재한다. 워커는 목표
//! 프레임레이트로 페이싱하며 프레임을 디코딩해 채널로 보내고,
//! 중지 플래그가 서거나 수신측이 닫히면 스스로 종료한다.
//! 컨트롤러가 프레임을 그릴지 여부는 수신 시점의 세션 모드가
//! 결정한다 — 로컬/원격 렌더링이 같은 틱을 공유하지 않는 근거.

use async_trait::async_trait;
use image::{DynamicImage, RgbaImage};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera;
use safezone_core::config::CaptureConfig;
use safezone_core::error::CoreError;
use safezone_core::ports::capture::CaptureSource;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// 프레임 읽기 실패 후 재시도 대기
const READ_RETRY_DELAY: Duration = Duration::from_millis(500);

/// 웹캠 캡처 소스
pub struct WebcamSource {
    config: CaptureConfig,
    frame_tx: mpsc::Sender<RgbaImage>,
    stop_flag: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl WebcamSource {
    /// 새 웹캠 소스 생성. 프레임은 `frame_tx`로 전달된다.
    pub fn new(config: CaptureConfig, frame_tx: mpsc::Sender<RgbaImage>) -> Self {
        Self {
            config,
            frame_tx,
            stop_flag: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }
}

#[async_trait]
impl CaptureSource for WebcamSource {
    async fn start(&mut self) -> Result<(), CoreError> {
        // 이전 캡처가 있으면 먼저 완전히 해제한다
        self.stop().await;

        let (ready_tx, ready_rx) = oneshot::channel();
        let stop_flag = Arc::new(AtomicBool::new(false));
        let flag = stop_flag.clone();
        let config = self.config.clone();
        let frame_tx = self.frame_tx.clone();

        let worker = std::thread::Builder::new()
            .name("webcam-capture".to_string())
            .spawn(move || {
                let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
                    CameraFormat::new(
                        Resolution::new(config.ideal_width, config.ideal_height),
                        FrameFormat::MJPEG,
                        config.fps,
                    ),
                ));

                let mut camera =
                    match Camera::new(CameraIndex::Index(config.camera_index), requested) {
                        Ok(camera) => camera,
                        Err(e) => {
                            let _ = ready_tx
                                .send(Err(CoreError::Capture(format!("카메라 열기 실패: {e}"))));
                            return;
                        }
                    };

                if let Err(e) = camera.open_stream() {
                    let _ = ready_tx
                        .send(Err(CoreError::Capture(format!("카메라 스트림 시작 실패: {e}"))));
                    return;
                }

                info!(
                    "카메라 열림: {} ({})",
                    camera.info().human_name(),
                    camera.camera_format()
                );
                let _ = ready_tx.send(Ok(()));

                let interval = Duration::from_millis(1_000 / config.fps.max(1) as u64);
                capture_loop(&mut camera, &frame_tx, &flag, interval);

                if let Err(e) = camera.stop_stream() {
                    debug!("카메라 스트림 종료 중 무시된 에러: {e}");
                }
                debug!("카메라 워커 종료");
            })
            .map_err(|e| CoreError::Capture(format!("캡처 스레드 생성 실패: {e}")))?;

        match ready_rx.await {
            Ok(Ok(())) => {
                self.stop_flag = stop_flag;
                self.worker = Some(worker);
                Ok(())
            }
            Ok(Err(e)) => {
                // 워커는 에러 보고 직후 이미 반환했다
                let _ = worker.join();
                Err(e)
            }
            Err(_) => {
                let _ = worker.join();
                Err(CoreError::Capture("캡처 스레드가 응답 없이 종료됨".to_string()))
            }
        }
    }

    async fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            // 다음 소스가 즉시 장치를 열 수 있도록 해제 완료까지 기다린다
            let _ = tokio::task::spawn_blocking(move || worker.join()).await;
            debug!("카메라 캡처 중지 완료");
        }
    }

    fn is_active(&self) -> bool {
        self.worker
            .as_ref()
            .map(|worker| !worker.is_finished())
            .unwrap_or(false)
    }
}

/// 워커 프레임 루프.
///
/// 채널이 가득 차면 프레임을 버린다 — 최신 프레임만 의미가 있다.
fn capture_loop(
    camera: &mut Camera,
    frame_tx: &mpsc::Sender<RgbaImage>,
    stop_flag: &AtomicBool,
    interval: Duration,
) {
    while !stop_flag.load(Ordering::Relaxed) {
        let tick = Instant::now();

        match camera.frame() {
            Ok(buffer) => match buffer.decode_image::<RgbFormat>() {
                Ok(rgb) => {
                    let rgba = DynamicImage::ImageRgb8(rgb).into_rgba8();
                    match frame_tx.try_send(rgba) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            // 수신측이 느림 — 이 프레임은 버린다
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => break,
                    }
                }
                Err(e) => warn!("프레임 디코딩 실패: {e}"),
            },
            Err(e) => {
                warn!("프레임 읽기 실패: {e}");
                std::thread::sleep(READ_RETRY_DELAY);
                continue;
            }
        }

        let elapsed = tick.elapsed();
        if elapsed < interval {
            std::thread::sleep(interval - elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_source() -> (WebcamSource, mpsc::Receiver<RgbaImage>) {
        let (frame_tx, frame_rx) = mpsc::channel(2);
        (WebcamSource::new(CaptureConfig::default(), frame_tx), frame_rx)
    }

    #[tokio::test]
    async fn stop_is_idempotent_when_inactive() {
        let (mut source, _frame_rx) = test_source();

        assert!(!source.is_active());
        source.stop().await;
        source.stop().await;
        assert!(!source.is_active());
    }

    #[tokio::test]
    #[ignore = "실제 카메라 장치 필요"]
    async fn start_delivers_frames_from_device() {
        let (mut source, mut frame_rx) = test_source();

        source.start().await.unwrap();
        assert!(source.is_active());

        let frame = frame_rx.recv().await.unwrap();
        assert!(frame.width() > 0);

        source.stop().await;
        assert!(!source.is_active());
    }
}
