//! 세션 컨트롤러 — 최상위 상태 기계.
//!
//! `Idle → PreviewingLocal | PreviewingRemote → ArmingDetection → Detecting → Idle`.
//!
//! 모든 세션 변경과 그리기는 단일 이벤트 루프에서 일어난다: 사용자
//! 명령, 로컬 캡처 프레임, 채널 이벤트, 내부 타이머를 한 큐에서
//! 처리한다. 소스 간 순서는 보장되지 않으므로 모든 핸들러는 그리기
//! 전에 세션 모드(필요 시 epoch/토큰)를 재확인한다 — "한 틱에 누가
//! 그릴 수 있는가"의 상호 배제가 지켜야 할 불변식이다.

use image::RgbaImage;
use safezone_core::config::AppConfig;
use safezone_core::error::CoreError;
use safezone_core::models::channel::ChannelEvent;
use safezone_core::models::frame::StreamFrame;
use safezone_core::models::region::{PointerEvent, Region};
use safezone_core::models::session::{SessionCommand, SessionMode};
use safezone_core::models::source::VideoSource;
use safezone_core::ports::capture::CaptureSource;
use safezone_core::ports::control::ControlApi;
use safezone_core::ports::notifier::Notifier;
use safezone_core::ports::stream::StreamLink;
use safezone_render::decode::decode_frame_image;
use safezone_render::{Canvas, Compositor, RegionSelector, SharedCanvas};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::results::ResultsLog;

/// 세션 컨트롤러.
///
/// 캡처/제어/채널/알림은 전부 포트로 주입된다. 캔버스는 표시 루프와
/// 공유하지만, 그리기는 이 컨트롤러의 이벤트 루프에서만 일어난다.
pub struct SessionController {
    config: AppConfig,
    canvas: SharedCanvas,
    compositor: Compositor,
    selector: RegionSelector,
    results: ResultsLog,

    mode: SessionMode,
    source: Option<VideoSource>,
    region: Option<Region>,
    rtsp_url: Option<String>,

    capture: Box<dyn CaptureSource>,
    control: Arc<dyn ControlApi>,
    channel: Box<dyn StreamLink>,
    notifier: Arc<dyn Notifier>,

    /// 내부 타이머가 명령을 되돌려 보낼 때 쓰는 송신기
    cmd_tx: mpsc::Sender<SessionCommand>,
    /// 안정화 타이머 신선도 토큰 — 전이마다 증가
    arm_token: u64,
    settle_task: Option<JoinHandle<()>>,
}

impl SessionController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: AppConfig,
        canvas: SharedCanvas,
        compositor: Compositor,
        capture: Box<dyn CaptureSource>,
        control: Arc<dyn ControlApi>,
        channel: Box<dyn StreamLink>,
        notifier: Arc<dyn Notifier>,
        cmd_tx: mpsc::Sender<SessionCommand>,
    ) -> Self {
        let selector = RegionSelector::new(config.canvas.width, config.canvas.height);
        let results = ResultsLog::new(config.session.results_log_capacity);

        Self {
            config,
            canvas,
            compositor,
            selector,
            results,
            mode: SessionMode::Idle,
            source: None,
            region: None,
            rtsp_url: None,
            capture,
            control,
            channel,
            notifier,
            cmd_tx,
            arm_token: 0,
            settle_task: None,
        }
    }

    /// 세션 이벤트 루프.
    ///
    /// 명령/로컬 프레임/채널 이벤트를 한 큐로 처리한다. `Shutdown`
    /// 또는 모든 입력 채널 종료 시 자원을 해제하고 반환한다.
    pub async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<SessionCommand>,
        mut frame_rx: mpsc::Receiver<RgbaImage>,
        mut event_rx: mpsc::Receiver<ChannelEvent>,
    ) {
        self.draw_idle_canvas();

        // 기동 시 헬스 체크 — 실패해도 치명적이지 않다
        match self.control.health().await {
            Ok(health) => info!(
                "서비스 헬스 체크: {} (model_loaded={})",
                health.status, health.model_loaded
            ),
            Err(e) => warn!("서비스 헬스 체크 실패: {e}"),
        }

        loop {
            tokio::select! {
                Some(command) = cmd_rx.recv() => {
                    let shutdown = matches!(command, SessionCommand::Shutdown);
                    self.handle_command(command).await;
                    if shutdown {
                        break;
                    }
                }
                Some(frame) = frame_rx.recv() => self.on_local_frame(frame),
                Some(event) = event_rx.recv() => self.on_channel_event(event).await,
                else => {
                    self.teardown().await;
                    break;
                }
            }
        }
    }

    /// 현재 세션 모드
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// 커밋된 영역
    pub fn region(&self) -> Option<Region> {
        self.region
    }

    /// 활성 소스
    pub fn source(&self) -> Option<VideoSource> {
        self.source
    }

    /// 결과 로그
    pub fn results(&self) -> &ResultsLog {
        &self.results
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::SelectWebcam => self.select_webcam().await,
            SessionCommand::SelectFile(path) => self.select_file(&path),
            SessionCommand::ConnectRtsp(url) => self.connect_rtsp(url).await,
            SessionCommand::PointerDown(event) => self.pointer_down(&event),
            SessionCommand::PointerMove(event) => self.pointer_move(&event),
            SessionCommand::PointerUp(event) => self.pointer_up(&event),
            SessionCommand::ClearRegion => self.clear_region(),
            SessionCommand::StartDetection => self.start_detection().await,
            SessionCommand::StopDetection => self.stop_detection().await,
            SessionCommand::SettleElapsed(token) => self.on_settle_elapsed(token).await,
            SessionCommand::Shutdown => self.teardown().await,
        }
    }

    // ------------------------------------------------------------
    // 소스 선택
    // ------------------------------------------------------------

    async fn select_webcam(&mut self) {
        info!("웹캠 소스 선택");

        // 이전 소스/채널을 먼저 완전히 해제한다
        self.release_sources().await;
        self.clear_region();

        match self.capture.start().await {
            Ok(()) => {
                self.source = Some(VideoSource::Webcam);
                self.mode = SessionMode::PreviewingLocal;
                info!("웹캠 프리뷰 시작");
            }
            Err(e) => {
                self.notifier
                    .alert(&format!("웹캠 접근 실패 — 카메라 권한을 확인하세요: {e}"));
                self.source = None;
                self.to_idle();
            }
        }
    }

    fn select_file(&mut self, path: &Path) {
        info!("비디오 파일 선택: {}", path.display());
        self.source = Some(VideoSource::File);
        self.notifier.info("비디오 파일 소스는 아직 지원되지 않습니다");
    }

    async fn connect_rtsp(&mut self, url: String) {
        if url.trim().is_empty() {
            // 네트워크 호출 전 단락
            let err = CoreError::Precondition("RTSP URL을 입력하세요".to_string());
            self.notifier.alert(&err.to_string());
            return;
        }

        info!("RTSP 연결: {url}");
        self.release_sources().await;
        self.clear_region();

        {
            let mut canvas = self.canvas.lock();
            self.compositor.draw_connecting_placeholder(&mut canvas, &url);
        }

        if let Err(e) = self.control.start_preview(VideoSource::Rtsp, Some(&url)).await {
            self.notifier.alert(&format!("RTSP 연결 실패: {e}"));
            self.source = None;
            self.to_idle();
            return;
        }

        if let Err(e) = self.channel.connect().await {
            self.notifier.alert(&format!("RTSP 스트림 수신 실패: {e}"));
            self.source = None;
            self.to_idle();
            return;
        }

        self.source = Some(VideoSource::Rtsp);
        self.rtsp_url = Some(url);
        self.mode = SessionMode::PreviewingRemote;
        info!("RTSP 프리뷰 시작 — 영역을 그리면 탐지를 시작할 수 있습니다");
    }

    // ------------------------------------------------------------
    // 영역 선택
    // ------------------------------------------------------------

    fn video_ready(&self) -> bool {
        match self.mode {
            SessionMode::PreviewingLocal => self.capture.is_active(),
            SessionMode::PreviewingRemote => true,
            _ => false,
        }
    }

    fn pointer_down(&mut self, event: &PointerEvent) {
        // 탐지 중이거나 비디오가 준비되지 않으면 드래그를 시작하지 않는다
        if !self.video_ready() {
            return;
        }
        self.selector.begin(event);
    }

    fn pointer_move(&mut self, event: &PointerEvent) {
        self.selector.update(event);
    }

    fn pointer_up(&mut self, event: &PointerEvent) {
        if !self.selector.is_dragging() {
            return;
        }
        if let Some(region) = self.selector.end(event) {
            info!("영역 선택: {region:?}");
            self.region = Some(region);
        }
        // 문턱 미달 드래그는 조용히 폐기 — 기존 영역 유지
    }

    fn clear_region(&mut self) {
        self.region = None;
        self.selector.cancel();
    }

    // ------------------------------------------------------------
    // 탐지 전이
    // ------------------------------------------------------------

    async fn start_detection(&mut self) {
        let Some(region) = self.region else {
            let err = CoreError::Precondition("먼저 영역을 선택하세요".to_string());
            self.notifier.alert(&err.to_string());
            return;
        };
        if !self.mode.is_previewing() {
            let err = CoreError::Precondition("프리뷰 중에만 탐지를 시작할 수 있습니다".to_string());
            self.notifier.alert(&err.to_string());
            return;
        }
        let Some(source) = self.source else {
            let err = CoreError::Precondition("비디오 소스를 먼저 선택하세요".to_string());
            self.notifier.alert(&err.to_string());
            return;
        };

        info!("탐지 시작: source={source}, region={region:?}");
        self.results.clear();
        self.selector.cancel();

        // 프리뷰 자원 해제 — 탐지 프레임은 서비스에서 온다.
        // 웹캠이면 카메라 핸들도 여기서 반납한다.
        self.channel.disconnect().await;
        if source == VideoSource::Webcam {
            self.capture.stop().await;
        }

        {
            let mut canvas = self.canvas.lock();
            self.compositor.draw_starting_placeholder(&mut canvas);
        }
        self.mode = SessionMode::ArmingDetection;

        let rtsp_url = if source == VideoSource::Rtsp {
            self.rtsp_url.clone()
        } else {
            None
        };

        match self
            .control
            .start_detection(source, region, rtsp_url.as_deref())
            .await
        {
            Ok(resp) => {
                debug!("탐지 시작 승인: {}", resp.message);
                self.schedule_settle();
            }
            Err(e) => {
                self.notifier.alert(&format!("탐지 시작 실패: {e}"));
                self.fail_to_idle().await;
            }
        }
    }

    /// 안정화 타이머 예약 — 서비스가 소스를 여는 동안 기다린 뒤 채널을 연다
    fn schedule_settle(&mut self) {
        self.arm_token += 1;
        let token = self.arm_token;
        let delay = self.config.server.settle_delay();
        let cmd_tx = self.cmd_tx.clone();

        debug!("안정화 지연 예약: {delay:?} (token={token})");
        self.settle_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = cmd_tx.send(SessionCommand::SettleElapsed(token)).await;
        }));
    }

    async fn on_settle_elapsed(&mut self, token: u64) {
        if self.mode != SessionMode::ArmingDetection || token != self.arm_token {
            debug!("스테일 안정화 타이머 폐기 (token={token})");
            return;
        }

        match self.channel.connect().await {
            Ok(()) => {
                self.mode = SessionMode::Detecting;
                info!("탐지 모드 진입");
            }
            Err(e) => {
                self.notifier.alert(&format!("탐지 채널 연결 실패: {e}"));
                // 서비스 측 탐지는 이미 시작됐다 — best-effort 중지
                if let Err(stop_err) = self.control.stop_detection().await {
                    warn!("탐지 중지 요청 실패 (무시): {stop_err}");
                }
                self.fail_to_idle().await;
            }
        }
    }

    async fn stop_detection(&mut self) {
        if !matches!(
            self.mode,
            SessionMode::Detecting | SessionMode::ArmingDetection
        ) {
            debug!("탐지 중이 아님 — 중지 명령 무시");
            return;
        }

        info!("탐지 중지");
        self.cancel_settle();
        self.channel.disconnect().await;

        // best-effort — 실패는 기록만 하고 재시도하지 않는다
        if let Err(e) = self.control.stop_detection().await {
            warn!("탐지 중지 요청 실패 (재시도 없음): {e}");
        }

        if self.source == Some(VideoSource::Webcam) {
            match self.capture.start().await {
                Ok(()) => {
                    self.mode = SessionMode::PreviewingLocal;
                    info!("웹캠 프리뷰 재개");
                }
                Err(e) => {
                    self.notifier.alert(&format!("웹캠 재시작 실패: {e}"));
                    self.source = None;
                    self.to_idle();
                }
            }
        } else {
            self.source = None;
            self.to_idle();
        }
    }

    /// 세션 종료 — 무조건 전체 자원 해제 + 단방향 중지 통보
    async fn teardown(&mut self) {
        info!("세션 종료 — 자원 해제");
        self.cancel_settle();
        self.capture.stop().await;
        self.channel.disconnect().await;
        // fire-and-forget — 응답에 정확성이 의존하지 않는다
        self.control.notify_stop_detection();
        self.mode = SessionMode::Idle;
    }

    // ------------------------------------------------------------
    // 프레임/이벤트 처리
    // ------------------------------------------------------------

    fn on_local_frame(&mut self, frame: RgbaImage) {
        // 로컬 프리뷰가 캔버스를 소유한 틱에만 그린다 — 중지/탐지 전환
        // 이후 도착한 프레임은 여기서 걸러진다
        if self.mode != SessionMode::PreviewingLocal || !self.capture.is_active() {
            return;
        }

        let mut canvas = self.canvas.lock();
        if let Err(e) = self.compositor.blit_fit(&mut canvas, &frame) {
            warn!("로컬 프레임 블릿 실패: {e}");
            return;
        }
        self.draw_preview_overlays(&mut canvas, false);
    }

    async fn on_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Opened => debug!("채널 오픈 (mode={:?})", self.mode),
            ChannelEvent::Frame(frame) => self.on_stream_frame(frame),
            ChannelEvent::Lost(reason) => {
                if !self.mode.is_remote() {
                    debug!("세션 외 채널 손실 무시: {reason}");
                    return;
                }
                self.notifier.alert(&format!("스트림 연결이 끊어졌습니다: {reason}"));
                let mut canvas = self.canvas.lock();
                self.compositor.draw_lost_placeholder(&mut canvas);
            }
            ChannelEvent::ReconnectDue(epoch) => self.on_reconnect_due(epoch).await,
            ChannelEvent::Closed => debug!("채널 정상 종료 (mode={:?})", self.mode),
        }
    }

    fn on_stream_frame(&mut self, frame: StreamFrame) {
        match self.mode {
            SessionMode::PreviewingRemote => {
                let image = match decode_frame_image(&frame.frame) {
                    Ok(image) => image,
                    Err(e) => {
                        warn!("프리뷰 프레임 디코딩 실패: {e}");
                        return;
                    }
                };
                let mut canvas = self.canvas.lock();
                if let Err(e) = self.compositor.blit_fit(&mut canvas, &image) {
                    warn!("프리뷰 프레임 블릿 실패: {e}");
                    return;
                }
                self.draw_preview_overlays(&mut canvas, true);
            }
            SessionMode::Detecting => {
                let image = match decode_frame_image(&frame.frame) {
                    Ok(image) => image,
                    Err(e) => {
                        warn!("탐지 프레임 디코딩 실패: {e}");
                        return;
                    }
                };
                let detection_count = frame.detections.len();
                {
                    let mut canvas = self.canvas.lock();
                    if let Err(e) = self.compositor.blit_fit(&mut canvas, &image) {
                        warn!("탐지 프레임 블릿 실패: {e}");
                        return;
                    }
                    // 박스는 서비스가 이미 그렸다 — 통계 패널만 얹는다
                    if detection_count > 0 {
                        self.compositor.draw_stats_panel(&mut canvas, detection_count);
                    }
                }
                self.results.push(frame);
            }
            // 세션이 이미 떠난 뒤 도착한 프레임 — 그리지 않는다
            _ => debug!("세션 외 스트림 프레임 폐기 (mode={:?})", self.mode),
        }
    }

    async fn on_reconnect_due(&mut self, epoch: u64) {
        if !self.mode.is_remote() || epoch != self.channel.epoch() {
            debug!("스테일 재연결 신호 폐기 (epoch={epoch})");
            return;
        }

        info!("채널 재연결 시도");
        if let Err(e) = self.channel.connect().await {
            self.notifier.alert(&format!("스트림 재연결 실패: {e}"));
            self.fail_to_idle().await;
        }
    }

    // ------------------------------------------------------------
    // 헬퍼
    // ------------------------------------------------------------

    fn draw_preview_overlays(&self, canvas: &mut Canvas, remote: bool) {
        if let Some(region) = &self.region {
            self.compositor.draw_region_outline(canvas, region);
        }
        if let Some(rect) = self.selector.drag_rect() {
            self.compositor.draw_drag_rect(canvas, rect);
        }
        if self.region.is_none() {
            self.compositor.draw_help_banner(canvas);
        }
        if remote {
            self.compositor.draw_rtsp_chip(canvas);
        }
    }

    async fn release_sources(&mut self) {
        self.cancel_settle();
        self.channel.disconnect().await;
        self.capture.stop().await;
    }

    fn cancel_settle(&mut self) {
        self.arm_token += 1;
        if let Some(task) = self.settle_task.take() {
            task.abort();
        }
    }

    /// 실패 경로 공통 롤백: 자원 해제 + Idle 복귀 + 플레이스홀더
    async fn fail_to_idle(&mut self) {
        self.release_sources().await;
        self.source = None;
        self.to_idle();
    }

    fn to_idle(&mut self) {
        self.mode = SessionMode::Idle;
        self.draw_idle_canvas();
    }

    fn draw_idle_canvas(&self) {
        let mut canvas = self.canvas.lock();
        self.compositor.draw_idle_placeholder(&mut canvas);
    }
}
