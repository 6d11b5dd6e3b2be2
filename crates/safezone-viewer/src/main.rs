//! SafeZone 뷰어 — 앱 셸.
//!
//! 설정/로깅 초기화, 어댑터 배선, 세션 컨트롤러 기동, 그리고 창 루프.
//! 창 루프는 메인 스레드에서 돌며 키/마우스를 세션 명령으로 번역하고
//! 공유 캔버스를 그대로 표시만 한다 — 그리기는 전부 컨트롤러 몫이다.

use anyhow::Result;
use clap::Parser;
use minifb::{Key, KeyRepeat, MouseButton, MouseMode, ScaleMode, Window, WindowOptions};
use safezone_capture::WebcamSource;
use safezone_core::config::AppConfig;
use safezone_core::config_manager::ConfigManager;
use safezone_core::models::region::{PointerEvent, Viewport};
use safezone_core::models::session::SessionCommand;
use safezone_core::ports::notifier::Notifier;
use safezone_network::{DetectionApiClient, StreamChannel};
use safezone_render::{Canvas, Compositor, SharedCanvas};
use safezone_session::SessionController;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "safezone-viewer", about = "SafeZone 실시간 감시 뷰어", version)]
struct Args {
    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리)
    #[arg(long)]
    config: Option<PathBuf>,

    /// 탐지 서비스 베이스 URL (설정 파일보다 우선)
    #[arg(long)]
    server: Option<String>,

    /// [R] 키로 연결할 RTSP URL
    #[arg(long, default_value = "")]
    rtsp_url: String,

    /// [F] 키로 선택할 비디오 파일
    #[arg(long)]
    video_file: Option<PathBuf>,

    /// 카메라 장치 인덱스 (설정 파일보다 우선)
    #[arg(long)]
    camera_index: Option<u32>,
}

/// 알림을 로그로 표면화하는 Notifier 구현
struct LogNotifier;

impl Notifier for LogNotifier {
    fn alert(&self, message: &str) {
        warn!("[알림] {message}");
    }

    fn info(&self, message: &str) {
        info!("[안내] {message}");
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let manager = match &args.config {
        Some(path) => ConfigManager::with_path(path.clone())?,
        None => ConfigManager::new()?,
    };
    let mut config = manager.get();
    if let Some(server) = &args.server {
        config.server.base_url = server.clone();
    }
    if let Some(index) = args.camera_index {
        config.capture.camera_index = index;
    }
    info!("탐지 서비스: {}", config.server.base_url);

    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (frame_tx, frame_rx) = mpsc::channel(4);
    let (event_tx, event_rx) = mpsc::channel(64);

    let canvas = Canvas::shared(config.canvas.width, config.canvas.height);
    let compositor = Compositor::with_font_path(config.render.font_path.as_deref());
    if !compositor.has_font() {
        warn!("오버레이 폰트 미설정 — 텍스트 없이 도형만 그립니다 (render.font_path)");
    }

    let capture = WebcamSource::new(config.capture.clone(), frame_tx);
    let control = Arc::new(DetectionApiClient::new(&config.server)?);
    let channel = StreamChannel::new(&config.server, event_tx);

    let controller = SessionController::new(
        config.clone(),
        canvas.clone(),
        compositor,
        Box::new(capture),
        control,
        Box::new(channel),
        Arc::new(LogNotifier),
        cmd_tx.clone(),
    );

    let runtime = tokio::runtime::Runtime::new()?;
    let controller_task = runtime.spawn(controller.run(cmd_rx, frame_rx, event_rx));

    run_window_loop(&config, canvas, &cmd_tx, &args)?;

    // 종료 — 컨트롤러가 자원 해제를 마칠 때까지 잠시 기다린다
    let _ = cmd_tx.blocking_send(SessionCommand::Shutdown);
    let _ = runtime.block_on(async {
        tokio::time::timeout(Duration::from_secs(5), controller_task).await
    });

    Ok(())
}

/// 창 루프 — 입력을 명령으로 번역하고 캔버스를 표시한다
fn run_window_loop(
    config: &AppConfig,
    canvas: SharedCanvas,
    cmd_tx: &mpsc::Sender<SessionCommand>,
    args: &Args,
) -> Result<()> {
    let (canvas_w, canvas_h) = (config.canvas.width as usize, config.canvas.height as usize);

    let mut window = Window::new(
        "SafeZone Viewer — [W]ebcam [R]tsp [F]ile [D]etect [S]top [C]lear [Esc]",
        canvas_w,
        canvas_h,
        WindowOptions {
            resize: true,
            scale_mode: ScaleMode::Stretch,
            ..WindowOptions::default()
        },
    )?;
    window.limit_update_rate(Some(Duration::from_micros(16_600)));

    let mut mouse_was_down = false;

    while window.is_open() && !window.is_key_down(Key::Escape) {
        for key in window.get_keys_pressed(KeyRepeat::No) {
            let command = match key {
                Key::W => Some(SessionCommand::SelectWebcam),
                Key::R => Some(SessionCommand::ConnectRtsp(args.rtsp_url.clone())),
                Key::F => args.video_file.clone().map(SessionCommand::SelectFile),
                Key::C => Some(SessionCommand::ClearRegion),
                Key::D => Some(SessionCommand::StartDetection),
                Key::S => Some(SessionCommand::StopDetection),
                _ => None,
            };
            if let Some(command) = command {
                if cmd_tx.blocking_send(command).is_err() {
                    return Ok(());
                }
            }
        }

        // 마우스 드래그 → 영역 선택. 좌표 변환은 선택기가 뷰포트
        // 크기로 수행하므로 여기서는 창 크기만 실어 보낸다.
        let (win_w, win_h) = window.get_size();
        let viewport = Viewport {
            width: win_w as f64,
            height: win_h as f64,
        };
        let mouse_down = window.get_mouse_down(MouseButton::Left);
        if let Some((mx, my)) = window.get_mouse_pos(MouseMode::Clamp) {
            let event = PointerEvent {
                x: mx as f64,
                y: my as f64,
                viewport,
            };
            if mouse_down && !mouse_was_down {
                if cmd_tx.blocking_send(SessionCommand::PointerDown(event)).is_err() {
                    return Ok(());
                }
            } else if mouse_down {
                // 이동은 advisory — 큐가 가득 차면 버려도 된다
                let _ = cmd_tx.try_send(SessionCommand::PointerMove(event));
            } else if mouse_was_down
                && cmd_tx.blocking_send(SessionCommand::PointerUp(event)).is_err()
            {
                return Ok(());
            }
        }
        mouse_was_down = mouse_down;

        let buffer = canvas.lock().to_display_buffer();
        window.update_with_buffer(&buffer, canvas_w, canvas_h)?;
    }

    Ok(())
}
