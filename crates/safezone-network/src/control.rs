//! HTTP 제어 플레인 클라이언트 — `ControlApi` 포트 구현.
//!
//! 전부 단발 호출이다. 재시도 없음 — 실패는 호출자가 세션 롤백으로
//! 처리한다.

use async_trait::async_trait;
use safezone_core::config::ServerConfig;
use safezone_core::error::CoreError;
use safezone_core::models::region::Region;
use safezone_core::models::source::VideoSource;
use safezone_core::ports::control::{ApiResponse, ControlApi, HealthResponse};
use serde::Serialize;
use tracing::{debug, warn};

/// `/start-preview`와 `/start-detection`의 공통 요청 본문
#[derive(Debug, Serialize)]
struct StartRequest<'a> {
    source: VideoSource,
    region: Region,
    #[serde(skip_serializing_if = "Option::is_none")]
    rtsp_url: Option<&'a str>,
}

/// 제어 플레인 클라이언트
pub struct DetectionApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl DetectionApiClient {
    /// 새 제어 클라이언트 생성
    pub fn new(config: &ServerConfig) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| CoreError::Internal(format!("HTTP 클라이언트 빌드 실패: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// 응답 상태 코드 확인 및 에러 매핑.
    /// non-2xx는 본문의 `detail` 필드를 우선해 `Request` 에러가 된다.
    async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, CoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_else(|e| {
            warn!("에러 응답 본문 읽기 실패: {e}");
            String::new()
        });
        Err(CoreError::from_response(status.as_u16(), &body))
    }

    async fn post_json<T: Serialize>(&self, path: &str, body: &T) -> Result<ApiResponse, CoreError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("{path} 요청 실패: {e}")))?;

        let resp = Self::check_response(resp).await?;
        resp.json::<ApiResponse>()
            .await
            .map_err(|e| CoreError::Internal(format!("{path} 응답 파싱 실패: {e}")))
    }
}

#[async_trait]
impl ControlApi for DetectionApiClient {
    async fn health(&self) -> Result<HealthResponse, CoreError> {
        let url = format!("{}/", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("헬스 체크 요청 실패: {e}")))?;

        let resp = Self::check_response(resp).await?;
        resp.json::<HealthResponse>()
            .await
            .map_err(|e| CoreError::Internal(format!("헬스 체크 응답 파싱 실패: {e}")))
    }

    async fn start_preview(
        &self,
        source: VideoSource,
        rtsp_url: Option<&str>,
    ) -> Result<ApiResponse, CoreError> {
        debug!("프리뷰 시작 요청: source={source}");

        // 탐지 미무장 — 제로 영역 플레이스홀더 전송
        let body = StartRequest {
            source,
            region: Region::preview_placeholder(),
            rtsp_url,
        };
        self.post_json("/start-preview", &body).await
    }

    async fn start_detection(
        &self,
        source: VideoSource,
        region: Region,
        rtsp_url: Option<&str>,
    ) -> Result<ApiResponse, CoreError> {
        debug!("탐지 시작 요청: source={source}, region={region:?}");

        let body = StartRequest {
            source,
            region,
            rtsp_url,
        };
        self.post_json("/start-detection", &body).await
    }

    async fn stop_detection(&self) -> Result<ApiResponse, CoreError> {
        debug!("탐지 중지 요청");
        self.post_json("/stop-detection", &serde_json::json!({})).await
    }

    fn notify_stop_detection(&self) {
        // fire-and-forget — 페이지가 닫히는 중일 수 있어 응답을 기다리지 않는다
        let client = self.client.clone();
        let url = format!("{}/stop-detection", self.base_url);
        tokio::spawn(async move {
            match client.post(&url).json(&serde_json::json!({})).send().await {
                Ok(resp) => debug!("탐지 중지 통보 전송됨 ({})", resp.status()),
                Err(e) => debug!("탐지 중지 통보 실패 (무시): {e}"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client_for(server: &mockito::ServerGuard) -> DetectionApiClient {
        let config = ServerConfig {
            base_url: server.url(),
            request_timeout_secs: 5,
            settle_delay_ms: 0,
            reconnect_delay_secs: 1,
        };
        DetectionApiClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn health_check_success() {
        let mut server = mockito::Server::new_async().await;
        let client = client_for(&server);

        let mock = server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"running","service":"SafeZone AI API","model_loaded":true}"#)
            .create_async()
            .await;

        let health = client.health().await.unwrap();
        assert_eq!(health.status, "running");
        assert!(health.model_loaded);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn start_preview_sends_placeholder_region() {
        let mut server = mockito::Server::new_async().await;
        let client = client_for(&server);

        let mock = server
            .mock("POST", "/start-preview")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "source": "rtsp",
                "region": {"x": 0, "y": 0, "width": 1, "height": 1},
                "rtsp_url": "rtsp://cam.local/stream"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"success","message":"Preview started successfully"}"#)
            .create_async()
            .await;

        let resp = client
            .start_preview(VideoSource::Rtsp, Some("rtsp://cam.local/stream"))
            .await
            .unwrap();
        assert_eq!(resp.status, "success");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn start_detection_sends_exact_region_and_source() {
        let mut server = mockito::Server::new_async().await;
        let client = client_for(&server);

        let mock = server
            .mock("POST", "/start-detection")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "source": "webcam",
                "region": {"x": 100, "y": 100, "width": 200, "height": 150}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"success","message":"Detection started successfully"}"#)
            .create_async()
            .await;

        let region = Region {
            x: 100,
            y: 100,
            width: 200,
            height: 150,
        };
        let resp = client
            .start_detection(VideoSource::Webcam, region, None)
            .await
            .unwrap();
        assert_eq!(resp.status, "success");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn webcam_request_omits_rtsp_url() {
        let mut server = mockito::Server::new_async().await;
        let client = client_for(&server);

        // rtsp_url 필드는 직렬화 자체가 생략된다 — 정확 일치로 검증
        let mock = server
            .mock("POST", "/start-detection")
            .match_body(Matcher::Json(serde_json::json!({
                "source": "webcam",
                "region": {"x": 1, "y": 1, "width": 20, "height": 20}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"success","message":"ok"}"#)
            .create_async()
            .await;

        let region = Region {
            x: 1,
            y: 1,
            width: 20,
            height: 20,
        };
        client
            .start_detection(VideoSource::Webcam, region, None)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_2xx_prefers_detail_field() {
        let mut server = mockito::Server::new_async().await;
        let client = client_for(&server);

        let _mock = server
            .mock("POST", "/start-detection")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"detail":"Failed to open webcam"}"#)
            .create_async()
            .await;

        let region = Region {
            x: 0,
            y: 0,
            width: 20,
            height: 20,
        };
        let err = client
            .start_detection(VideoSource::Webcam, region, None)
            .await
            .unwrap_err();

        match err {
            CoreError::Request { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Failed to open webcam");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_2xx_without_detail_uses_raw_body() {
        let mut server = mockito::Server::new_async().await;
        let client = client_for(&server);

        let _mock = server
            .mock("POST", "/stop-detection")
            .with_status(500)
            .with_body("Internal Server Error")
            .create_async()
            .await;

        let err = client.stop_detection().await.unwrap_err();
        assert_eq!(err.to_string(), "Server Error: 500 - Internal Server Error");
    }

    #[tokio::test]
    async fn connection_failure_maps_to_network_error() {
        let config = ServerConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            request_timeout_secs: 2,
            settle_delay_ms: 0,
            reconnect_delay_secs: 1,
        };
        let client = DetectionApiClient::new(&config).unwrap();

        let err = client.stop_detection().await.unwrap_err();
        assert!(matches!(err, CoreError::Network(_)));
    }

    #[tokio::test]
    async fn notify_stop_detection_fires_without_awaiting() {
        let mut server = mockito::Server::new_async().await;
        let client = client_for(&server);

        let mock = server
            .mock("POST", "/stop-detection")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"success","message":"ok"}"#)
            .create_async()
            .await;

        client.notify_stop_detection();

        // fire-and-forget — 전송 완료를 잠시 기다린 뒤 호출 여부만 확인
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        mock.assert_async().await;
    }
}
