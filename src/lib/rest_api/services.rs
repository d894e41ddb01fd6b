use actix_web::{HttpResponse, web, Responder};

use crate::lib::rest_api::{
    index_page,
    mjpeg_client,
    capture,
    detections_list,
    status,
};

async fn say_ping() -> impl Responder {
    HttpResponse::Ok().body("pong")
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/", web::get().to(index_page::index_page))
        .route("/stream", web::get().to(mjpeg_client::add_new_client))
        .route("/capture", web::get().to(capture::capture))
        .service(
            web::scope("/api")
            .route("/ping", web::get().to(say_ping))
            .route("/detections", web::get().to(detections_list::detections_list))
            .route("/status", web::get().to(status::status))
        );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use actix_web::{test, App, http::StatusCode, http::header};
    use opencv::{core::Mat, core::Scalar, core::CV_8UC3, prelude::*};

    use crate::lib::mjpeg_streaming::Broadcaster;
    use crate::lib::rest_api::APIStorage;
    use crate::lib::rest_api::index_page::INDEX_HTML;
    use crate::lib::snapshots::SnapshotRegistry;

    fn storage(snapshots_dir: &std::path::Path) -> web::Data<APIStorage> {
        web::Data::new(APIStorage {
            snapshots: SnapshotRegistry::new_threaded(snapshots_dir),
            mjpeg_broadcaster: web::Data::new(Mutex::new(Broadcaster::default())),
        })
    }

    fn content_type<B>(resp: &actix_web::dev::ServiceResponse<B>) -> String {
        resp.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap().to_string()
    }

    #[actix_web::test]
    async fn test_index_page() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(App::new().app_data(storage(dir.path())).configure(init_routes)).await;
        let req = test::TestRequest::get().uri("/").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(content_type(&resp), "text/html");
        let body = test::read_body(resp).await;
        assert_eq!(body, INDEX_HTML.as_bytes());
    }

    #[actix_web::test]
    async fn test_unknown_route() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(App::new().app_data(storage(dir.path())).configure(init_routes)).await;
        let req = test::TestRequest::get().uri("/index.html").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_stream_headers() {
        let dir = tempfile::tempdir().unwrap();
        let data = storage(dir.path());
        let app = test::init_service(App::new().app_data(data.clone()).configure(init_routes)).await;
        let req = test::TestRequest::get().uri("/stream").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(content_type(&resp), "multipart/x-mixed-replace;boundary=boundarydonotcross");
        assert_eq!(resp.headers().get(header::CACHE_CONTROL).unwrap(), "no-store, must-revalidate");
        assert_eq!(data.mjpeg_broadcaster.lock().unwrap().clients_count(), 1);
    }

    #[actix_web::test]
    async fn test_capture() {
        let dir = tempfile::tempdir().unwrap();
        let data = storage(dir.path());
        let app = test::init_service(App::new().app_data(data.clone()).configure(init_routes)).await;

        let req = test::TestRequest::get().uri("/capture").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        data.mjpeg_broadcaster.lock().unwrap().send_image(&[0xFF, 0xD8, 0xFF, 0xD9]);
        let req = test::TestRequest::get().uri("/capture").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(content_type(&resp), "image/jpeg");
        let body = test::read_body(resp).await;
        assert_eq!(&body[..], &[0xFF, 0xD8, 0xFF, 0xD9]);
    }

    #[actix_web::test]
    async fn test_ping_and_detections() {
        let dir = tempfile::tempdir().unwrap();
        let data = storage(dir.path());
        let app = test::init_service(App::new().app_data(data.clone()).configure(init_routes)).await;

        let req = test::TestRequest::get().uri("/api/ping").to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, "pong");

        let req = test::TestRequest::get().uri("/api/detections").to_request();
        let empty: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(empty, serde_json::json!([]));

        let frame = Mat::new_rows_cols_with_default(16, 16, CV_8UC3, Scalar::all(127.0)).unwrap();
        data.snapshots.write().unwrap().try_save("person", &frame).unwrap();
        let req = test::TestRequest::get().uri("/api/detections").to_request();
        let listed: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let listed = listed.as_array().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["class_name"], "person");
        assert!(listed[0]["path"].as_str().unwrap().ends_with("detected_person.jpg"));
        assert!(listed[0]["saved_at"].is_string());
    }

    #[actix_web::test]
    async fn test_status() {
        let dir = tempfile::tempdir().unwrap();
        let data = storage(dir.path());
        let app = test::init_service(App::new().app_data(data.clone()).configure(init_routes)).await;

        let _client = data.mjpeg_broadcaster.lock().unwrap().add_client();
        data.mjpeg_broadcaster.lock().unwrap().send_image(b"jpeg");

        let req = test::TestRequest::get().uri("/api/status").to_request();
        let status: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(status["stream_clients"], 1);
        assert_eq!(status["frames_sent"], 1);
        assert_eq!(status["has_frame"], true);
        assert_eq!(status["snapshots"], 0);
    }
}
