use actix_web::{HttpResponse, web, Error, error};
use crate::lib::rest_api::APIStorage;

pub async fn capture(ds: web::Data<APIStorage>) -> Result<HttpResponse, Error> {
    let last_frame = ds.mjpeg_broadcaster
        .lock()
        .map_err(|_| error::ErrorInternalServerError("Broadcaster is poisoned [Mutex]"))?
        .last_frame();
    match last_frame {
        Some(jpeg) => Ok(HttpResponse::Ok()
            .append_header(("Cache-Control", "no-store"))
            .append_header(("Content-Type", "image/jpeg"))
            .append_header(("Content-Disposition", "inline; filename=capture.jpg"))
            .body(jpeg)),
        None => Ok(HttpResponse::ServiceUnavailable().body("No frame has been captured yet")),
    }
}
