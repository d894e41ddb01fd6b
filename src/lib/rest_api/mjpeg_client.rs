use actix_web::{HttpResponse, web, Error, error};
use crate::lib::mjpeg_streaming::BOUNDARY;
use crate::lib::rest_api::APIStorage;

pub async fn add_new_client(ds: web::Data<APIStorage>) -> Result<HttpResponse, Error> {
    let rx = ds.mjpeg_broadcaster
        .lock()
        .map_err(|_| error::ErrorInternalServerError("Broadcaster is poisoned [Mutex]"))?
        .add_client();
    Ok(HttpResponse::Ok()
        .append_header(("Cache-Control", "no-store, must-revalidate"))
        .append_header(("Pragma", "no-cache"))
        .append_header(("Expires", "0"))
        .append_header(("Connection", "close"))
        .append_header(("Content-Type", format!("multipart/x-mixed-replace;boundary={}", BOUNDARY)))
        .streaming(rx))
}
