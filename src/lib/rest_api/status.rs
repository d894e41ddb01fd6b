use actix_web::{HttpResponse, web, Error, error};
use serde::Serialize;
use crate::lib::rest_api::APIStorage;

#[derive(Debug, Serialize)]
pub struct ServerStatus {
    pub stream_clients: usize,
    pub frames_sent: u64,
    pub has_frame: bool,
    pub snapshots: usize,
}

pub async fn status(ds: web::Data<APIStorage>) -> Result<HttpResponse, Error> {
    let (stream_clients, frames_sent, has_frame) = {
        let broadcaster = ds.mjpeg_broadcaster
            .lock()
            .map_err(|_| error::ErrorInternalServerError("Broadcaster is poisoned [Mutex]"))?;
        (broadcaster.clients_count(), broadcaster.frames_sent(), broadcaster.last_frame().is_some())
    };
    let snapshots = ds.snapshots
        .read()
        .map_err(|_| error::ErrorInternalServerError("Snapshots are poisoned [RWLock]"))?
        .records()
        .len();
    Ok(HttpResponse::Ok().json(ServerStatus {
        stream_clients,
        frames_sent,
        has_frame,
        snapshots,
    }))
}
