use std::io;
use std::sync::{
    Mutex,
    mpsc::{
        Receiver,
        SyncSender
    }
};
use actix_web::{web, http, App, HttpServer};
use actix_cors::Cors;
use tracing::info;

use crate::lib::rest_api::services;
use crate::lib::mjpeg_streaming::Broadcaster;
use crate::lib::snapshots::ThreadedSnapshots;

pub struct APIStorage {
    pub snapshots: ThreadedSnapshots,
    pub mjpeg_broadcaster: web::Data<Mutex<Broadcaster>>
}

impl APIStorage {
    pub fn new(snapshots: ThreadedSnapshots) -> Self {
        APIStorage {
            snapshots: snapshots,
            mjpeg_broadcaster: web::Data::new(Mutex::new(Broadcaster::default())),
        }
    }
}

/// Serves until the server is stopped. The bind outcome is reported through
/// `ready` before anything is served, so the caller can bail out early.
#[actix_web::main]
pub async fn start_rest_api(server_host: String, server_port: u16, storage: APIStorage, rx_frames_data: Receiver<Vec<u8>>, ready: SyncSender<io::Result<()>>) -> io::Result<()> {
    let bind_address = format!("{}:{}", server_host, server_port);
    info!("Web server is starting on host:port {}", bind_address);

    let broadcaster = storage.mjpeg_broadcaster.clone();
    let data = web::Data::new(storage);
    let bound = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_headers(vec![http::header::ORIGIN, http::header::AUTHORIZATION, http::header::CONTENT_TYPE, http::header::CONTENT_LENGTH, http::header::ACCEPT, http::header::ACCEPT_ENCODING])
            .allowed_methods(vec!["GET"])
            .expose_headers(vec![http::header::CONTENT_LENGTH])
            .supports_credentials()
            .max_age(5600);
        App::new()
            .wrap(cors)
            .app_data(data.clone())
            .configure(services::init_routes)
    })
    .bind(&bind_address);

    let server = match bound {
        Ok(server) => server,
        Err(err) => {
            let _ = ready.send(Err(io::Error::new(err.kind(), format!("Could not bind server to address {}: {}", bind_address, err))));
            return Err(err);
        }
    };
    let _ = ready.send(Ok(()));

    Broadcaster::spawn_receiver(broadcaster, rx_frames_data);
    server.run().await
}
