// Inspired by https://github.com/dskkato/mjpeg-rs#live-streaming-server-with-rustactix-web

use std::thread;
use std::sync::Mutex;
use std::pin::Pin;
use std::task::{
    Context,
    Poll
};
use std::sync::mpsc::{
    Receiver as STDReceiver
};

use actix_web::{
    web
};
use actix_web::Error;

use futures::Stream;
use tokio::sync::mpsc::{
    channel,
    Receiver,
    Sender
};
use tracing::{debug, error};

pub const BOUNDARY: &str = "boundarydonotcross";

pub struct Broadcaster {
    clients: Vec<Sender<web::Bytes>>,
    last_frame: Option<web::Bytes>,
    frames_sent: u64,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Broadcaster {
            clients: Vec::new(),
            last_frame: None,
            frames_sent: 0,
        }
    }
}

impl Broadcaster {
    /// New clients get the latest frame right away, so a viewer connecting
    /// after the source went quiet still sees a picture.
    pub fn add_client(&mut self) -> Client {
        self.prune_closed();
        let (tx, rx) = channel(1);
        if let Some(jpeg) = self.last_frame.as_ref() {
            let _ = tx.try_send(web::Bytes::from(Broadcaster::make_message_block(jpeg)));
        }
        self.clients.push(tx);
        debug!("MJPEG client connected, {} active", self.clients.len());
        return Client(rx);
    }
    fn prune_closed(&mut self) {
        self.clients.retain(|client| !client.is_closed());
    }
    /// Number of clients that are still connected
    pub fn clients_count(&self) -> usize {
        self.clients.iter().filter(|client| !client.is_closed()).count()
    }
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }
    /// Latest encoded JPEG (without multipart framing)
    pub fn last_frame(&self) -> Option<web::Bytes> {
        self.last_frame.clone()
    }
    pub fn make_message_block(jpeg: &[u8]) -> Vec<u8> {
        let mut msg = format!("--{}\r\nContent-Length:{}\r\nContent-Type:image/jpeg\r\n\r\n", BOUNDARY, jpeg.len()).into_bytes();
        msg.extend_from_slice(jpeg);
        msg.extend_from_slice(b"\r\n");
        msg
    }
    /// Pushes a JPEG to every client. Clients which are gone or can't keep up
    /// (their single-slot queue is still full) are dropped.
    pub fn send_image(&mut self, jpeg: &[u8]) {
        let msg = web::Bytes::from(Broadcaster::make_message_block(jpeg));
        self.last_frame = Some(web::Bytes::copy_from_slice(jpeg));
        self.frames_sent += 1;
        let before = self.clients.len();
        self.clients.retain(|client| client.try_send(msg.clone()).is_ok());
        if self.clients.len() != before {
            debug!("Dropped {} MJPEG client(s), {} active", before - self.clients.len(), self.clients.len());
        }
    }
    pub fn spawn_receiver(_self: web::Data<Mutex<Self>>, rx_frames_data: STDReceiver<Vec<u8>>) {
        thread::spawn(move || {
            for received in rx_frames_data {
                match _self.lock() {
                    Ok(mut broadcaster) => broadcaster.send_image(&received),
                    Err(_) => {
                        error!("Broadcaster is poisoned [Mutex]");
                        break;
                    }
                }
            }
            debug!("Frames channel closed, MJPEG broadcasting stopped");
        });
    }
}

pub struct Client (
    Receiver<web::Bytes>
);

impl Stream for Client {
    type Item = Result<web::Bytes, Error>;
    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.0).poll_recv(cx) {
            Poll::Ready(Some(v)) => Poll::Ready(Some(Ok(v))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending
        }
    }
}
