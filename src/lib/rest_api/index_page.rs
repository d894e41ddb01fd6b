use actix_web::{HttpResponse, Responder};

pub const INDEX_HTML: &str = include_str!("index.html");

pub async fn index_page() -> impl Responder {
    return HttpResponse::Ok().append_header(("Content-Type", "text/html")).body(INDEX_HTML);
}
