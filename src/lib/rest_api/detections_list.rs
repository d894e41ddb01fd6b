use actix_web::{HttpResponse, web, Error, error};
use crate::lib::rest_api::APIStorage;

pub async fn detections_list(ds: web::Data<APIStorage>) -> Result<HttpResponse, Error> {
    let snapshots = ds.snapshots
        .read()
        .map_err(|_| error::ErrorInternalServerError("Snapshots are poisoned [RWLock]"))?;
    return Ok(HttpResponse::Ok().json(snapshots.records()));
}
