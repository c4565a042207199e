use actix_web::error;
use actix_web::web::{self, HttpResponse};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use whiteboard_system::serde_json::{self, json};
use whiteboard_system::{BoardId, SaveRequest, ShareId, StoreError};

use crate::server::{BoardCommand, ServerCommand, ServerTx};

pub fn configure_board_handlers(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/whiteboards").route(web::get().to(list_boards)))
        .service(web::resource("/api/whiteboard").route(web::get().to(load_board)))
        .service(web::resource("/api/whiteboard/new").route(web::post().to(create_board)))
        .service(web::resource("/api/whiteboard/save").route(web::post().to(save_board)))
        .service(
            web::resource("/api/whiteboard/generate-share").route(web::get().to(generate_share)),
        )
        .service(web::resource("/api/whiteboard/get-by-share").route(web::get().to(get_by_share)))
        // after the fixed paths above, otherwise they would match as a board id
        .service(web::resource("/api/whiteboard/{board_id}").route(web::delete().to(delete_board)));
}

async fn ask<T>(
    srv_tx: &ServerTx,
    command: impl FnOnce(oneshot::Sender<T>) -> BoardCommand,
) -> Result<T, actix_web::Error> {
    let (tx, rx) = oneshot::channel::<T>();
    srv_tx
        .send(ServerCommand::Board(command(tx)))
        .map_err(|_| error::ErrorInternalServerError("Internal Server Error"))?;
    rx.await
        .map_err(|_| error::ErrorInternalServerError("Receiver await error"))
}

/// Store errors travel in the payload, never as an HTTP error status.
fn respond<T: Serialize>(result: Result<T, StoreError>) -> HttpResponse {
    match result {
        Ok(value) => HttpResponse::Ok().json(value),
        Err(err) => {
            log::debug!("Request failed: {}", err);
            HttpResponse::Ok().json(json!({ "error": err.to_string() }))
        }
    }
}

fn required(value: Option<String>, name: &'static str) -> Result<String, StoreError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(StoreError::MissingParameter(name))
}

#[derive(Deserialize)]
pub struct LoadQuery {
    id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardQuery {
    board_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareQuery {
    share_id: Option<String>,
}

async fn list_boards(srv_tx: web::Data<ServerTx>) -> Result<HttpResponse, actix_web::Error> {
    let summaries = ask(&srv_tx, |tx| BoardCommand::List { tx }).await?;
    Ok(HttpResponse::Ok().json(summaries))
}

async fn create_board(srv_tx: web::Data<ServerTx>) -> Result<HttpResponse, actix_web::Error> {
    let result = ask(&srv_tx, |tx| BoardCommand::Create { tx }).await?;
    Ok(respond(
        result.map(|board_id| json!({ "success": true, "boardId": board_id })),
    ))
}

async fn load_board(
    query: web::Query<LoadQuery>,
    srv_tx: web::Data<ServerTx>,
) -> Result<HttpResponse, actix_web::Error> {
    let board_id = match required(query.into_inner().id, "id") {
        Ok(id) => BoardId::from(id),
        Err(err) => return Ok(respond::<()>(Err(err))),
    };
    let result = ask(&srv_tx, |tx| BoardCommand::Load { board_id, tx }).await?;
    Ok(respond(result))
}

/// Takes raw bytes so an absent or unparsable body ends up as missing parameters.
async fn save_board(
    body: web::Bytes,
    srv_tx: web::Data<ServerTx>,
) -> Result<HttpResponse, actix_web::Error> {
    let request = serde_json::from_slice::<SaveRequest>(&body).unwrap_or_else(|err| {
        log::debug!("Unreadable save body: {}", err);
        SaveRequest::default()
    });
    let result = ask(&srv_tx, |tx| BoardCommand::Save { request, tx }).await?;
    Ok(respond(result.map(|()| json!({ "success": true }))))
}

async fn delete_board(
    path: web::Path<String>,
    srv_tx: web::Data<ServerTx>,
) -> Result<HttpResponse, actix_web::Error> {
    let board_id = BoardId::from(path.into_inner());
    let result = ask(&srv_tx, |tx| BoardCommand::Delete { board_id, tx }).await?;
    Ok(respond(result.map(|()| json!({ "success": true }))))
}

async fn generate_share(
    query: web::Query<BoardQuery>,
    srv_tx: web::Data<ServerTx>,
) -> Result<HttpResponse, actix_web::Error> {
    let board_id = match required(query.into_inner().board_id, "boardId") {
        Ok(id) => BoardId::from(id),
        Err(err) => return Ok(respond::<()>(Err(err))),
    };
    let result = ask(&srv_tx, |tx| BoardCommand::GenerateShare { board_id, tx }).await?;
    Ok(respond(result.map(|share_id| json!({ "shareId": share_id }))))
}

async fn get_by_share(
    query: web::Query<ShareQuery>,
    srv_tx: web::Data<ServerTx>,
) -> Result<HttpResponse, actix_web::Error> {
    let share_id = match required(query.into_inner().share_id, "shareId") {
        Ok(id) => ShareId::from(id),
        Err(err) => return Ok(respond::<()>(Err(err))),
    };
    let result = ask(&srv_tx, |tx| BoardCommand::ResolveShare { share_id, tx }).await?;
    Ok(respond(result))
}
