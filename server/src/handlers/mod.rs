use crate::connection::ws_index;
use crate::handlers::boards::configure_board_handlers;
use actix_cors::Cors;
use actix_web::http::header;
use actix_web::web;

mod boards;

pub fn root(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/ws").route(web::get().to(ws_index)));

    configure_board_handlers(cfg);
}

pub fn cors(allowed_origins: &[String]) -> Cors {
    allowed_origins.iter().fold(
        Cors::default()
            .allowed_methods(vec!["GET", "POST", "DELETE"])
            .allowed_header(header::CONTENT_TYPE)
            .supports_credentials(),
        |cors, origin| cors.allowed_origin(origin),
    )
}
