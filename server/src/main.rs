use std::io;

use actix_web::{web, App, HttpServer};

use whiteboard_server::handlers::{cors, root};
use whiteboard_server::server::spawn_server;
use whiteboard_server::settings::load_config;
use whiteboard_system::{DocumentStore, JsonFileStorage};

#[actix_web::main]
async fn main() -> io::Result<()> {
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config().map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;

    let storage = JsonFileStorage::new(config.data_file.clone());
    log::info!("Boards are stored in {}", storage.path().display());
    let store = DocumentStore::open(storage);
    let srv_tx = spawn_server(store, &config);

    let bind_address = config.bind_address.clone();
    log::info!("Listening on http://{}", bind_address);
    log::info!("Live viewers connect to ws://{}/ws", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(cors(&config.allowed_origins))
            .data(srv_tx.clone())
            .data(config.clone())
            .app_data(web::PayloadConfig::new(config.json_limit))
            .configure(root)
    })
    .bind(bind_address)?
    .run()
    .await
}
