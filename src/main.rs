use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use anyhow::bail;
use clap::Parser;
use dotenv::dotenv;
use log::{info, warn};

use glucose_api::config::Settings;
use glucose_api::inference::ModelInference;
use glucose_api::models::API_TITLE;
use glucose_api::routes;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let settings = Settings::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&settings.log_level))
        .format_timestamp_millis()
        .format_module_path(false)
        .init();

    info!("🚀 Starting {}", API_TITLE);

    let inference = ModelInference::load(&settings.model_path, &settings.scaler_path);
    if !inference.model_loaded() {
        if settings.require_model {
            bail!(
                "model could not be loaded from {} and --require-model is set",
                settings.model_path.display()
            );
        }
        warn!("Serving without a model: /predict will return an error payload");
    }
    let inference = web::Data::new(inference);

    let bind_address = settings.bind_address();
    let workers = settings.worker_count();

    info!("🌐 Listening on http://{}", bind_address);
    info!("👷 Workers: {}", workers);
    info!("🔧 Endpoints:");
    info!("   GET  /            - Liveness message");
    info!("   GET  /health      - Artifact status");
    info!("   GET  /model-info  - Feature schema");
    info!("   POST /predict     - Glucose level prediction");

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(routes::security_headers())
            .wrap(routes::cors())
            .app_data(inference.clone())
            .configure(routes::configure)
    })
    .workers(workers)
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}
