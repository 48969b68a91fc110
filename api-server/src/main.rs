mod api;
mod fairings;
mod guards;
mod models;
mod routes;
mod sources;

use api::build_schema;
use fairings::ResponseHeaders;
use log::{error, info};
use models::config::Config;
use models::context::{Context, ContextPointer};
use rocket::fairing::AdHoc;
use rocket::{launch, Build, Rocket};
use simplelog::{ColorChoice, TermLogger, TerminalMode};
use std::sync::Arc;

const CONFIG_PATH: &str = "config.yaml";

/// Assemble the server around a shared context
pub fn build(config: Config) -> Rocket<Build> {
    let context: ContextPointer = Arc::new(Context::new(config));
    let schema = build_schema(context.clone());

    rocket::build()
        .manage(context)
        .manage(schema)
        .mount("/api", routes::api_routes())
        .mount("/", routes::graphql::graphql_routes())
        .register("/", routes::json_catchers())
        .attach(ResponseHeaders)
        .attach(AdHoc::on_liftoff("Cache maintenance", |rocket| {
            Box::pin(async move {
                if let Some(context) = rocket.state::<ContextPointer>() {
                    let tasks = context.spawn_maintenance();
                    info!("Started {} maintenance task(s)", tasks.len());
                }
            })
        }))
}

#[launch]
fn rocket() -> _ {
    let loaded = Config::load(CONFIG_PATH);
    let config = loaded.as_ref().cloned().unwrap_or_default();

    if let Err(err) = TermLogger::init(
        config.level_filter(),
        simplelog::Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ) {
        eprintln!("Failed to initialize logger: {}", err);
    }

    match loaded {
        Ok(_) => info!("Loaded configuration ({})", config.environment()),
        Err(err) => error!("Invalid configuration, using defaults: {}", err),
    }

    build(config)
}
