use facelens::app::FaceApp;
use facelens::config::Settings;
use facelens::error::AppError;
use facelens::headless;
use tracing::{Level, info};

fn init_logging(level: Level) {
    // stdout carries the JSON event lines in headless mode
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let settings = Settings::load()?;
    init_logging(settings.log_level());

    if settings.ui.headless {
        info!("Starting headless capture");
        headless::run(settings).await
    } else {
        info!("Starting FaceLens window");
        FaceApp::start_gui(settings)
    }
}
