mod app;
mod dialogs;
mod events;
mod gfx;
mod state;
mod ui;

use std::error::Error;
use std::process;

use df_core::config::AppConfig;
use df_core::output::OutputDir;
use df_core::pipeline::StableDiffusionLoader;
use df_core::{GenerationService, GenerationSettings};
use winit::event_loop::{ControlFlow, EventLoop};

use crate::app::Startup;
use crate::events::DfEvent;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let startup = match startup() {
        Ok(startup) => startup,
        Err(e) => {
            tracing::error!("Startup failed: {e:#}");
            dialogs::error("Model Load Error", &format!("Failed to load model:\n{e:#}"));
            process::exit(1);
        }
    };

    let mut event_loop: EventLoop<DfEvent> = EventLoop::with_user_event().build()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = app::App::new(&mut event_loop, startup, tokio::runtime::Handle::current());
    event_loop.run_app(&mut app)?;

    Ok(())
}

/// Everything that must succeed before a window is opened.
fn startup() -> anyhow::Result<Startup> {
    let config = AppConfig::load()?;
    tracing::info!("Model: {}", config.model_path.display());

    let loader = StableDiffusionLoader::new(&config.model_path, config.device)?;
    let safety = GenerationService::safety_policy(&loader, config.safety_check)?;
    let service = GenerationService::new(Box::new(loader), GenerationSettings::default(), safety)?;
    let output = OutputDir::create(&config.output_dir)?;

    Ok(Startup { service, output })
}
