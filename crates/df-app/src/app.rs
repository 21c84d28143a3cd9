use std::sync::Arc;

use df_core::output::OutputDir;
use df_core::{GenerationService, JobRunner, Presenter};
use log::error;
use tokio::runtime::Handle;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy};
use winit::window::{WindowAttributes, WindowId};

use crate::events::{DfEvent, ProxySink};
use crate::state::AppState;

pub const WINDOW_TITLE: &str = "AI Image Generator";

/// The loaded model and output directory, ready before the window exists.
pub struct Startup {
    pub service: GenerationService,
    pub output: OutputDir,
}

pub struct App {
    event_loop_proxy: Arc<EventLoopProxy<DfEvent>>,
    presenter: Option<Presenter>,
    state: Option<AppState>,
}

impl App {
    pub fn new(event_loop: &mut EventLoop<DfEvent>, startup: Startup, runtime: Handle) -> Self {
        let event_loop_proxy = Arc::new(event_loop.create_proxy());

        let sink = Arc::new(ProxySink::new(event_loop_proxy.clone()));
        let runner = JobRunner::new(startup.service, startup.output, sink, runtime);

        Self {
            event_loop_proxy,
            presenter: Some(Presenter::new(runner)),
            state: None,
        }
    }
}

impl ApplicationHandler<DfEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(presenter) = self.presenter.take() else {
            return;
        };

        let window_attributes = WindowAttributes::default()
            .with_title(WINDOW_TITLE)
            .with_inner_size(winit::dpi::LogicalSize::new(700.0, 750.0))
            .with_min_inner_size(winit::dpi::LogicalSize::new(600.0, 650.0));

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                error!("Failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        match pollster::block_on(AppState::new(window, self.event_loop_proxy.clone(), presenter)) {
            Ok(state) => {
                state.window.request_redraw();
                self.state = Some(state);
            }
            Err(e) => {
                error!("Failed to initialise graphics: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: DfEvent) {
        let Some(state) = &mut self.state else {
            return;
        };

        match event {
            DfEvent::Ui(e) => state.on_ui_event(e),
            DfEvent::Generation(outcome) => state.on_generation_outcome(outcome),
        }
        state.window.request_redraw();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(state) = &mut self.state else {
            return;
        };

        if state.window.id() != window_id {
            return;
        }

        let response = state.ui.egui_state.on_window_event(&state.window, &event);
        if response.repaint {
            state.window.request_redraw();
        }

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(physical_size) => {
                state.resize(physical_size);
                state.window.request_redraw();
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = state.render() {
                    error!("Render failed: {e:#}");
                }
            }
            _ => {}
        }
    }
}
