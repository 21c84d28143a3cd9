mod preview_panel;
mod prompt_panel;
mod top_panel;

pub use preview_panel::PreviewPanel;
pub use prompt_panel::PromptPanel;
pub use top_panel::TopPanel;

use std::sync::Arc;

use df_core::{Bitmap, Session};
use egui::{ColorImage, Context, TextureHandle, TextureOptions};
use log::error;
use winit::event_loop::EventLoopProxy;
use winit::window::Window;

use crate::events::DfEvent;
use crate::gfx::GfxState;

#[derive(Debug, Clone)]
pub enum UiEvent {
    Generate(String),
    BrowseBaseImage,
    ClearBaseImage,
    Download,
    CopyPath,
}

/// What the components read while drawing.
pub struct UiContext {
    pub session: Session,
    pub preview: Option<TextureHandle>,
    pub event_loop_proxy: Arc<EventLoopProxy<DfEvent>>,
}

impl UiContext {
    pub fn new(event_loop_proxy: Arc<EventLoopProxy<DfEvent>>) -> Self {
        Self {
            session: Session::new(),
            preview: None,
            event_loop_proxy,
        }
    }

    pub fn send_event(&self, event: UiEvent) {
        if self.event_loop_proxy.send_event(DfEvent::Ui(event)).is_err() {
            error!("Event loop closed, dropping UI event");
        }
    }

    pub fn controls_enabled(&self) -> bool {
        self.session.controls_enabled()
    }
}

pub struct UiState {
    pub(crate) egui_state: egui_winit::State,
    pub(crate) egui_ctx: egui::Context,
    pub(crate) egui_renderer: egui_wgpu::Renderer,

    components: Vec<Box<dyn UiComponent>>,
    pub(crate) ui_ctx: UiContext,
}

impl UiState {
    pub fn new(gfx: &GfxState, window: Arc<Window>, event_loop_proxy: Arc<EventLoopProxy<DfEvent>>) -> Self {
        let egui_ctx = egui::Context::default();

        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        let egui_renderer =
            egui_wgpu::Renderer::new(&gfx.device, gfx.config.format, egui_wgpu::RendererOptions::default());

        Self {
            egui_ctx,
            egui_state,
            egui_renderer,
            components: Vec::new(),
            ui_ctx: UiContext::new(event_loop_proxy),
        }
    }

    pub fn draw(&mut self, window: &Window) -> egui::FullOutput {
        let raw_input = self.egui_state.take_egui_input(window);

        self.egui_ctx.run(raw_input, |ctx| {
            for component in self.components.iter_mut() {
                component.show(ctx, &self.ui_ctx);
            }
        })
    }

    pub fn add_component(&mut self, component: Box<dyn UiComponent>) {
        self.components.push(component);
    }

    pub fn set_session(&mut self, session: &Session) {
        self.ui_ctx.session = session.clone();
    }

    /// Uploads the bitmap as the preview texture, replacing the previous one.
    pub fn set_preview(&mut self, image: &Bitmap) {
        let size = [image.width() as usize, image.height() as usize];
        let color_image = ColorImage::from_rgb(size, image.pixels());

        match &mut self.ui_ctx.preview {
            Some(handle) => handle.set(color_image, TextureOptions::LINEAR),
            None => {
                let handle = self.egui_ctx.load_texture("generated-image", color_image, TextureOptions::LINEAR);
                self.ui_ctx.preview = Some(handle);
            }
        }
    }

    pub fn set_clipboard(&mut self, text: &str) {
        self.egui_state.set_clipboard_text(text.to_owned());
    }
}

pub trait UiComponent {
    fn show(&mut self, ctx: &Context, ui_ctx: &UiContext);
}
