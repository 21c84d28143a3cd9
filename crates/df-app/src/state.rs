use std::path::PathBuf;
use std::sync::Arc;

use df_core::{Bitmap, Frontend, GenerationOutcome, Presenter};
use egui_wgpu::wgpu;
use egui_wgpu::wgpu::StoreOp;
use log::{debug, warn};
use winit::event_loop::EventLoopProxy;
use winit::window::Window;

use crate::dialogs;
use crate::events::DfEvent;
use crate::gfx::GfxState;
use crate::ui;
use crate::ui::{UiEvent, UiState};

const CLEAR_COLOR: wgpu::Color = wgpu::Color { r: 0.18, g: 0.18, b: 0.18, a: 1.0 };

pub struct AppState {
    pub(crate) window: Arc<Window>,

    pub gfx: GfxState,
    pub ui: UiState,

    presenter: Presenter,
}

impl AppState {
    pub async fn new(
        window: Arc<Window>,
        event_loop_proxy: Arc<EventLoopProxy<DfEvent>>,
        presenter: Presenter,
    ) -> anyhow::Result<Self> {
        let gfx = GfxState::new(window.clone()).await?;
        let mut ui_state = UiState::new(&gfx, window.clone(), event_loop_proxy);

        ui_state.add_component(Box::new(ui::TopPanel::default()));
        ui_state.add_component(Box::new(ui::PromptPanel::default()));
        ui_state.add_component(Box::new(ui::PreviewPanel::default()));
        ui_state.set_session(presenter.session());

        Ok(Self {
            window,
            gfx,
            ui: ui_state,
            presenter,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.gfx.resize(new_size);
        }
    }

    pub fn on_ui_event(&mut self, event: UiEvent) {
        debug!("UI event: {event:?}");

        let mut frontend = WindowFrontend { window: &self.window, ui: &mut self.ui };
        match event {
            UiEvent::Generate(prompt) => {
                self.presenter.generate(&prompt, &mut frontend);
            }
            UiEvent::BrowseBaseImage => self.presenter.browse(&mut frontend),
            UiEvent::ClearBaseImage => self.presenter.clear_base_image(),
            UiEvent::Download => self.presenter.download(&mut frontend),
            UiEvent::CopyPath => self.presenter.copy_path(&mut frontend),
        }

        self.ui.set_session(self.presenter.session());
    }

    pub fn on_generation_outcome(&mut self, outcome: GenerationOutcome) {
        let mut frontend = WindowFrontend { window: &self.window, ui: &mut self.ui };
        self.presenter.outcome_received(outcome, &mut frontend);

        self.ui.set_session(self.presenter.session());
    }

    pub fn render(&mut self) -> anyhow::Result<()> {
        let size = self.window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Ok(());
        }

        let output = match self.gfx.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                warn!("Surface lost, reconfiguring");
                self.gfx.reconfigure();
                self.window.request_redraw();
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self.gfx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        let full_output = self.ui.draw(&self.window);

        let platform_output = full_output.platform_output.clone();
        self.ui.egui_state.handle_platform_output(&self.window, platform_output);

        let paint_jobs = self.ui.egui_ctx.tessellate(full_output.shapes, full_output.pixels_per_point);

        let screen_desc = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [size.width, size.height],
            pixels_per_point: self.window.scale_factor() as f32,
        };

        for (id, delta) in &full_output.textures_delta.set {
            self.ui.egui_renderer.update_texture(&self.gfx.device, &self.gfx.queue, *id, delta);
        }

        self.ui.egui_renderer.update_buffers(
            &self.gfx.device,
            &self.gfx.queue,
            &mut encoder,
            &paint_jobs,
            &screen_desc,
        );

        {
            let rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                ..Default::default()
            });

            self.ui.egui_renderer.render(&mut rpass.forget_lifetime(), &paint_jobs, &screen_desc);
        }

        for id in &full_output.textures_delta.free {
            self.ui.egui_renderer.free_texture(id);
        }

        self.gfx.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        if full_output.viewport_output.values().any(|v| v.repaint_delay.is_zero()) {
            self.window.request_redraw();
        }

        Ok(())
    }
}

/// The window side of the presenter's handlers.
struct WindowFrontend<'a> {
    window: &'a Window,
    ui: &'a mut UiState,
}

impl Frontend for WindowFrontend<'_> {
    fn show_error(&mut self, title: &str, message: &str) {
        dialogs::error_in(self.window, title, message);
    }

    fn show_info(&mut self, title: &str, message: &str) {
        dialogs::info_in(self.window, title, message);
    }

    fn pick_base_image(&mut self) -> Option<PathBuf> {
        dialogs::pick_base_image(self.window)
    }

    fn pick_save_path(&mut self) -> Option<PathBuf> {
        dialogs::pick_save_path(self.window)
    }

    fn copy_to_clipboard(&mut self, text: &str) {
        self.ui.set_clipboard(text);
    }

    fn show_image(&mut self, image: &Bitmap) {
        self.ui.set_preview(image);
    }
}
