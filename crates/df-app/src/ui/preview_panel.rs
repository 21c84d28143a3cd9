use egui::load::SizedTexture;
use egui::{Color32, Context, RichText};

use crate::ui::{UiComponent, UiContext, UiEvent};

const PANEL_BG: Color32 = Color32::from_rgb(0x42, 0x42, 0x42);
const BUTTON_HEIGHT: f32 = 40.0;

#[derive(Default)]
pub struct PreviewPanel {}

impl UiComponent for PreviewPanel {
    fn show(&mut self, ctx: &Context, ui_ctx: &UiContext) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let area = ui.available_size() - egui::vec2(0.0, BUTTON_HEIGHT);

            egui::Frame::new()
                .fill(PANEL_BG)
                .stroke(egui::Stroke::new(1.0, Color32::DARK_GRAY))
                .show(ui, |ui| {
                    ui.set_min_size(area);
                    ui.centered_and_justified(|ui| match &ui_ctx.preview {
                        Some(texture) => {
                            ui.add(
                                egui::Image::new(SizedTexture::from_handle(texture))
                                    .max_size(area)
                                    .maintain_aspect_ratio(true),
                            );
                        }
                        None => {
                            ui.label(RichText::new("Generated Image").size(16.0).color(Color32::GRAY));
                        }
                    });
                });

            ui.add_space(8.0);
            ui.vertical_centered(|ui| {
                if ui.add_enabled(ui_ctx.controls_enabled(), egui::Button::new("Download Image")).clicked() {
                    ui_ctx.send_event(UiEvent::Download);
                }
            });
        });
    }
}
