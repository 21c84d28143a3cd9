use egui::{Color32, Context, RichText, TextEdit};

use crate::ui::{UiComponent, UiContext, UiEvent};

const ACCENT_GREEN: Color32 = Color32::from_rgb(0x4c, 0xaf, 0x50);
const ACCENT_BLUE: Color32 = Color32::from_rgb(0x21, 0x96, 0xf3);

#[derive(Default)]
pub struct PromptPanel {
    prompt_text: String,
}

impl UiComponent for PromptPanel {
    fn show(&mut self, ctx: &Context, ui_ctx: &UiContext) {
        let session = &ui_ctx.session;
        let enabled = ui_ctx.controls_enabled();

        egui::SidePanel::left("prompt_panel")
            .default_width(300.0)
            .resizable(false)
            .show(ctx, |ui| {
                ui.add_space(10.0);
                ui.label(RichText::new("Enter Prompt:").size(15.0));
                ui.add_space(5.0);

                let response = ui.add(
                    TextEdit::singleline(&mut self.prompt_text)
                        .desired_width(f32::INFINITY)
                        .hint_text("e.g., a red bicycle leaning on a brick wall"),
                );
                let submitted = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

                ui.add_space(10.0);

                // === Base image ===
                ui.horizontal(|ui| {
                    if ui
                        .add_enabled(enabled, egui::Button::new("Upload Base Image (optional)"))
                        .clicked()
                    {
                        ui_ctx.send_event(UiEvent::BrowseBaseImage);
                    }

                    if session.base_image().is_some()
                        && ui.add_enabled(enabled, egui::Button::new("✖")).on_hover_text("Clear base image").clicked()
                    {
                        ui_ctx.send_event(UiEvent::ClearBaseImage);
                    }
                });

                if let Some(path) = session.base_image() {
                    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
                    ui.label(RichText::new(format!("Base image: {name}")).small().color(Color32::GRAY));
                }

                ui.add_space(10.0);

                let generate_button = ui.add_enabled(
                    enabled,
                    egui::Button::new(RichText::new("Generate Image").size(16.0).strong().color(Color32::WHITE))
                        .fill(ACCENT_GREEN)
                        .min_size(egui::vec2(ui.available_width(), 32.0)),
                );

                if enabled && (generate_button.clicked() || submitted) {
                    ui_ctx.send_event(UiEvent::Generate(self.prompt_text.clone()));
                }

                ui.add_space(10.0);

                // === Status ===
                ui.horizontal(|ui| {
                    if session.is_busy() {
                        ui.spinner();
                    }
                    ui.label(RichText::new(session.status().message()).italics().color(ACCENT_BLUE));
                });

                ui.add_space(5.0);
                ui.add(egui::Label::new(RichText::new(session.output_label()).small()).wrap());

                if ui.add_enabled(enabled, egui::Button::new("Copy output path")).clicked() {
                    ui_ctx.send_event(UiEvent::CopyPath);
                }
            });
    }
}
