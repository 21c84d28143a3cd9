use egui::{Context, RichText};

use crate::app::WINDOW_TITLE;
use crate::ui::{UiComponent, UiContext};

#[derive(Default)]
pub struct TopPanel {}

impl UiComponent for TopPanel {
    fn show(&mut self, ctx: &Context, _ui_ctx: &UiContext) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading(RichText::new(format!("🎨 {WINDOW_TITLE}")).strong());
            });
        });
    }
}
