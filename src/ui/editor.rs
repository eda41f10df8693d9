use super::gutter::Gutter;
use crate::config::GutterSettings;
use egui::{Rect, Ui, pos2};

#[derive(Default)]
pub struct Editor {
    content: String,
}

impl Editor {
    pub fn set_content(&mut self, content: String) {
        self.content = content;
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Draw the gutter and the text. Returns `true` if the text was edited.
    pub fn show(&mut self, ui: &mut Ui, gutter: &Gutter, settings: &GutterSettings) -> bool {
        let clip_rect = ui.clip_rect();

        ui.horizontal_top(|ui| {
            let gutter_left = ui.cursor().left();
            ui.add_space(settings.width);

            let output = egui::TextEdit::multiline(&mut self.content)
                .code_editor()
                .frame(false)
                .lock_focus(true)
                .desired_width(f32::INFINITY)
                .desired_rows(30)
                .show(ui);

            let text_rect = output.response.rect;
            let gutter_rect = Rect::from_min_max(
                pos2(gutter_left, text_rect.top()),
                pos2(gutter_left + settings.width, text_rect.bottom()),
            );
            gutter.show(
                ui,
                &self.content,
                &output.galley,
                gutter_rect,
                clip_rect,
                output.galley_pos,
                settings,
            );

            output.response.changed()
        })
        .inner
    }
}
