use crate::annotation::{
    AnnotationConsumer, ChangeSummary, LineClassification, LineClassificationMap,
};
use crate::config::GutterSettings;
use crate::style::rgb;
use egui::text::CCursor;
use egui::{Color32, Galley, Pos2, Rect, RichText, Sense, Ui};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

/// Paints change markers next to the editor from the last published map
#[derive(Default)]
pub struct Gutter {
    annotations: Arc<LineClassificationMap>,
    summary: ChangeSummary,
    /// Filled by the session's consumer, drained by [`sync`](Self::sync)
    inbox: Rc<RefCell<Option<Arc<LineClassificationMap>>>>,
}

impl Gutter {
    /// Consumer to hand to the annotation session
    pub fn consumer(&self) -> impl AnnotationConsumer + 'static {
        let inbox = Rc::clone(&self.inbox);
        move |map: Arc<LineClassificationMap>| {
            *inbox.borrow_mut() = Some(map);
        }
    }

    /// Take the newest published map; `true` if there was one
    pub fn sync(&mut self) -> bool {
        let Some(map) = self.inbox.borrow_mut().take() else {
            return false;
        };
        self.summary = map.summary();
        self.annotations = map;
        true
    }

    pub fn clear(&mut self) {
        self.inbox.borrow_mut().take();
        self.annotations = Arc::default();
        self.summary = ChangeSummary::default();
    }

    pub fn summary(&self) -> ChangeSummary {
        self.summary
    }

    #[allow(clippy::too_many_arguments)]
    pub fn show(
        &self,
        ui: &mut Ui,
        content: &str,
        galley: &Arc<Galley>,
        gutter_rect: Rect,
        clip_rect: Rect,
        text_offset: Pos2,
        settings: &GutterSettings,
    ) {
        let painter = ui.painter_at(gutter_rect);
        let response = ui.interact(gutter_rect, ui.id().with("diff_gutter"), Sense::hover());
        let hover_pos = response.hover_pos();
        let mut hovered_line: Option<usize> = None;

        let view_min_y = clip_rect.min.y - 50.0;
        let view_max_y = clip_rect.max.y + 50.0;

        let mut current_char_idx: usize = 0;
        // An empty buffer still shows one line
        let lines = std::iter::once("")
            .filter(|_| content.is_empty())
            .chain(content.split_inclusive('\n'));

        for (line_idx, line) in lines.enumerate() {
            let line_number = line_idx + 1;
            let text = line.trim_end_matches(['\n', '\r']);

            let start = galley.pos_from_cursor(CCursor::new(current_char_idx));
            let end = galley.pos_from_cursor(CCursor::new(current_char_idx + text.chars().count()));
            current_char_idx += line.chars().count();

            let top = text_offset.y + start.top();
            let bottom = text_offset.y + end.bottom();
            if bottom < view_min_y {
                continue;
            }
            if top > view_max_y {
                break;
            }

            if let Some(pos) = hover_pos
                && pos.y >= top
                && pos.y < bottom
            {
                hovered_line = Some(line_number);
            }

            let classification = self.annotations.classification(line_number);
            let Some(color) = marker_color(classification, settings) else {
                continue;
            };
            let x_range = gutter_rect.x_range();
            let marker = match classification {
                // Removed text sits below its anchor line
                LineClassification::Removed => Rect::from_x_y_ranges(
                    x_range,
                    (bottom - (bottom - top) / 3.0)..=bottom,
                ),
                _ => Rect::from_x_y_ranges(x_range, top..=bottom),
            };
            painter.rect_filled(marker, 0.0, color);
        }

        let Some(line) = hovered_line else {
            return;
        };
        let Some(tooltip) = self.annotations.tooltip(line) else {
            return;
        };
        let row_height = ui.text_style_height(&egui::TextStyle::Monospace);
        let max_lines =
            visible_rows(clip_rect.height(), row_height).min(settings.tooltip_max_lines);
        let text = tooltip.truncated(max_lines).to_string();
        response.on_hover_ui(|ui| {
            ui.label(RichText::new(text).monospace());
        });
    }
}

fn marker_color(classification: LineClassification, settings: &GutterSettings) -> Option<Color32> {
    match classification {
        LineClassification::None => None,
        LineClassification::Added => Some(rgb(settings.added_color)),
        LineClassification::Modified => Some(rgb(settings.modified_color)),
        LineClassification::Removed => Some(rgb(settings.removed_color)),
    }
}

/// Rows of text that fit in a view of `height`, at least one
fn visible_rows(height: f32, row_height: f32) -> usize {
    if row_height <= 0.0 || !height.is_finite() {
        return 1;
    }
    ((height / row_height).floor() as usize).max(1)
}
