use crate::annotation::ChangeSummary;
use egui::{Align, Layout, RichText, Ui};
use std::path::PathBuf;

pub enum TitleBarAction {
    Save,
    Open,
    OpenFile(PathBuf),
    /// Re-read the baseline from the repository
    Refresh,
}

pub struct TitleBar;

pub struct TitleBarState<'a> {
    pub title: &'a str,
    pub dirty: bool,
    pub has_current_file: bool,
    pub summary: ChangeSummary,
    pub status: Option<&'a str>,
    pub recent_files: &'a [PathBuf],
}

impl TitleBar {
    pub fn show(ui: &mut Ui, state: TitleBarState<'_>) -> Option<TitleBarAction> {
        let TitleBarState {
            title,
            dirty,
            has_current_file,
            summary,
            status,
            recent_files,
        } = state;

        let mut action = None;

        ui.horizontal(|ui| {
            ui.with_layout(Layout::left_to_right(Align::Center), |ui| {
                let title = if dirty {
                    format!("{} *", title)
                } else {
                    title.to_string()
                };
                ui.label(title);
                ui.add_space(16.0);

                ui.menu_button("📂", |ui| {
                    for path in recent_files {
                        let file_name = path
                            .file_name()
                            .and_then(|n| n.to_str())
                            .unwrap_or("Unknown");
                        let path_str = path.to_string_lossy();
                        if ui
                            .button(file_name)
                            .on_hover_text(path_str.as_ref())
                            .clicked()
                        {
                            action = Some(TitleBarAction::OpenFile(path.clone()));
                            ui.close();
                        }
                    }
                    if !recent_files.is_empty() {
                        ui.separator();
                    }
                    if ui.button("Open File...").clicked() {
                        action = Some(TitleBarAction::Open);
                        ui.close();
                    }
                })
                .response
                .on_hover_text("Open");

                if ui
                    .add_enabled(has_current_file, egui::Button::new("💾"))
                    .on_hover_text("Save (Ctrl+S)")
                    .on_disabled_hover_text("No file opened")
                    .clicked()
                {
                    action = Some(TitleBarAction::Save);
                }
                if ui
                    .add_enabled(has_current_file, egui::Button::new("⟳"))
                    .on_hover_text("Reload committed version")
                    .clicked()
                {
                    action = Some(TitleBarAction::Refresh);
                }
            });

            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                ui.label(RichText::new(format_summary(summary)).small().monospace());
                if let Some(status) = status {
                    ui.add_space(16.0);
                    ui.label(RichText::new(status).small());
                }
            });
        });

        action
    }
}

/// `+added ~modified -removed`
fn format_summary(summary: ChangeSummary) -> String {
    format!(
        "+{} ~{} -{}",
        summary.added, summary.modified, summary.removed
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_summary() {
        let summary = ChangeSummary {
            added: 3,
            modified: 1,
            removed: 0,
        };
        assert_eq!(format_summary(summary), "+3 ~1 -0");
        assert_eq!(format_summary(ChangeSummary::default()), "+0 ~0 -0");
    }
}
