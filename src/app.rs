use crate::annotation::{AnnotationSession, Waker};
use crate::baseline::{BaselineProvider, GitBaselineProvider};
use crate::config::Config;
use crate::constant::DEFAULT_WINDOW_TITLE;
use crate::saver::{SaverMessage, SaverResponse, spawn_saver};
use crate::style::configure_style;
use crate::ui::editor::Editor;
use crate::ui::gutter::Gutter;
use crate::ui::title_bar::{TitleBar, TitleBarAction, TitleBarState};
use egui::{Key, KeyboardShortcut, Modifiers};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender};
use tracing::{error, warn};

pub struct DiffGutterApp {
    config: Config,
    provider: Arc<dyn BaselineProvider>,
    editor: Editor,
    gutter: Gutter,
    session: Option<AnnotationSession>,
    current_file: Option<PathBuf>,
    dirty: bool,
    status: Option<String>,
    focused: bool,
    saver_sender: Sender<SaverMessage>,
    saver_receiver: Receiver<SaverResponse>,
}

impl DiffGutterApp {
    pub fn new(cc: &eframe::CreationContext<'_>, initial_file: Option<PathBuf>) -> Self {
        configure_style(&cc.egui_ctx);

        let config = Config::default();
        let provider: Arc<dyn BaselineProvider> = Arc::new(GitBaselineProvider::new(
            &config.settings.annotation.git_binary,
        ));
        let (saver_sender, saver_receiver) = spawn_saver();

        let app = Self {
            config,
            provider,
            editor: Editor::default(),
            gutter: Gutter::default(),
            session: None,
            current_file: None,
            dirty: false,
            status: None,
            focused: true,
            saver_sender,
            saver_receiver,
        };
        if let Some(path) = initial_file {
            app.request_open(path);
        }
        app
    }

    fn request_open(&self, path: PathBuf) {
        if let Err(e) = self.saver_sender.send(SaverMessage::Open(path)) {
            error!("Failed to send open message: {}", e);
        }
    }

    fn request_save(&self) {
        let Some(path) = self.current_file.clone() else {
            return;
        };
        let content = self.editor.content().to_string();
        if let Err(e) = self.saver_sender.send(SaverMessage::Save { path, content }) {
            error!("Failed to send save message: {}", e);
        }
    }

    fn pick_file(&self) {
        let sender = self.saver_sender.clone();
        let directory = self
            .current_file
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.data_dir());

        std::thread::spawn(move || {
            if let Some(path) = rfd::FileDialog::new().set_directory(&directory).pick_file()
                && let Err(e) = sender.send(SaverMessage::Open(path))
            {
                error!("Failed to send open message: {}", e);
            }
        });
    }

    /// Swap in a freshly loaded file and start annotating it
    fn open_loaded(&mut self, ctx: &egui::Context, path: PathBuf, content: String) {
        if let Some(mut session) = self.session.take() {
            session.on_deactivate();
        }
        self.gutter.clear();
        self.editor.set_content(content);

        let repaint = ctx.clone();
        let waker: Waker = Arc::new(move || repaint.request_repaint());
        self.session = Some(AnnotationSession::with_waker(
            &path,
            Arc::clone(&self.provider),
            &self.config.settings.annotation,
            self.gutter.consumer(),
            waker,
        ));

        self.config.add_recent_file(path.clone());
        self.current_file = Some(path);
        self.dirty = false;
        self.status = None;
    }

    fn handle_saver_responses(&mut self, ctx: &egui::Context) {
        while let Ok(response) = self.saver_receiver.try_recv() {
            match response {
                SaverResponse::Loaded { path, content } => self.open_loaded(ctx, path, content),
                SaverResponse::Saved(path) => {
                    if self.current_file.as_ref() == Some(&path) {
                        self.dirty = false;
                    }
                    self.status = Some("Saved".to_string());
                    if let Some(session) = self.session.as_mut()
                        && session.path() == path.as_path()
                    {
                        session.on_baseline_invalidated();
                    }
                }
                SaverResponse::Failed(message) => {
                    warn!("{}", message);
                    self.status = Some(message);
                }
            }
        }
    }

    fn handle_action(&mut self, action: TitleBarAction) {
        match action {
            TitleBarAction::Save => self.request_save(),
            TitleBarAction::Open => self.pick_file(),
            TitleBarAction::OpenFile(path) => self.request_open(path),
            TitleBarAction::Refresh => {
                if let Some(session) = self.session.as_mut() {
                    session.on_baseline_invalidated();
                }
            }
        }
    }

    fn title(&self) -> String {
        self.current_file
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_WINDOW_TITLE.to_string())
    }
}

impl eframe::App for DiffGutterApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_saver_responses(ctx);

        // Commits may have happened while the window was in the background
        let focused = ctx.input(|i| i.focused);
        if focused
            && !self.focused
            && let Some(session) = self.session.as_mut()
        {
            session.on_baseline_invalidated();
        }
        self.focused = focused;

        let save = KeyboardShortcut::new(Modifiers::COMMAND, Key::S);
        let open = KeyboardShortcut::new(Modifiers::COMMAND, Key::O);
        if ctx.input_mut(|i| i.consume_shortcut(&save)) {
            self.request_save();
        }
        if ctx.input_mut(|i| i.consume_shortcut(&open)) {
            self.pick_file();
        }

        let mut action = None;
        egui::TopBottomPanel::top("title_bar_panel").show(ctx, |ui| {
            let title = self.title();
            action = TitleBar::show(
                ui,
                TitleBarState {
                    title: &title,
                    dirty: self.dirty,
                    has_current_file: self.current_file.is_some(),
                    summary: self.gutter.summary(),
                    status: self.status.as_deref(),
                    recent_files: &self.config.settings.recent_files,
                },
            );
        });
        if let Some(action) = action {
            self.handle_action(action);
        }

        let mut changed = false;
        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                changed = self
                    .editor
                    .show(ui, &self.gutter, &self.config.settings.gutter);
            });
        });

        if let Some(session) = self.session.as_mut() {
            if changed {
                self.dirty = true;
                session.on_buffer_changed(self.editor.content());
            }
            if let Some(wait) = session.poll(self.editor.content()) {
                ctx.request_repaint_after(wait);
            }
        }
        if self.gutter.sync() {
            ctx.request_repaint();
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if let Some(session) = self.session.as_mut() {
            session.on_deactivate();
        }
    }
}
