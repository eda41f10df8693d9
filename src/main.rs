use clap::Parser;
use diff_gutter::annotation::annotate_file;
use diff_gutter::app::DiffGutterApp;
use diff_gutter::baseline::GitBaselineProvider;
use diff_gutter::config::Config;
use diff_gutter::constant;
use diff_gutter::ui;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "diff-gutter", version, about)]
struct Cli {
    /// File to open
    file: Option<PathBuf>,

    /// Print the annotations of FILE as JSON and exit
    #[arg(long, requires = "file")]
    print: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    if cli.print
        && let Some(path) = &cli.file
    {
        return print_annotations(path);
    }

    let options = ui::viewport::build_viewport();
    let result = eframe::run_native(
        constant::DEFAULT_WINDOW_TITLE,
        options,
        Box::new(|cc| Ok(Box::new(DiffGutterApp::new(cc, cli.file)))),
    );
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Failed to run the editor: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_annotations(path: &Path) -> ExitCode {
    let config = Config::default();
    let provider = GitBaselineProvider::new(&config.settings.annotation.git_binary);

    let buffer = match std::fs::read_to_string(path) {
        Ok(buffer) => buffer,
        Err(e) => {
            eprintln!("Failed to read {:?}: {}", path, e);
            return ExitCode::FAILURE;
        }
    };
    let map = match annotate_file(&provider, path, &buffer) {
        Ok(map) => map,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&map) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to serialize annotations: {}", e);
            ExitCode::FAILURE
        }
    }
}
