//! Example annotating an edited buffer against its committed version
//!
//! Run with: cargo run --example annotate_demo

use diff_gutter::annotation::{LineClassification, annotate};
use diff_gutter::baseline::{BaselineSnapshot, split_lines};
use diff_gutter::config::Config;

const COMMITTED: &str = "\
# Shopping
milk
eggs
bread
butter
";

const EDITED: &str = "\
# Shopping
oat milk
almond milk
eggs
butter
jam
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Diff Gutter Annotation Demo ===\n");

    let baseline = BaselineSnapshot::tracked(
        split_lines(COMMITTED)
            .into_iter()
            .map(str::to_string)
            .collect(),
    );
    let map = annotate(&baseline, EDITED);

    for (idx, line) in split_lines(EDITED).into_iter().enumerate() {
        let number = idx + 1;
        let marker = match map.classification(number) {
            LineClassification::None => ' ',
            LineClassification::Added => '+',
            LineClassification::Modified => '~',
            LineClassification::Removed => '_',
        };
        println!("{:>3} {} {}", number, marker, line);
        if let Some(tooltip) = map.tooltip(number)
            && tooltip.span.start == number
        {
            for removed in tooltip.removed_text.lines() {
                println!("      - {}", removed);
            }
        }
    }

    let summary = map.summary();
    println!(
        "\n{} added, {} modified, {} removed",
        summary.added, summary.modified, summary.removed
    );

    let delay = Config::default()
        .settings
        .annotation
        .debounce_delay(split_lines(EDITED).len());
    println!("Debounce delay for this buffer: {:?}", delay);

    println!("\nAs JSON:\n{}", serde_json::to_string_pretty(&map)?);

    Ok(())
}
