//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `notebook_core` linkage with a deterministic smoke check.
//! - Run the pure text-analysis helpers on command-line input.

use clap::Parser;
use notebook_core::analysis::{extract_zhuyin_composition, get_zhuyin_candidates};
use notebook_core::crypto::check_password_strength;

#[derive(Debug, Parser)]
#[command(name = "notebook", version, about = "Notebook engine smoke check")]
struct Cli {
    /// Rate a password and print suggestions.
    #[arg(long, value_name = "PASSWORD")]
    password: Option<String>,

    /// Text to analyze: character composition and trailing Zhuyin input.
    #[arg(value_name = "TEXT")]
    text: Vec<String>,
}

fn main() {
    let cli = Cli::parse();

    println!("notebook_core ping={}", notebook_core::ping());
    println!("notebook_core version={}", notebook_core::core_version());

    if let Some(password) = cli.password.as_deref() {
        rate_password(password);
    }
    for text in &cli.text {
        describe(text);
    }
}

fn rate_password(password: &str) {
    let strength = check_password_strength(password);
    println!("password level={:?}", strength.level);
    for suggestion in strength.suggestions {
        println!("  suggestion={suggestion}");
    }
}

fn describe(text: &str) {
    let stats = notebook_core::analyze_composition(text);
    println!(
        "text={:?} total={} chinese={} english={} number={} other={} chinese_ratio={:.3} words={}",
        text,
        stats.total_characters,
        stats.chinese_characters,
        stats.english_characters,
        stats.number_characters,
        stats.other_characters,
        stats.chinese_ratio,
        stats.word_count
    );

    let composition = extract_zhuyin_composition(text);
    if !composition.is_empty() {
        println!(
            "  zhuyin={} candidates={}",
            composition,
            get_zhuyin_candidates(&composition).join(",")
        );
    }
}
