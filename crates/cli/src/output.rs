//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use nanny_lib::Quantity;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a rounded table
pub fn print_table<T: Tabled>(rows: Vec<T>) {
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print a value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Canonical quantity, or `-` when unset
pub fn format_quantity(quantity: Option<&Quantity>) -> String {
    quantity
        .map(|q| q.to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Color a drift flag
pub fn color_drift(drifted: bool) -> String {
    if drifted {
        "drift".red().to_string()
    } else {
        "ok".green().to_string()
    }
}
