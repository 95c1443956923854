//! Styled terminal output utilities.

use dbmig_migrate::{ChangeAction, SchemaStatus};
use owo_colors::OwoColorize;

/// Print a header/title
pub fn header(text: &str) {
    println!();
    println!("{}", text.bold().cyan());
    println!("{}", "─".repeat(text.chars().count()).dimmed());
    println!();
}

/// Print a section header
pub fn section(text: &str) {
    println!("{}", text.bold().white());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a success message
pub fn success(text: &str) {
    println!("{} {}", "✔".green().bold(), text.green());
}

/// Print an info message
pub fn info(text: &str) {
    println!("{} {}", "ℹ".blue().bold(), text);
}

/// Print a warning message
pub fn warn(text: &str) {
    println!("{} {}", "⚠".yellow().bold(), text.yellow());
}

/// Print an error message
pub fn error(text: &str) {
    eprintln!("{} {}", "✖".red().bold(), text.red());
}

/// Print a list item
pub fn list_item(text: &str) {
    println!("  {} {}", "•".dimmed(), text);
}

/// Print a nested list item
pub fn nested_item(text: &str) {
    println!("      {}", text);
}

/// Print a newline
pub fn newline() {
    println!();
}

/// Print dimmed text
pub fn dim(text: &str) {
    println!("{}", text.dimmed());
}

/// Style text as success (green)
pub fn style_success(text: &str) -> String {
    text.green().to_string()
}

/// Style text as pending (yellow)
pub fn style_pending(text: &str) -> String {
    text.yellow().to_string()
}

/// Style text as error (red)
pub fn style_error(text: &str) -> String {
    text.red().to_string()
}

/// Render a name with its status symbol, colored by status
pub fn status_label(status: SchemaStatus, name: &str) -> String {
    let label = format!("{:<1} {}", status.symbol(), name);
    match status {
        SchemaStatus::Actual => label,
        SchemaStatus::Created => style_success(&label),
        SchemaStatus::Removed => style_error(&label),
        SchemaStatus::Modified => style_pending(&label),
    }
}

/// Render one line change with its action symbol
pub fn change_label(action: ChangeAction, field: &str) -> String {
    let label = format!("{} {}", action.symbol(), field);
    match action {
        ChangeAction::Add => style_success(&label),
        ChangeAction::Remove => style_error(&label),
        ChangeAction::Modified => style_pending(&label),
    }
}

/// Ask for confirmation; an empty answer takes `default`
pub fn confirm(prompt: &str, default: bool) -> bool {
    use std::io::{self, Write};

    let hint = if default { "[Y/n]" } else { "[y/N]" };
    print!("{} {} ", prompt, hint.dimmed());
    io::stdout().flush().ok();

    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return default;
    }

    match input.trim().to_lowercase().as_str() {
        "" => default,
        answer => matches!(answer, "y" | "yes"),
    }
}
