//! Terminal output for the reader CLI.
//!
//! Colors are used only when stdout is a terminal and `NO_COLOR` is unset.

use crate::models::Book;
use std::io::{self, IsTerminal};

/// ANSI styles used by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Bold,
    Dim,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
}

impl Style {
    fn sgr(self) -> u8 {
        match self {
            Style::Bold => 1,
            Style::Dim => 2,
            Style::Red => 31,
            Style::Green => 32,
            Style::Yellow => 33,
            Style::Blue => 34,
            Style::Magenta => 35,
            Style::Cyan => 36,
        }
    }
}

const RESET: &str = "\x1b[0m";

/// Writes status lines and formats reader output.
#[derive(Debug)]
pub struct Console {
    colors: bool,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    pub fn new() -> Self {
        let colors = std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal();
        Self { colors }
    }

    pub fn with_colors(colors: bool) -> Self {
        Self { colors }
    }

    /// Wraps text in ANSI codes when colors are on.
    pub fn paint(&self, text: &str, styles: &[Style]) -> String {
        if !self.colors || styles.is_empty() {
            return text.to_string();
        }

        let codes = styles
            .iter()
            .map(|s| s.sgr().to_string())
            .collect::<Vec<_>>()
            .join(";");
        format!("\x1b[{}m{}{}", codes, text, RESET)
    }

    /// A bracketed status tag such as `[OK]`.
    pub fn tag(&self, name: &str, color: Style) -> String {
        format!("[{}]", self.paint(name, &[color, Style::Bold]))
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", self.tag("INFO", Style::Blue), message);
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", self.tag("OK", Style::Green), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", self.tag("WARN", Style::Yellow), message);
    }

    /// Errors go to stderr.
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", self.tag("ERROR", Style::Red), message);
    }

    pub fn step(&self, message: &str) {
        println!("{} {}", self.tag("..", Style::Cyan), message);
    }

    /// Prints a blank line and a bold heading.
    pub fn section(&self, title: &str) {
        println!();
        println!("{}", self.paint(title, &[Style::Magenta, Style::Bold]));
    }

    pub fn muted(&self, text: &str) -> String {
        self.paint(text, &[Style::Dim])
    }

    pub fn count(&self, n: usize) -> String {
        self.paint(&n.to_string(), &[Style::Green, Style::Bold])
    }

    /// Reading percentage rounded to a whole number, e.g. `12%`.
    pub fn percent(&self, value: f64) -> String {
        self.paint(&format!("{:.0}%", value), &[Style::Yellow])
    }

    /// Heading shown above chapter text, e.g. `[3/46] Chapter 3`.
    pub fn chapter_heading(&self, position: &str, title: &str) -> String {
        format!(
            "{} {}",
            self.paint(&format!("[{}]", position), &[Style::Cyan, Style::Bold]),
            self.paint(title, &[Style::Bold])
        )
    }

    /// One bookshelf line: title, author, progress and id.
    pub fn book_entry(&self, book: &Book) -> String {
        let marker = if book.has_unread { "*" } else { " " };
        format!(
            "{} {} - {}  {} of {} chapters  {}",
            marker,
            self.paint(&book.title, &[Style::Bold]),
            book.author,
            self.percent(book.progress_percentage()),
            book.total_chapters,
            self.muted(&book.book_id)
        )
    }
}
