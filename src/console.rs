//! Console surface: line input, single-keystroke action menus, and a small
//! markdown-ish renderer for terminal output.
//!
//! A menu is a finite mapping from input symbol to a tagged [`Action`],
//! resolved once per prompt — [`Menu::resolve`] is pure so the resolution
//! rules are testable without a terminal. The session talks to the [`Console`]
//! trait only; the real terminal lives in [`TerminalConsole`] and tests drive
//! the session with a scripted double.

use anyhow::Result;
use ::console::{style, Key, Term};
use once_cell::sync::Lazy;
use regex::Regex;

/// Everything a menu keystroke can mean to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    NextPage,
    PreviousPage,
    SummariseIssues,
    Return,
    Question,
    QuestionInNewConversation,
    Related,
    /// Any unmapped key, where the menu allows it.
    Default,
}

/// One `(trigger, action, description)` row of a menu.
#[derive(Debug, Clone, Copy)]
pub struct MenuEntry {
    pub trigger: char,
    pub action: Action,
    pub description: &'static str,
}

/// What a resolved keystroke selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Action(Action),
    /// A numbered pick from the listed results, zero-based.
    Pick(usize),
}

/// An ordered keystroke menu, optionally accepting numeric picks and an
/// "any other key" default.
pub struct Menu {
    entries: Vec<MenuEntry>,
    max_number: usize,
    default_text: Option<&'static str>,
}

impl Menu {
    pub fn new(entries: Vec<MenuEntry>) -> Self {
        Self {
            entries,
            max_number: 0,
            default_text: None,
        }
    }

    /// Accept `1..=count` as picks of the listed results.
    pub fn with_numbers(mut self, count: usize) -> Self {
        self.max_number = count.min(9);
        self
    }

    /// Let any unmapped key resolve to [`Action::Default`], captioned with
    /// `text` in the rendered menu.
    pub fn with_default(mut self, text: &'static str) -> Self {
        self.default_text = Some(text);
        self
    }

    pub fn default_allowed(&self) -> bool {
        self.default_text.is_some()
    }

    /// Resolve one keystroke against the menu. `None` means the key is not
    /// mapped (the caller re-reads, or falls back to the default).
    pub fn resolve(&self, key: char) -> Option<Choice> {
        if let Some(entry) = self
            .entries
            .iter()
            .find(|e| e.trigger.eq_ignore_ascii_case(&key))
        {
            return Some(Choice::Action(entry.action));
        }

        if self.max_number > 0 {
            if let Some(digit) = key.to_digit(10) {
                let digit = digit as usize;
                if (1..=self.max_number).contains(&digit) {
                    return Some(Choice::Pick(digit - 1));
                }
            }
        }

        None
    }

    /// The menu as a markdown block, one bullet per entry.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&format!(
                "* **Press {}** to {}\n",
                entry.trigger.to_ascii_uppercase(),
                entry.description
            ));
        }
        if let Some(text) = self.default_text {
            out.push_str(&format!("\nAny other key to {}\n", text));
        }
        out
    }
}

/// The session's view of the terminal.
pub trait Console {
    /// Print a prompt line, then read a full line of input.
    fn read_line(&mut self, prompt: &str) -> Result<String>;

    /// Render a menu and read keystrokes until one resolves. With a default
    /// allowed, the first keystroke always resolves.
    fn choose(&mut self, menu: &Menu) -> Result<Choice>;

    /// Render a markdown block.
    fn markdown(&mut self, text: &str);

    /// Print a plain line.
    fn line(&mut self, text: &str);
}

/// Real terminal, via the `console` crate.
pub struct TerminalConsole {
    term: Term,
}

impl TerminalConsole {
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
        }
    }

    fn read_key_char(&self) -> Result<char> {
        let key = self.term.read_key()?;
        Ok(match key {
            Key::Char(c) => c,
            Key::Enter => '\n',
            _ => '\0',
        })
    }
}

impl Default for TerminalConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for TerminalConsole {
    fn read_line(&mut self, prompt: &str) -> Result<String> {
        self.line(prompt);
        Ok(self.term.read_line()?)
    }

    fn choose(&mut self, menu: &Menu) -> Result<Choice> {
        self.markdown(&menu.render());
        if menu.default_allowed() {
            let key = self.read_key_char()?;
            return Ok(menu.resolve(key).unwrap_or(Choice::Action(Action::Default)));
        }
        loop {
            let key = self.read_key_char()?;
            if let Some(choice) = menu.resolve(key) {
                return Ok(choice);
            }
        }
    }

    fn markdown(&mut self, text: &str) {
        for line in render_markdown(text) {
            let _ = self.term.write_line(&line);
        }
    }

    fn line(&mut self, text: &str) {
        let _ = self.term.write_line(text);
    }
}

static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("bold pattern"));

/// Translate a markdown block into styled terminal lines. Headings and
/// `**bold**` spans are emphasised; bullets get a real bullet glyph.
fn render_markdown(text: &str) -> Vec<String> {
    let text = text.replace('\r', "");
    let mut lines = Vec::new();

    for raw in text.lines() {
        let trimmed = raw.trim_start();
        let line = if let Some(heading) = trimmed
            .strip_prefix("### ")
            .or_else(|| trimmed.strip_prefix("## "))
            .or_else(|| trimmed.strip_prefix("# "))
        {
            style(heading.trim()).bold().cyan().to_string()
        } else if let Some(item) = trimmed.strip_prefix("* ").or_else(|| trimmed.strip_prefix("- "))
        {
            format!("  \u{2022} {}", embolden(item))
        } else {
            embolden(raw)
        };
        lines.push(line);
    }

    lines
}

fn embolden(line: &str) -> String {
    BOLD.replace_all(line, |caps: &regex::Captures<'_>| {
        style(&caps[1]).bold().to_string()
    })
    .into_owned()
}
