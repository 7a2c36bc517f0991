//! Choice presentation
//!
//! The orchestrator only needs "show these choices, return the picked
//! index". [`TerminalMenu`] does that on stdin/stdout, [`ScriptedMenu`]
//! replays a fixed list of picks.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin};

use crate::common::{Error, Result};

use super::actions::ActionInfo;

/// Presents the action list and returns the operator's pick
#[async_trait]
pub trait Menu: Send {
    /// Returns `Ok(None)` when the operator cancels the menu.
    async fn choose(
        &mut self,
        prompt: &str,
        choices: &[ActionInfo],
        initial: usize,
    ) -> Result<Option<usize>>;
}

/// Prompt line shown above the choices
pub fn prompt_text(reason: Option<&str>) -> String {
    match reason {
        Some(reason) => format!("Run paused on {}", reason),
        None => "Run paused".to_string(),
    }
}

/// Parsed operator input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Pick(usize),
    Cancel,
    Invalid,
}

/// Interpret one input line. Choices are numbered from 1 on screen; an
/// empty line takes the highlighted default.
pub fn parse_selection(line: &str, initial: usize, count: usize) -> Selection {
    let line = line.trim();
    if line.is_empty() {
        return Selection::Pick(initial);
    }
    if line.eq_ignore_ascii_case("q") || line.eq_ignore_ascii_case("esc") || line == "\u{1b}" {
        return Selection::Cancel;
    }
    match line.parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Selection::Pick(n - 1),
        _ => Selection::Invalid,
    }
}

/// Line-based menu on the terminal
pub struct TerminalMenu {
    input: BufReader<Stdin>,
}

impl TerminalMenu {
    pub fn new() -> Self {
        Self {
            input: BufReader::new(tokio::io::stdin()),
        }
    }

    fn render(prompt: &str, choices: &[ActionInfo], initial: usize) -> String {
        let mut out = format!("\n{} {}\n", "?".cyan().bold(), prompt.bold());
        for choice in choices {
            let number = format!("{:>2})", choice.index + 1);
            if choice.index == initial {
                out.push_str(&format!("{} {} {}\n", "›".cyan(), number.cyan(), choice.title.cyan().underline()));
            } else {
                out.push_str(&format!("  {} {}\n", number.dimmed(), choice.title));
            }
        }
        out.push_str(&format!("{} ", "Select [Enter = highlighted, q = force abort]:".dimmed()));
        out
    }
}

impl Default for TerminalMenu {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Menu for TerminalMenu {
    async fn choose(
        &mut self,
        prompt: &str,
        choices: &[ActionInfo],
        initial: usize,
    ) -> Result<Option<usize>> {
        let mut stdout = tokio::io::stdout();
        let mut line = String::new();

        loop {
            stdout
                .write_all(Self::render(prompt, choices, initial).as_bytes())
                .await?;
            stdout.flush().await?;

            line.clear();
            if self.input.read_line(&mut line).await? == 0 {
                // stdin closed
                return Ok(None);
            }

            match parse_selection(&line, initial, choices.len()) {
                Selection::Pick(index) => return Ok(Some(index)),
                Selection::Cancel => return Ok(None),
                Selection::Invalid => {
                    stdout
                        .write_all(format!("{}\n", "Invalid choice".red()).as_bytes())
                        .await?;
                }
            }
        }
    }
}

/// One presentation seen by a [`ScriptedMenu`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presentation {
    pub prompt: String,
    pub initial: usize,
    pub choices: usize,
}

/// Menu that replays a fixed list of picks
///
/// Every presentation is recorded; [`ScriptedMenu::log`] hands out a shared
/// view of that record. Once the picks run out the menu fails, which makes
/// the orchestrator resume the run.
pub struct ScriptedMenu {
    picks: VecDeque<usize>,
    log: Arc<Mutex<Vec<Presentation>>>,
}

impl ScriptedMenu {
    pub fn new(picks: impl IntoIterator<Item = usize>) -> Self {
        Self {
            picks: picks.into_iter().collect(),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared record of presentations
    pub fn log(&self) -> Arc<Mutex<Vec<Presentation>>> {
        Arc::clone(&self.log)
    }
}

#[async_trait]
impl Menu for ScriptedMenu {
    async fn choose(
        &mut self,
        prompt: &str,
        choices: &[ActionInfo],
        initial: usize,
    ) -> Result<Option<usize>> {
        self.log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Presentation {
                prompt: prompt.to_string(),
                initial,
                choices: choices.len(),
            });

        let pick = self
            .picks
            .pop_front()
            .ok_or_else(|| Error::Menu("scripted selections exhausted".to_string()))?;
        tracing::debug!(pick, prompt, "Scripted menu selection");
        Ok(Some(pick))
    }
}
