use std::io::{self, BufRead, Write};

use relib_core::DiffResult;
use relib_restore::Confirmer;

use crate::render::{format_action_lines, TerminalRenderer};

/// Lists the pending actions and asks for a yes on stdin.
pub(crate) struct StdinConfirmer {
    renderer: TerminalRenderer,
}

impl StdinConfirmer {
    pub(crate) fn new(renderer: TerminalRenderer) -> Self {
        Self { renderer }
    }
}

impl Confirmer for StdinConfirmer {
    fn confirm(&self, actions: &DiffResult) -> bool {
        self.renderer.print_section("pending actions");
        self.renderer
            .print_lines(&format_action_lines(actions, self.renderer.style()));

        print!("Do you want to proceed? [y/N] ");
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => is_affirmative(&answer),
            Err(_) => false,
        }
    }
}

pub(crate) fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
