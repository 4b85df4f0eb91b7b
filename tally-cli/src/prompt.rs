//! Terminal operator prompts.

use anyhow::{Context, Result};
use rustyline::Editor;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use tally_categorize::{EscalationPort, FALLBACK_MODEL, Reply, recommended_model};
use tracing::warn;

/// Line editor on the controlling terminal. Ctrl-C and Ctrl-D at a prompt
/// come back as [`Reply::Interrupted`] instead of killing the run.
pub struct TerminalPort {
    rl: Editor<(), DefaultHistory>,
}

impl TerminalPort {
    pub fn new() -> Result<Self> {
        let rl = Editor::<(), DefaultHistory>::new().context("open terminal line editor")?;
        Ok(Self { rl })
    }
}

impl EscalationPort for TerminalPort {
    fn show(&mut self, text: &str) {
        println!("{text}");
    }

    fn ask(&mut self, prompt: &str) -> Reply {
        match self.rl.readline(prompt) {
            Ok(line) => Reply::Line(line),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Reply::Interrupted,
            Err(e) => {
                warn!(error = %e, "could not read operator input");
                Reply::Interrupted
            }
        }
    }
}

/// Numbered model menu. Enter takes the recommendation; an interruption
/// falls back to the default model.
pub fn select_model<P: EscalationPort + ?Sized>(port: &mut P, models: &[String]) -> String {
    let Some(recommended) = recommended_model(models) else {
        port.show(&format!(
            "No models installed. Install one first, e.g.: ollama pull {FALLBACK_MODEL}"
        ));
        return FALLBACK_MODEL.to_string();
    };

    let mut menu = String::from("\nAvailable models:");
    for (i, m) in models.iter().enumerate() {
        menu.push_str(&format!("\n   {}. {}", i + 1, m));
    }
    menu.push_str(&format!("\n\nRecommended: {recommended}"));
    port.show(&menu);

    loop {
        let prompt = format!(
            "Select model (1-{}) or press Enter for the recommended one: ",
            models.len()
        );
        let input = match port.ask(&prompt) {
            Reply::Line(s) => s.trim().to_string(),
            Reply::Interrupted => {
                port.show(&format!("Using default model: {FALLBACK_MODEL}"));
                return FALLBACK_MODEL.to_string();
            }
        };
        if input.is_empty() {
            port.show(&format!("Using: {recommended}"));
            return recommended.to_string();
        }
        match input.parse::<usize>() {
            Ok(n) if (1..=models.len()).contains(&n) => {
                let chosen = models[n - 1].clone();
                port.show(&format!("Selected: {chosen}"));
                return chosen;
            }
            Ok(_) => port.show(&format!("Please enter a number between 1 and {}", models.len())),
            Err(_) => port.show("Please enter a valid number"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct Script(VecDeque<&'static str>);

    impl EscalationPort for Script {
        fn show(&mut self, _text: &str) {}

        fn ask(&mut self, _prompt: &str) -> Reply {
            match self.0.pop_front() {
                Some(s) => Reply::Line(s.to_string()),
                None => Reply::Interrupted,
            }
        }
    }

    fn models() -> Vec<String> {
        vec!["mistral:7b".to_string(), "llama3.2:latest".to_string()]
    }

    #[test]
    fn test_enter_takes_recommendation() {
        let mut port = Script(VecDeque::from(vec![""]));
        assert_eq!(select_model(&mut port, &models()), "llama3.2:latest");
    }

    #[test]
    fn test_bad_input_reprompts() {
        let mut port = Script(VecDeque::from(vec!["7", "abc", "1"]));
        assert_eq!(select_model(&mut port, &models()), "mistral:7b");
    }

    #[test]
    fn test_interrupt_uses_default_model() {
        let mut port = Script(VecDeque::new());
        assert_eq!(select_model(&mut port, &models()), FALLBACK_MODEL);
    }

    #[test]
    fn test_no_models_uses_default_model() {
        let mut port = Script(VecDeque::new());
        assert_eq!(select_model(&mut port, &[]), FALLBACK_MODEL);
    }
}
