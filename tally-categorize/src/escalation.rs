//! Human-in-the-loop resolution for low-confidence classifications.
//!
//! The controller only decides; it never touches the rules file. What the
//! operator asked to persist comes back in [`Escalation`] and the categorizer
//! acts on it once the whole exchange has completed without interruption.

use std::path::Path;
use tally_core::{CUSTOM_DESCRIPTION, CategorySet, Transaction};

/// One line of operator input, or the operator aborting the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Line(String),
    Interrupted,
}

/// Blocking operator channel.
pub trait EscalationPort {
    /// Display text to the operator.
    fn show(&mut self, text: &str);

    /// Ask a question and wait for the answer.
    fn ask(&mut self, prompt: &str) -> Reply;
}

impl<P: EscalationPort + ?Sized> EscalationPort for Box<P> {
    fn show(&mut self, text: &str) {
        (**self).show(text)
    }

    fn ask(&mut self, prompt: &str) -> Reply {
        (**self).ask(prompt)
    }
}

impl<P: EscalationPort + ?Sized> EscalationPort for &mut P {
    fn show(&mut self, text: &str) {
        (**self).show(text)
    }

    fn ask(&mut self, prompt: &str) -> Reply {
        (**self).ask(prompt)
    }
}

/// Headless port: every question gets an empty answer, which accepts the
/// suggestion and declines every yes/no offer.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoAccept;

impl EscalationPort for AutoAccept {
    fn show(&mut self, _text: &str) {}

    fn ask(&mut self, _prompt: &str) -> Reply {
        Reply::Line(String::new())
    }
}

/// How the operator got to the final category
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    AcceptSuggestion,
    SelectExisting,
    EnterCustom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Escalation {
    pub category: String,
    pub choice: Choice,
    /// Description the operator asked to write to the rules file
    pub description_to_save: Option<String>,
    /// Operator opted into learning a rule for this title
    pub learn_rule: bool,
    /// Input was aborted; `category` is the suggestion and nothing persists
    pub interrupted: bool,
}

impl Escalation {
    fn accepted(suggestion: &str) -> Self {
        Self {
            category: suggestion.to_string(),
            choice: Choice::AcceptSuggestion,
            description_to_save: None,
            learn_rule: false,
            interrupted: false,
        }
    }

    fn interrupted(suggestion: &str) -> Self {
        Self {
            interrupted: true,
            ..Self::accepted(suggestion)
        }
    }
}

/// Outcome of the final "write this rule?" question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirm {
    Yes,
    No,
    Interrupted,
}

enum Menu {
    Accept,
    Pick(usize),
    Custom,
    Named(String),
    OutOfRange,
}

fn read_menu(input: &str, len: usize) -> Menu {
    if input.is_empty() {
        return Menu::Accept;
    }
    let digits = input.strip_prefix(['+', '-']).unwrap_or(input);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Menu::Named(input.to_string());
    }
    // Anything integer-looking that is not a menu slot re-prompts, overflow
    // and negatives included.
    match input.parse::<usize>() {
        Ok(n) if (1..=len).contains(&n) => Menu::Pick(n - 1),
        Ok(n) if n == len + 1 => Menu::Custom,
        _ => Menu::OutOfRange,
    }
}

fn is_yes(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

/// Ask the operator to settle `txn`'s category.
///
/// New custom categories are appended to `categories` for the rest of the
/// session, even when the exchange is later interrupted.
pub fn resolve<P>(
    port: &mut P,
    categories: &mut CategorySet,
    txn: &Transaction,
    suggestion: &str,
    confidence: f64,
) -> Escalation
where
    P: EscalationPort + ?Sized,
{
    port.show(&format!(
        "\nLow confidence categorization for:\n   Transaction: {}\n   Location: {}\n   Amount: ${:.2}\n   Suggestion: {} (confidence: {:.2})",
        txn.title,
        txn.location,
        txn.abs_amount(),
        suggestion,
        confidence
    ));

    let mut menu = String::from("\nAvailable categories:");
    for (i, name) in categories.names().enumerate() {
        menu.push_str(&format!("\n   {}. {} - {}", i + 1, name, categories.describe(name)));
    }
    let custom_slot = categories.len() + 1;
    menu.push_str(&format!("\n   {custom_slot}. Type custom category"));
    port.show(&menu);

    loop {
        let prompt = format!(
            "Select category (1-{custom_slot}) or press Enter to use the suggestion: "
        );
        let input = match port.ask(&prompt) {
            Reply::Line(s) => s.trim().to_string(),
            Reply::Interrupted => return Escalation::interrupted(suggestion),
        };

        match read_menu(&input, categories.len()) {
            Menu::Accept => {
                port.show(&format!("Using suggestion: {suggestion}"));
                return Escalation::accepted(suggestion);
            }
            Menu::Pick(idx) => {
                let Some(selected) = categories.get(idx).map(|c| c.name.clone()) else {
                    continue;
                };
                port.show(&format!("Selected: {selected}"));
                return match ask_learn(port, &txn.title, &selected) {
                    Some(learn_rule) => Escalation {
                        category: selected,
                        choice: Choice::SelectExisting,
                        description_to_save: None,
                        learn_rule,
                        interrupted: false,
                    },
                    None => Escalation::interrupted(suggestion),
                };
            }
            Menu::Custom => {
                let name = match port.ask("Enter custom category name: ") {
                    Reply::Line(s) => s.trim().to_string(),
                    Reply::Interrupted => return Escalation::interrupted(suggestion),
                };
                if name.is_empty() {
                    port.show("Category name cannot be empty");
                    continue;
                }
                return custom_category(port, categories, txn, suggestion, name);
            }
            Menu::Named(name) => {
                return custom_category(port, categories, txn, suggestion, name);
            }
            Menu::OutOfRange => {
                port.show(&format!("Please enter a number between 1 and {custom_slot}"));
            }
        }
    }
}

fn custom_category<P>(
    port: &mut P,
    categories: &mut CategorySet,
    txn: &Transaction,
    suggestion: &str,
    name: String,
) -> Escalation
where
    P: EscalationPort + ?Sized,
{
    port.show(&format!("Selected custom category: {name}"));

    let mut description_to_save = None;
    if categories.push_session(&name) && !categories.has_description(&name) {
        let description = match port.ask(&format!("Enter description for '{name}' (optional): ")) {
            Reply::Line(s) => s.trim().to_string(),
            Reply::Interrupted => return Escalation::interrupted(suggestion),
        };
        if description.is_empty() {
            categories.set_description(&name, CUSTOM_DESCRIPTION);
        } else {
            categories.set_description(&name, &description);
            match port.ask("Save this description to the rules file? (y/N): ") {
                Reply::Line(s) if is_yes(&s) => description_to_save = Some(description),
                Reply::Line(_) => {}
                Reply::Interrupted => return Escalation::interrupted(suggestion),
            }
        }
    }

    match ask_learn(port, &txn.title, &name) {
        Some(learn_rule) => Escalation {
            category: name,
            choice: Choice::EnterCustom,
            description_to_save,
            learn_rule,
            interrupted: false,
        },
        None => Escalation::interrupted(suggestion),
    }
}

/// None when interrupted.
fn ask_learn<P>(port: &mut P, title: &str, category: &str) -> Option<bool>
where
    P: EscalationPort + ?Sized,
{
    match port.ask(&format!("Add '{title}' -> '{category}' as a rule? (y/N): ")) {
        Reply::Line(s) => Some(is_yes(&s)),
        Reply::Interrupted => None,
    }
}

/// Show the generalized rule and ask before writing it. Defaults to yes.
pub fn confirm_rule<P>(port: &mut P, pattern: &str, category: &str, rules_file: &Path) -> Confirm
where
    P: EscalationPort + ?Sized,
{
    port.show(&format!(
        "\nSuggested rule for future transactions:\n   {pattern} -> {category}"
    ));
    let name = rules_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| rules_file.display().to_string());
    match port.ask(&format!("Add this rule to {name}? (Y/n): ")) {
        Reply::Line(s) if s.trim().eq_ignore_ascii_case("n") => Confirm::No,
        Reply::Line(_) => Confirm::Yes,
        Reply::Interrupted => Confirm::Interrupted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use tally_core::CategoryOrigin;

    /// Replays canned replies; an exhausted script reads as an interruption.
    struct Script {
        replies: VecDeque<Reply>,
        shown: Vec<String>,
        asked: Vec<String>,
    }

    impl Script {
        fn new(lines: &[&str]) -> Self {
            Self {
                replies: lines.iter().map(|l| Reply::Line(l.to_string())).collect(),
                shown: vec![],
                asked: vec![],
            }
        }
    }

    impl EscalationPort for Script {
        fn show(&mut self, text: &str) {
            self.shown.push(text.to_string());
        }

        fn ask(&mut self, prompt: &str) -> Reply {
            self.asked.push(prompt.to_string());
            self.replies.pop_front().unwrap_or(Reply::Interrupted)
        }
    }

    fn txn() -> Transaction {
        Transaction::new("t1", "ZARA #1234", "TORONTO ON", -59.99, None)
    }

    fn set() -> CategorySet {
        CategorySet::from_rule_targets([])
    }

    #[test]
    fn test_empty_input_accepts_suggestion() {
        let mut port = Script::new(&[""]);
        let mut cats = set();
        let e = resolve(&mut port, &mut cats, &txn(), "Clothing", 0.4);
        assert_eq!(e, Escalation::accepted("Clothing"));
        assert_eq!(port.asked.len(), 1);
    }

    #[test]
    fn test_menu_lists_every_category_plus_custom() {
        let mut port = Script::new(&[""]);
        let mut cats = set();
        resolve(&mut port, &mut cats, &txn(), "Clothing", 0.4);
        let menu = &port.shown[1];
        assert!(menu.contains("1. Partying - Alcohol purchases"));
        assert!(menu.contains("11. Vanity"));
        assert!(menu.contains("12. Type custom category"));
        assert!(port.shown[0].contains("Amount: $59.99"));
    }

    #[test]
    fn test_pick_existing_with_rule() {
        let mut port = Script::new(&["8", "y"]);
        let mut cats = set();
        let e = resolve(&mut port, &mut cats, &txn(), "Misc", 0.3);
        assert_eq!(e.category, "Clothing");
        assert_eq!(e.choice, Choice::SelectExisting);
        assert!(e.learn_rule);
        assert!(!e.interrupted);
    }

    #[test]
    fn test_out_of_range_reprompts() {
        let mut port = Script::new(&["0", "99", "1", ""]);
        let mut cats = set();
        let e = resolve(&mut port, &mut cats, &txn(), "Misc", 0.3);
        assert_eq!(e.category, "Partying");
        assert!(!e.learn_rule);
        assert_eq!(
            port.shown
                .iter()
                .filter(|s| s.starts_with("Please enter a number"))
                .count(),
            2
        );
    }

    #[test]
    fn test_overflowing_number_reprompts() {
        let mut port = Script::new(&["99999999999999999999", "-3", ""]);
        let mut cats = set();
        let e = resolve(&mut port, &mut cats, &txn(), "Misc", 0.3);
        assert_eq!(e.category, "Misc");
        assert_eq!(e.choice, Choice::AcceptSuggestion);
        assert_eq!(cats.len(), 11);
        assert_eq!(
            port.shown
                .iter()
                .filter(|s| s.starts_with("Please enter a number"))
                .count(),
            2
        );
    }

    #[test]
    fn test_custom_slot_empty_name_reprompts() {
        let mut port = Script::new(&["12", "  ", "12", "Pets", "Vet and food", "y", "n"]);
        let mut cats = set();
        let e = resolve(&mut port, &mut cats, &txn(), "Misc", 0.3);
        assert_eq!(e.category, "Pets");
        assert_eq!(e.choice, Choice::EnterCustom);
        assert_eq!(e.description_to_save.as_deref(), Some("Vet and food"));
        assert!(!e.learn_rule);
        assert_eq!(cats.len(), 12);
        assert_eq!(cats.find("Pets").unwrap().origin, CategoryOrigin::SessionOnly);
        assert_eq!(cats.describe("Pets"), "Vet and food");
    }

    /// Free text goes down the custom path directly.
    #[test]
    fn test_free_text_is_custom_category() {
        let mut port = Script::new(&["Books", "", "y"]);
        let mut cats = set();
        let e = resolve(&mut port, &mut cats, &txn(), "Misc", 0.3);
        assert_eq!(e.category, "Books");
        assert_eq!(e.description_to_save, None);
        assert!(e.learn_rule);
        assert_eq!(cats.describe("Books"), CUSTOM_DESCRIPTION);
        assert!(cats.has_description("Books"));
    }

    #[test]
    fn test_free_text_existing_category_skips_description() {
        let mut port = Script::new(&["Cafe", "n"]);
        let mut cats = set();
        let e = resolve(&mut port, &mut cats, &txn(), "Misc", 0.3);
        assert_eq!(e.category, "Cafe");
        assert_eq!(cats.len(), 11);
        assert_eq!(port.asked.len(), 2);
    }

    #[test]
    fn test_interrupt_returns_suggestion() {
        let mut port = Script::new(&[]);
        let mut cats = set();
        let e = resolve(&mut port, &mut cats, &txn(), "Clothing", 0.2);
        assert!(e.interrupted);
        assert_eq!(e.category, "Clothing");
        assert!(!e.learn_rule);
    }

    /// Aborting at the last question drops everything asked for before it.
    #[test]
    fn test_interrupt_at_rule_question_persists_nothing() {
        let mut port = Script::new(&["Pets", "Vet", "y"]);
        let mut cats = set();
        let e = resolve(&mut port, &mut cats, &txn(), "Misc", 0.2);
        assert!(e.interrupted);
        assert_eq!(e.category, "Misc");
        assert_eq!(e.description_to_save, None);
        // the session still knows the category
        assert!(cats.contains("Pets"));
    }

    #[test]
    fn test_auto_accept_takes_suggestion() {
        let mut cats = set();
        let e = resolve(&mut AutoAccept, &mut cats, &txn(), "Eating Out", 0.1);
        assert_eq!(e, Escalation::accepted("Eating Out"));
    }

    #[test]
    fn test_confirm_rule_defaults_to_yes() {
        let path = Path::new("/tmp/transaction_rules.txt");
        let mut port = Script::new(&["", "N", "yes"]);
        assert_eq!(confirm_rule(&mut port, "ZARA", "Clothing", path), Confirm::Yes);
        assert_eq!(confirm_rule(&mut port, "ZARA", "Clothing", path), Confirm::No);
        assert_eq!(confirm_rule(&mut port, "ZARA", "Clothing", path), Confirm::Yes);
        assert_eq!(confirm_rule(&mut port, "ZARA", "Clothing", path), Confirm::Interrupted);
        assert!(port.asked[0].contains("transaction_rules.txt"));
        assert!(port.shown[0].contains("ZARA -> Clothing"));
    }
}
