//! # Command Parsing and Registration
//!
//! [`split`] turns an operator's input line into an argument vector with
//! shell-like quoting, and [`CommandSet`] is the registry through which the
//! manager and bridges expose callable commands. A command exists only if it
//! was explicitly registered; anything else is answered with
//! `error: '<name>' unknown command`.

use std::collections::HashMap;

use crate::error::UserError;

/// Splits a string into an argument vector.
///
/// Three layers of interpretation, applied in precedence order: a backslash
/// turns the following character into a literal (it separates nothing and
/// quotes nothing), double quotes enclose a literal run that may contain
/// blanks but must be closed, and remaining runs of non-blank characters
/// form words. Quoted and unquoted fragments that touch concatenate into a
/// single word: `a"b c"d` is the one word `ab cd`. Blanks are space and tab.
///
/// A lone trailing backslash stays a literal backslash, and `""` produces an
/// empty word. An unclosed quote fails with [`UserError::UnmatchedQuote`].
pub fn split(input: &str) -> Result<Vec<String>, UserError> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut started = false;
    let mut in_quotes = false;

    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                word.push(chars.next().unwrap_or('\\'));
                started = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                started = true;
            }
            ' ' | '\t' if !in_quotes => {
                if started {
                    words.push(std::mem::take(&mut word));
                    started = false;
                }
            }
            _ => {
                word.push(c);
                started = true;
            }
        }
    }

    if in_quotes {
        return Err(UserError::UnmatchedQuote);
    }
    if started {
        words.push(word);
    }
    Ok(words)
}

/// Renders an argument vector into a line that [`split`] parses back
/// verbatim: every word is quoted, with embedded quotes and backslashes
/// escaped.
pub fn quote<S: AsRef<str>>(words: &[S]) -> String {
    let mut out = String::new();
    for (i, word) in words.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push('"');
        for c in word.as_ref().chars() {
            if c == '"' || c == '\\' {
                out.push('\\');
            }
            out.push(c);
        }
        out.push('"');
    }
    out
}

/// The signature of a registered command: receiver, argument words, and the
/// authority string of the command event. A command may return a response
/// line for the caller.
pub type CommandFn<T> = fn(&mut T, &[String], &str) -> Result<Option<String>, UserError>;

/// A registry of the commands an object exposes, populated at construction.
pub struct CommandSet<T> {
    commands: HashMap<&'static str, CommandFn<T>>,
}

impl<T> CommandSet<T> {
    pub fn new() -> Self {
        Self { commands: HashMap::new() }
    }

    pub fn register(&mut self, name: &'static str, command: CommandFn<T>) {
        self.commands.insert(name, command);
    }

    pub fn is_command(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// The registered command names, sorted for stable presentation.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.commands.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Resolves `words[0]` and invokes it on `receiver` with the remaining
    /// words. An empty vector or an unregistered name is a [`UserError`].
    pub fn invoke(
        &self,
        receiver: &mut T,
        words: &[String],
        authority: &str,
    ) -> Result<Option<String>, UserError> {
        let (name, args) = words.split_first().ok_or(UserError::EmptyCommand)?;
        let command = self
            .commands
            .get(name.as_str())
            .ok_or_else(|| UserError::UnknownCommand(name.clone()))?;
        command(receiver, args, authority)
    }
}

// Derived Clone would demand T: Clone; the map of fn pointers never does.
impl<T> Clone for CommandSet<T> {
    fn clone(&self) -> Self {
        Self { commands: self.commands.clone() }
    }
}

impl<T> Default for CommandSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(split: &[&str]) -> Vec<String> {
        split.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn splits_escapes_quotes_and_blanks() {
        assert_eq!(
            split("Augment\\ this  \"string\"_\\\"battle\\\" ").unwrap(),
            words(&["Augment this", "string_\"battle\""]),
        );
    }

    #[test]
    fn unmatched_quote_is_rejected() {
        assert_eq!(split("\"unterminated"), Err(UserError::UnmatchedQuote));
        assert_eq!(split("a \"b c"), Err(UserError::UnmatchedQuote));
    }

    #[test]
    fn adjacent_fragments_form_one_word() {
        assert_eq!(split("a\"b c\"d").unwrap(), words(&["ab cd"]));
    }

    #[test]
    fn empty_quotes_make_an_empty_word() {
        assert_eq!(split("a \"\" b").unwrap(), words(&["a", "", "b"]));
    }

    #[test]
    fn trailing_backslash_is_literal() {
        assert_eq!(split("tail\\").unwrap(), words(&["tail\\"]));
    }

    #[test]
    fn tabs_separate_words() {
        assert_eq!(split("one\ttwo  three").unwrap(), words(&["one", "two", "three"]));
    }

    #[test]
    fn split_of_quote_is_identity() {
        let vectors: &[&[&str]] = &[
            &[],
            &["plain"],
            &["two words", "and\ttabs"],
            &["embedded \"quotes\"", "back\\slash", ""],
            &["unicode: тест", "spaced  out"],
        ];
        for vector in vectors {
            let expected = words(vector);
            assert_eq!(split(&quote(&expected)).unwrap(), expected);
        }
    }

    struct Counter {
        ticks: u32,
    }

    fn tick(counter: &mut Counter, _args: &[String], _authority: &str) -> Result<Option<String>, UserError> {
        counter.ticks += 1;
        Ok(Some(format!("{}", counter.ticks)))
    }

    #[test]
    fn registry_invokes_registered_commands_only() {
        let mut set = CommandSet::new();
        set.register("tick", tick as CommandFn<Counter>);

        let mut counter = Counter { ticks: 0 };
        assert!(set.is_command("tick"));
        assert!(!set.is_command("tock"));
        assert_eq!(set.names(), vec!["tick"]);

        let response = set.invoke(&mut counter, &words(&["tick"]), "test").unwrap();
        assert_eq!(response.as_deref(), Some("1"));

        let err = set.invoke(&mut counter, &words(&["tock"]), "test").unwrap_err();
        assert_eq!(format!("error: {}", err), "error: 'tock' unknown command");

        let err = set.invoke(&mut counter, &[], "test").unwrap_err();
        assert_eq!(err, UserError::EmptyCommand);
    }
}
