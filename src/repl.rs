use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use rust_decimal::Decimal;
use tracing::warn;

use crate::ledger::{Ledger, LedgerError};
use crate::loader::FileLoader;

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Command {
    ListAll,
    ListTransactions(String),
    Balance(String),
    Import(PathBuf),
    Quit,
    /// A known command given without its argument.
    Usage(&'static str),
    Unknown(String),
    Empty,
}

impl Command {
    /// Everything after the command word is its argument, so party names and
    /// paths may contain spaces.
    pub fn parse(line: &str) -> Command {
        let line = line.trim();
        let (word, argument) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match (word, argument) {
            ("", _) => Command::Empty,
            ("listAll", "") => Command::ListAll,
            ("listTransactions", "") => Command::Usage("listTransactions <name>"),
            ("listTransactions", name) => Command::ListTransactions(name.to_string()),
            ("balance", "") => Command::Usage("balance <name>"),
            ("balance", name) => Command::Balance(name.to_string()),
            ("import", "") => Command::Usage("import <path>"),
            ("import", path) => Command::Import(PathBuf::from(path)),
            ("quit" | "q", "") => Command::Quit,
            _ => Command::Unknown(line.to_string()),
        }
    }
}

/// Line-oriented command loop over a ledger.
pub(crate) struct Repl<'a, L> {
    ledger: &'a mut L,
    loader: &'a FileLoader,
}

impl<'a, L: Ledger> Repl<'a, L> {
    pub fn new(ledger: &'a mut L, loader: &'a FileLoader) -> Repl<'a, L> {
        Repl { ledger, loader }
    }

    /// Reads commands until `quit` or end of input.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, out: &mut W) -> io::Result<()> {
        prompt(out)?;
        for line in input.lines() {
            if !self.execute(Command::parse(&line?), out)? {
                return Ok(());
            }
            prompt(out)?;
        }
        writeln!(out)
    }

    /// Runs one command. Returns `false` once the session should end.
    pub fn execute<W: Write>(&mut self, command: Command, out: &mut W) -> io::Result<bool> {
        match command {
            Command::ListAll => {
                for (name, balance) in self.ledger.all_balances() {
                    writeln!(out, "{}", describe_balance(name, balance))?;
                }
            }
            Command::ListTransactions(name) => match self.ledger.history_of(&name) {
                Ok(history) => {
                    writeln!(out, "The following transactions were found involving '{}':", name)?;
                    for transaction in history {
                        writeln!(out, "{}", transaction)?;
                    }
                }
                Err(LedgerError::NotFound(_)) => {
                    writeln!(out, "No transactions for {} were found.", name)?;
                }
                Err(err) => writeln!(out, "{}", err)?,
            },
            Command::Balance(name) => match self.ledger.balance_of(&name) {
                Ok(balance) => writeln!(out, "{}", describe_balance(&name, balance))?,
                Err(err) => writeln!(out, "{}", capitalise(&err.to_string()))?,
            },
            Command::Import(path) => match self.loader.load(&mut *self.ledger, &path) {
                Ok(summary) => writeln!(
                    out,
                    "Imported '{}': {} accepted, {} rejected.",
                    path.display(),
                    summary.accepted,
                    summary.rejected
                )?,
                Err(err) => {
                    warn!("{}", err);
                    writeln!(out, "Import failed: {}.", err)?;
                }
            },
            Command::Quit => return Ok(false),
            Command::Usage(usage) => writeln!(out, "Usage: {}", usage)?,
            Command::Unknown(line) => writeln!(out, "Command '{}' was not found.", line)?,
            Command::Empty => {}
        }
        Ok(true)
    }
}

fn prompt<W: Write>(out: &mut W) -> io::Result<()> {
    write!(out, "> ")?;
    out.flush()
}

fn describe_balance(name: &str, balance: Decimal) -> String {
    if balance < Decimal::ZERO {
        format!("{} owes a total of {:.2}", name, -balance)
    } else {
        format!("{} is owed a total of {:.2}", name, balance)
    }
}

fn capitalise(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
