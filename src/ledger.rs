use std::{fmt, path::Path, path::PathBuf};

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// The idea of this trait is that the loader and the command loop only depend
/// on ledger behaviour, not on how parties and transactions are stored.
pub(crate) trait Ledger {
    /// Records a validated transaction, registering either party on first
    /// sight and moving `amount` from origin to recipient.
    ///
    /// A transfer that would take either balance past what a `Decimal` can
    /// hold is refused and leaves the ledger unchanged.
    fn apply(&mut self, transaction: Transaction) -> Result<(), LedgerError>;

    fn balance_of(&self, name: &str) -> Result<Decimal, LedgerError>;

    /// Transactions involving `name`, in load order.
    fn history_of(&self, name: &str) -> Result<Vec<&Transaction>, LedgerError>;

    /// Every party with its balance, in registration order.
    fn all_balances(&self) -> Vec<(&str, Decimal)>;

    fn transaction_count(&self) -> usize;

    fn is_imported(&self, path: &Path) -> bool;

    fn mark_imported(&mut self, path: PathBuf);

    /// Recomputes every balance from the transaction log and checks it against
    /// the incrementally maintained one.
    fn reconcile(&self) -> Result<(), LedgerError>;
}

#[derive(Debug, Error, PartialEq)]
pub(crate) enum LedgerError {
    #[error("no party named '{0}' was found")]
    NotFound(String),
    #[error("balance of '{name}' is {recorded} but its transactions sum to {derived}")]
    Unreconciled {
        name: String,
        recorded: Decimal,
        derived: Decimal,
    },
    #[error("moving {amount} from '{origin}' to '{to}' would overflow a balance")]
    Overflow {
        origin: String,
        to: String,
        amount: Decimal,
    },
}

#[derive(Debug)]
pub(crate) struct Person {
    pub name: String,
    pub balance: Decimal,
    /// Indexes into the transaction log.
    pub history: Vec<usize>,
}

impl Person {
    pub fn new(name: &str) -> Person {
        Person {
            name: name.to_string(),
            balance: Decimal::default(),
            history: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Transaction {
    pub date: NaiveDate,
    pub origin: String,
    pub to: String,
    pub narrative: String,
    pub amount: Decimal,
    /// File the transaction was imported from.
    pub origin_file: Option<String>,
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Date: {}, {} --> {}, Description: {}, Amount: {:.2}",
            self.date.format("%-d/%-m/%Y"),
            self.origin,
            self.to,
            self.narrative,
            self.amount
        )
    }
}

/// Rounds to 2 decimal places, halves away from zero.
pub(crate) fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
