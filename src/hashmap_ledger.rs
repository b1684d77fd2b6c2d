use std::collections::{hash_map::Entry, HashMap, HashSet};
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;

use crate::ledger::{round_cents, Ledger, LedgerError, Person, Transaction};

/// In-memory implementation of a ledger which records transactions and
/// tracks party balances
pub(crate) struct HashMapLedger {
    people: Vec<Person>,
    people_by_name: HashMap<String, usize>,
    transactions: Vec<Transaction>,
    imported_files: HashSet<PathBuf>,
}

impl HashMapLedger {
    pub fn new() -> HashMapLedger {
        HashMapLedger {
            people: Vec::new(),
            people_by_name: HashMap::new(),
            transactions: Vec::new(),
            imported_files: HashSet::new(),
        }
    }

    /// Index of the party called `name`, registering it if it's new.
    fn register(&mut self, name: &str) -> usize {
        match self.people_by_name.entry(name.to_string()) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                self.people.push(Person::new(name));
                *entry.insert(self.people.len() - 1)
            }
        }
    }

    /// Balance of `name`, zero for a party that hasn't been seen yet.
    fn current_balance(&self, name: &str) -> Decimal {
        self.person(name).map(|person| person.balance).unwrap_or_default()
    }

    fn person(&self, name: &str) -> Result<&Person, LedgerError> {
        self.people_by_name
            .get(name)
            .map(|&index| &self.people[index])
            .ok_or_else(|| LedgerError::NotFound(name.to_string()))
    }
}

impl Ledger for HashMapLedger {
    fn apply(&mut self, transaction: Transaction) -> Result<(), LedgerError> {
        let overflow = || LedgerError::Overflow {
            origin: transaction.origin.clone(),
            to: transaction.to.clone(),
            amount: transaction.amount,
        };

        // Both new balances are worked out before anything is registered.
        let debited = self
            .current_balance(&transaction.origin)
            .checked_sub(transaction.amount)
            .map(round_cents)
            .ok_or_else(overflow)?;
        let credit_base = if transaction.to == transaction.origin {
            debited
        } else {
            self.current_balance(&transaction.to)
        };
        let credited = credit_base
            .checked_add(transaction.amount)
            .map(round_cents)
            .ok_or_else(overflow)?;

        let index = self.transactions.len();
        let origin = self.register(&transaction.origin);
        let to = self.register(&transaction.to);

        self.people[origin].balance = debited;
        self.people[to].balance = credited;

        // A self-transfer shows up once in the party's history.
        self.people[origin].history.push(index);
        if to != origin {
            self.people[to].history.push(index);
        }

        self.transactions.push(transaction);
        Ok(())
    }

    fn balance_of(&self, name: &str) -> Result<Decimal, LedgerError> {
        self.person(name).map(|person| person.balance)
    }

    fn history_of(&self, name: &str) -> Result<Vec<&Transaction>, LedgerError> {
        let person = self.person(name)?;
        Ok(person
            .history
            .iter()
            .map(|&index| &self.transactions[index])
            .collect())
    }

    fn all_balances(&self) -> Vec<(&str, Decimal)> {
        self.people
            .iter()
            .map(|person| (person.name.as_str(), person.balance))
            .collect()
    }

    fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    fn is_imported(&self, path: &Path) -> bool {
        self.imported_files.contains(path)
    }

    fn mark_imported(&mut self, path: PathBuf) {
        self.imported_files.insert(path);
    }

    fn reconcile(&self) -> Result<(), LedgerError> {
        let mut derived: HashMap<&str, Decimal> = HashMap::new();
        for transaction in &self.transactions {
            let overflow = || LedgerError::Overflow {
                origin: transaction.origin.clone(),
                to: transaction.to.clone(),
                amount: transaction.amount,
            };
            let debit = derived.entry(transaction.origin.as_str()).or_default();
            *debit = debit.checked_sub(transaction.amount).ok_or_else(overflow)?;
            let credit = derived.entry(transaction.to.as_str()).or_default();
            *credit = credit.checked_add(transaction.amount).ok_or_else(overflow)?;
        }

        for person in &self.people {
            let expected = round_cents(derived.get(person.name.as_str()).copied().unwrap_or_default());
            if expected != person.balance {
                return Err(LedgerError::Unreconciled {
                    name: person.name.clone(),
                    recorded: person.balance,
                    derived: expected,
                });
            }
        }

        Ok(())
    }
}
