// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 The leadmarket-rs authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use leadmarket_rs::{AccountId, EntryKind, Ledger, PaymentRef, RequestId};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;

/// Credit Ledger Replay - Process ledger operation CSV files
///
/// Reads credit operations from a CSV file and outputs account states to
/// stdout. Supports purchases, spends, bonuses and refunds; purchases may
/// carry a payment reference and are then applied idempotently.
#[derive(Parser, Debug)]
#[command(name = "leadmarket-rs")]
#[command(about = "Replays credit ledger operation CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with ledger operations
    ///
    /// Expected format: op,account,amount,ref,lead
    /// Example: cargo run -- operations.csv > accounts.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

fn main() {
    let args = Args::parse();

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let ledger = match process_operations(BufReader::new(file)) {
        Ok(ledger) => ledger,
        Err(e) => {
            eprintln!("Error processing operations: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = write_accounts(&ledger, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `op, account, amount, ref, lead`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    account: u64,
    #[serde(deserialize_with = "csv::invalid_option")]
    amount: Option<u32>,
    #[serde(rename = "ref")]
    payment_ref: Option<String>,
    #[serde(deserialize_with = "csv::invalid_option")]
    lead: Option<u64>,
}

#[derive(Debug)]
enum Operation {
    Credit {
        account: AccountId,
        amount: u32,
        kind: EntryKind,
        reference: Option<PaymentRef>,
    },
    Spend {
        account: AccountId,
        amount: u32,
        lead: Option<RequestId>,
    },
}

impl CsvRecord {
    /// Converts a CSV record to a ledger operation.
    ///
    /// Returns `None` for unknown operations or missing amounts.
    fn into_operation(self) -> Option<Operation> {
        let account = AccountId(self.account);
        let amount = self.amount?;
        let reference = self.payment_ref.filter(|r| !r.is_empty()).map(PaymentRef::new);

        let kind = match self.op.to_lowercase().as_str() {
            "purchase" => EntryKind::Purchase,
            "bonus" => EntryKind::Bonus,
            "refund" => EntryKind::Refund,
            "spend" => {
                return Some(Operation::Spend {
                    account,
                    amount,
                    lead: self.lead.map(RequestId),
                });
            }
            _ => return None,
        };
        Some(Operation::Credit {
            account,
            amount,
            kind,
            reference,
        })
    }
}

/// Process ledger operations from a CSV reader.
///
/// Streaming parse; accounts are opened on first sight. Malformed rows and
/// rejected operations (overdraws, zero amounts) are skipped without
/// aborting the replay.
///
/// # CSV Format
///
/// Expected columns: `op, account, amount, ref, lead`
/// - `op`: Operation (purchase, spend, bonus, refund)
/// - `account`: Account ID (u64)
/// - `amount`: Credits (u32)
/// - `ref`: Payment reference (optional; purchases only)
/// - `lead`: Request ID the spend paid for (optional)
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
pub fn process_operations<R: Read>(reader: R) -> Result<Ledger, csv::Error> {
    let ledger = Ledger::new();

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        match result {
            Ok(record) => {
                let Some(op) = record.into_operation() else {
                    #[cfg(debug_assertions)]
                    eprintln!("Skipping invalid operation record");
                    continue;
                };

                let outcome = match op {
                    Operation::Credit {
                        account,
                        amount,
                        kind,
                        reference,
                    } => {
                        ledger.open_account(account);
                        ledger.credit(account, amount, kind, reference).map(|_| ())
                    }
                    Operation::Spend {
                        account,
                        amount,
                        lead,
                    } => {
                        ledger.open_account(account);
                        ledger.debit(account, amount, lead).map(|_| ())
                    }
                };

                if let Err(_e) = outcome {
                    #[cfg(debug_assertions)]
                    eprintln!("Skipping operation: {}", _e);
                }
            }
            Err(e) => {
                #[cfg(debug_assertions)]
                eprintln!("Skipping malformed row: {}", e);
                let _ = e;
                continue;
            }
        }
    }

    Ok(ledger)
}

/// Output row, one per account.
#[derive(Debug, Serialize)]
struct AccountRow {
    account: AccountId,
    balance: i64,
    leads_contacted: u64,
    credits_spent: u64,
    credits_purchased: u64,
}

/// Write account states to a CSV writer, ordered by account id.
///
/// Columns: `account, balance, leads_contacted, credits_spent,
/// credits_purchased`
pub fn write_accounts<W: Write>(ledger: &Ledger, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for account_id in ledger.account_ids() {
        // accounts listed by the ledger always resolve
        let balance = ledger.balance(account_id).unwrap_or(0);
        let stats = ledger.stats(account_id).unwrap_or_default();
        wtr.serialize(AccountRow {
            account: account_id,
            balance,
            leads_contacted: stats.leads_contacted,
            credits_spent: stats.credits_spent,
            credits_purchased: stats.credits_purchased,
        })?;
    }

    wtr.flush()?;
    Ok(())
}
