//! Append-only durable log of settled ledger mutations.
//!
//! Every committed state change is appended as one JSON line; startup replays
//! the file to rebuild the in-memory state. Only settled operations mutate
//! state on replay. Compensations after failed transfers append audit-only
//! rollback entries that replay skips.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Event, FeeRecord, TicketPurchase};

/// One committed mutation, or a rollback notice kept for audit.
///
/// `EventCreated` carries the creation fee in the same entry. The
/// registration and the fee collection commit as one journal line, so a
/// torn write drops both or neither.
///
/// The `*RolledBack` variants record compensations after failed transfers.
/// They change no state on replay; the mutation they compensate was never
/// journaled in the first place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum JournalEntry {
    EventCreated {
        event: Event,
        fee: FeeRecord,
    },
    TicketsPurchased {
        purchase: TicketPurchase,
    },
    PurchaseRolledBack {
        event_id: u64,
        purchase_id: Uuid,
        reason: String,
    },
    PurchaseRefunded {
        event_id: u64,
        purchase_id: Uuid,
    },
    RefundRolledBack {
        event_id: u64,
        purchase_id: Uuid,
        reason: String,
    },
    EventDeactivated {
        event_id: u64,
    },
}

/// Line-oriented journal file. Appends flush through to the OS before
/// returning so a committed operation survives a process crash.
pub struct Journal {
    path: PathBuf,
    writer: Mutex<LineWriter<File>>,
}

impl Journal {
    /// Opens (creating if absent) the journal at `path` for appending.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(LineWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one entry and flushes it to disk.
    pub fn append(&self, entry: &JournalEntry) -> io::Result<()> {
        let line = serde_json::to_string(entry).map_err(io::Error::from)?;
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        writeln!(writer, "{line}")?;
        writer.flush()
    }

    /// Reads back every entry recorded at `path`. A missing file means an
    /// empty ledger. A torn final line (crash mid-append) is skipped with a
    /// warning; a malformed line anywhere else is a corrupt journal and is
    /// surfaced as an error.
    pub fn replay(path: impl AsRef<Path>) -> io::Result<Vec<JournalEntry>> {
        let file = match File::open(path.as_ref()) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let lines: Vec<String> = BufReader::new(file).lines().collect::<io::Result<_>>()?;
        let mut entries = Vec::with_capacity(lines.len());
        let last = lines.len().saturating_sub(1);

        for (i, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<JournalEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) if i == last => {
                    tracing::warn!(line = i + 1, error = %e, "skipping torn final journal line");
                }
                Err(e) => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("corrupt journal line {}: {e}", i + 1),
                    ));
                }
            }
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FeePurpose, NewEvent};
    use chrono::Utc;

    fn sample_event() -> Event {
        NewEvent {
            event_id: 1,
            name: "Rust Conf".into(),
            total_tickets: 10,
            price_per_ticket: 5,
            description: "".into(),
            event_date: 1_900_000_000,
            creator: "0xcreator".into(),
        }
        .into_event(Utc::now())
    }

    #[test]
    fn append_then_replay_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.journal");

        let journal = Journal::open(&path).unwrap();
        let created = JournalEntry::EventCreated {
            event: sample_event(),
            fee: FeeRecord::new(200, "0xcreator".into(), FeePurpose::EventCreation),
        };
        let rolled_back = JournalEntry::PurchaseRolledBack {
            event_id: 1,
            purchase_id: Uuid::new_v4(),
            reason: "transfer rejected".into(),
        };
        journal.append(&created).unwrap();
        journal.append(&rolled_back).unwrap();
        drop(journal);

        let entries = Journal::replay(&path).unwrap();
        assert_eq!(entries, vec![created, rolled_back]);
    }

    #[test]
    fn missing_file_replays_empty() {
        let dir = tempfile::tempdir().unwrap();
        let entries = Journal::replay(dir.path().join("absent.journal")).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn torn_final_line_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.journal");

        let journal = Journal::open(&path).unwrap();
        journal
            .append(&JournalEntry::EventDeactivated { event_id: 7 })
            .unwrap();
        drop(journal);

        // Simulate a crash mid-append.
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        write!(file, "{{\"entry\":\"tickets_pur").unwrap();

        let entries = Journal::replay(&path).unwrap();
        assert_eq!(entries, vec![JournalEntry::EventDeactivated { event_id: 7 }]);
    }

    #[test]
    fn corrupt_interior_line_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.journal");

        let journal = Journal::open(&path).unwrap();
        {
            let mut writer = journal.writer.lock().unwrap();
            writeln!(writer, "not json").unwrap();
        }
        journal
            .append(&JournalEntry::EventDeactivated { event_id: 7 })
            .unwrap();
        drop(journal);

        assert!(Journal::replay(&path).is_err());
    }
}
