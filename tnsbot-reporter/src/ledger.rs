//! Local record of sources already reported to the registry
//!
//! A CSV table whose `ZTF_names` column holds the identifiers. New files get
//! that single column; existing files may carry extra columns (a leading
//! index column, say) and appended rows follow their layout. A missing file
//! is an empty ledger. Appends are flushed and synced before returning. There
//! is no locking: one process at a time is assumed to own the file.

use async_trait::async_trait;
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tnsbot_common::models::Source;
use tnsbot_common::{Error, Result};

use crate::services::{Existence, KnownSourceCheck};

/// Header of the identifier column
pub const LEDGER_COLUMN: &str = "ZTF_names";

/// Position of the identifier column and number of columns per row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    column: usize,
    width: usize,
}

impl Default for Layout {
    fn default() -> Self {
        Self { column: 0, width: 1 }
    }
}

impl Layout {
    /// A row with `source_id` in the identifier column and blanks elsewhere
    fn row<'a>(&self, source_id: &'a str) -> Vec<&'a str> {
        let mut row = vec![""; self.width];
        row[self.column] = source_id;
        row
    }
}

/// Append-only set of reported source identifiers
#[derive(Debug)]
pub struct ReportLedger {
    path: PathBuf,
    layout: Layout,
    entries: HashSet<String>,
}

impl ReportLedger {
    /// Load the ledger at `path`
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let (layout, entries) = if path.exists() {
            read_entries(&path)?
        } else {
            tracing::debug!(path = %path.display(), "Report ledger not found, starting empty");
            (Layout::default(), HashSet::new())
        };

        Ok(Self {
            path,
            layout,
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, source_id: &str) -> bool {
        self.entries.contains(source_id)
    }

    /// Durably record `source_id`; already-present identifiers are not rewritten
    pub fn append(&mut self, source_id: &str) -> Result<()> {
        self.append_all([source_id])
    }

    /// Durably record several identifiers with one file open
    pub fn append_all<'a, I>(&mut self, source_ids: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut fresh = Vec::new();
        for id in source_ids {
            if !self.entries.contains(id) && !fresh.contains(&id) {
                fresh.push(id);
            }
        }
        if fresh.is_empty() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)?;

        let len = file.metadata()?.len();
        if len == 0 {
            self.layout = Layout::default();
            writeln!(file, "{LEDGER_COLUMN}")?;
        } else {
            // Keep rows separate when the previous writer left no final newline
            let mut last = [0u8; 1];
            file.seek(SeekFrom::Start(len - 1))?;
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                writeln!(file)?;
            }
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(&mut file);
        for id in &fresh {
            writer
                .write_record(self.layout.row(id))
                .map_err(|e| Error::Table(format!("{}: {e}", self.path.display())))?;
        }
        writer.flush()?;
        drop(writer);
        file.sync_all()?;

        for id in fresh {
            tracing::debug!(source_id = id, "Recorded source in report ledger");
            self.entries.insert(id.to_string());
        }
        Ok(())
    }

    /// Frozen copy of the current entries, usable as an existence check
    pub fn snapshot(&self) -> LedgerCheck {
        LedgerCheck {
            known: self.entries.clone(),
        }
    }
}

fn read_entries(path: &Path) -> Result<(Layout, HashSet<String>)> {
    let table_err = |e: csv::Error| Error::Table(format!("{}: {e}", path.display()));

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(table_err)?;

    let headers = reader.headers().map_err(table_err)?.clone();
    let Some(column) = headers.iter().position(|h| h.trim() == LEDGER_COLUMN) else {
        if headers.is_empty() {
            return Ok((Layout::default(), HashSet::new()));
        }
        return Err(Error::Table(format!(
            "{}: missing {LEDGER_COLUMN} column",
            path.display()
        )));
    };

    let layout = Layout {
        column,
        width: headers.len(),
    };

    let mut entries = HashSet::new();
    for record in reader.records() {
        let record = record.map_err(table_err)?;
        if let Some(id) = record.get(column).map(str::trim).filter(|id| !id.is_empty()) {
            entries.insert(id.to_string());
        }
    }

    tracing::debug!(
        path = %path.display(),
        entries = entries.len(),
        columns = layout.width,
        "Loaded report ledger"
    );
    Ok((layout, entries))
}

/// Existence check backed by the ledger contents at run start
#[derive(Debug, Clone, Default)]
pub struct LedgerCheck {
    known: HashSet<String>,
}

#[async_trait]
impl KnownSourceCheck for LedgerCheck {
    fn strategy_name(&self) -> &'static str {
        "ledger"
    }

    async fn lookup(&self, source: &Source) -> Result<Existence> {
        if self.known.contains(&source.id) {
            Ok(Existence::Known { names: Vec::new() })
        } else {
            Ok(Existence::Unknown)
        }
    }
}
