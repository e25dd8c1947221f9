use crate::prelude::{MonitorError, MonitorResult, Row};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Checklist state of a single jar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JarStatus {
    Unchecked,
    Present,
    Missing,
}

impl JarStatus {
    /// Parses a status submitted from the checklist; only `present` and
    /// `missing` can be set explicitly.
    pub fn from_submission(value: &str) -> MonitorResult<Self> {
        match value {
            "present" => Ok(JarStatus::Present),
            "missing" => Ok(JarStatus::Missing),
            other => Err(MonitorError::InvalidStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JarRecord {
    pub status: JarStatus,
    pub row: Row,
    pub time: Option<DateTime<Utc>>,
}

impl JarRecord {
    pub fn unchecked(row: Row) -> Self {
        Self {
            status: JarStatus::Unchecked,
            row,
            time: None,
        }
    }
}

/// A jar that turned up in the wrong row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MisplacedEntry {
    pub jar: String,
    pub found_in: Row,
    pub correct_row: Option<Row>,
    pub time: DateTime<Utc>,
}

/// Outcome of reporting a misplaced jar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MisplacedReport {
    pub correct_row: Option<Row>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingJar {
    pub jar: String,
    pub row: Option<Row>,
    pub time: Option<DateTime<Utc>>,
}

/// Counts and listings for the missing/misplaced overview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JarSummary {
    pub total_jars: usize,
    pub present: usize,
    pub missing: usize,
    pub misplaced: usize,
    pub unchecked: usize,
    pub missing_jars: Vec<MissingJar>,
    pub misplaced_jars: Vec<MisplacedEntry>,
}

/// Static assignment of jar ids to rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JarCatalog {
    rows: BTreeMap<Row, Vec<String>>,
}

impl JarCatalog {
    pub fn new(rows: BTreeMap<Row, Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn jars(&self, row: Row) -> MonitorResult<&[String]> {
        self.rows
            .get(&row)
            .map(Vec::as_slice)
            .ok_or(MonitorError::InvalidRow(row.number().into()))
    }

    pub fn correct_row(&self, jar: &str) -> Option<Row> {
        self.rows
            .iter()
            .find(|(_, jars)| jars.iter().any(|candidate| candidate == jar))
            .map(|(row, _)| *row)
    }

    pub fn contains(&self, row: Row, jar: &str) -> bool {
        self.rows
            .get(&row)
            .map(|jars| jars.iter().any(|candidate| candidate == jar))
            .unwrap_or(false)
    }

    pub fn total_jars(&self) -> usize {
        self.rows.values().map(Vec::len).sum()
    }
}

impl Default for JarCatalog {
    fn default() -> Self {
        let mut rows = BTreeMap::new();
        rows.insert(Row::ONE, vec!["H004040".into(), "H004041".into()]);
        rows.insert(
            Row::TWO,
            ["R0244", "R0245", "R0246", "R0247", "R47376", "R47346", "R47347"]
                .iter()
                .map(|id| id.to_string())
                .collect(),
        );
        Self { rows }
    }
}

/// Checklist results and misplaced-jar reports against a [`JarCatalog`].
#[derive(Debug, Clone, Default)]
pub struct JarBook {
    catalog: JarCatalog,
    records: HashMap<String, JarRecord>,
    misplaced: Vec<MisplacedEntry>,
}

impl JarBook {
    pub fn new(catalog: JarCatalog) -> Self {
        Self {
            catalog,
            records: HashMap::new(),
            misplaced: Vec::new(),
        }
    }

    pub fn catalog(&self) -> &JarCatalog {
        &self.catalog
    }

    /// Every catalog jar in `row`, defaulting to unchecked.
    pub fn row_status(&self, row: Row) -> MonitorResult<BTreeMap<String, JarRecord>> {
        let jars = self.catalog.jars(row)?;
        Ok(jars
            .iter()
            .map(|jar| {
                let record = self
                    .records
                    .get(jar)
                    .cloned()
                    .unwrap_or_else(|| JarRecord::unchecked(row));
                (jar.clone(), record)
            })
            .collect())
    }

    pub fn set_status(
        &mut self,
        jar: &str,
        status: JarStatus,
        row: Row,
        time: DateTime<Utc>,
    ) -> MonitorResult<()> {
        if status == JarStatus::Unchecked {
            return Err(MonitorError::InvalidStatus("unchecked".into()));
        }
        if !self.catalog.contains(row, jar) {
            return Err(MonitorError::UnknownJar {
                jar: jar.to_string(),
                row,
            });
        }
        self.records.insert(
            jar.to_string(),
            JarRecord {
                status,
                row,
                time: Some(time),
            },
        );
        Ok(())
    }

    pub fn report_misplaced(&mut self, jar: &str, found_in: Row, time: DateTime<Utc>) -> MisplacedReport {
        let correct_row = self.catalog.correct_row(jar);
        self.misplaced.push(MisplacedEntry {
            jar: jar.to_string(),
            found_in,
            correct_row,
            time,
        });
        let message = match correct_row {
            Some(row) => format!("Jar {} belongs in Row {}", jar, row),
            None => "Jar not found in database.".to_string(),
        };
        MisplacedReport {
            correct_row,
            message,
        }
    }

    pub fn misplaced(&self) -> &[MisplacedEntry] {
        &self.misplaced
    }

    pub fn summary(&self) -> JarSummary {
        let mut missing_jars: Vec<MissingJar> = self
            .records
            .iter()
            .filter(|(_, record)| record.status == JarStatus::Missing)
            .map(|(jar, record)| MissingJar {
                jar: jar.clone(),
                row: self.catalog.correct_row(jar),
                time: record.time,
            })
            .collect();
        missing_jars.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.jar.cmp(&b.jar)));

        let present = self
            .records
            .values()
            .filter(|record| record.status == JarStatus::Present)
            .count();
        let total_jars = self.catalog.total_jars();
        let checked = present + missing_jars.len();

        JarSummary {
            total_jars,
            present,
            missing: missing_jars.len(),
            misplaced: self.misplaced.len(),
            unchecked: total_jars.saturating_sub(checked),
            missing_jars,
            misplaced_jars: self.misplaced.clone(),
        }
    }
}
