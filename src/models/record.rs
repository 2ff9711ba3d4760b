//! Read-side types: archived records and the scanning progress dashboard.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Metadata of a document already archived by the save service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    #[serde(rename = "ID")]
    pub id: i64,
    pub doc_name: String,
    pub npsn: String,
    pub sn_bapp: String,
    pub hasil_cek: String,
    /// Server-side path of the generated PDF.
    pub path: String,
    pub created_at: String,
}

/// Per-term progress counters from the save service's `/stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStat {
    pub termin: String,
    pub total_schools: u64,
    pub scanned: u64,
    pub logs_accepted: u64,
}

/// One dashboard row with derived columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardRow {
    pub termin: String,
    pub total_schools: u64,
    pub scanned: u64,
    pub logs_accepted: u64,
    pub not_scanned: u64,
    pub is_total: bool,
}

impl DashboardRow {
    fn from_stat(stat: DashboardStat) -> Self {
        Self {
            not_scanned: stat.total_schools.saturating_sub(stat.scanned),
            termin: stat.termin,
            total_schools: stat.total_schools,
            scanned: stat.scanned,
            logs_accepted: stat.logs_accepted,
            is_total: false,
        }
    }

    /// Share of schools whose physical check was accepted, in percent.
    pub fn accepted_pct(&self) -> f64 {
        percentage(self.logs_accepted, self.total_schools)
    }

    /// Share of schools already scanned, in percent.
    pub fn scanned_pct(&self) -> f64 {
        percentage(self.scanned, self.total_schools)
    }
}

/// Sorted rows plus a trailing "Total" row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    pub rows: Vec<DashboardRow>,
}

pub const TOTAL_ROW_LABEL: &str = "Total";

impl DashboardReport {
    pub fn from_stats(mut stats: Vec<DashboardStat>) -> Self {
        stats.sort_by(|a, b| natural_cmp(&a.termin, &b.termin));

        let mut total = DashboardRow {
            termin: TOTAL_ROW_LABEL.to_string(),
            total_schools: 0,
            scanned: 0,
            logs_accepted: 0,
            not_scanned: 0,
            is_total: true,
        };

        let mut rows: Vec<DashboardRow> = stats.into_iter().map(DashboardRow::from_stat).collect();
        for row in &rows {
            total.total_schools += row.total_schools;
            total.scanned += row.scanned;
            total.logs_accepted += row.logs_accepted;
            total.not_scanned += row.not_scanned;
        }
        rows.push(total);

        Self { rows }
    }

    pub fn total(&self) -> Option<&DashboardRow> {
        self.rows.last().filter(|r| r.is_total)
    }
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Case-insensitive ordering that compares digit runs numerically
/// ("Termin 2" < "Termin 10").
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let ln = take_number(&mut left);
                let rn = take_number(&mut right);
                let ord = compare_digit_runs(&ln, &rn);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(l), Some(r)) => {
                let ord = l.to_lowercase().cmp(r.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
        digits.push(c);
        chars.next();
    }
    digits
}

fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
