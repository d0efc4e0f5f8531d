//! Failure-chain grouping
//!
//! Groups the FE–FM–FC links of one analysis by failure mode and lays each
//! group out as a rectangular block of rows. When a mode has more effects than
//! causes (or the reverse), the last entry of the shorter column spans the
//! remaining rows instead of being repeated or left blank:
//!
//! ```text
//! FM      | FE           | FC
//! --------+--------------+-----------
//! Crack   | Noise        | Tool Wear
//! (span 3)| Judder       | (span 3)
//!         | Stop Loss    |
//! ```

use serde::Serialize;
use std::collections::HashSet;

use crate::model::{AtomicBatch, L1Category, Rating};

/// Display data for one failure mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainMode {
    pub id: String,
    pub text: String,
    /// Owning process step, "no name"
    pub process: String,
    pub special_char: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectEntry {
    pub id: String,
    pub text: String,
    pub category: Option<L1Category>,
    pub severity: Option<Rating>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CauseEntry {
    pub id: String,
    pub text: String,
    pub occurrence: Option<Rating>,
    /// Work element the cause belongs to
    pub work_element: String,
}

/// A committed link with its effect and cause resolved for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    pub link_id: String,
    pub fm_id: String,
    pub fe: Option<EffectEntry>,
    pub fc: Option<CauseEntry>,
}

/// One table cell position
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CellSlot<T> {
    /// Rendered cell covering `row_span` rows starting here
    #[serde(rename_all = "camelCase")]
    Cell { value: T, row_span: usize },
    /// Covered by the span starting at `by_row`; render nothing
    #[serde(rename_all = "camelCase")]
    Spanned { by_row: usize },
    /// Blank cell covering `row_span` rows (column has no entries)
    #[serde(rename_all = "camelCase")]
    Empty { row_span: usize },
}

impl<T> CellSlot<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            CellSlot::Cell { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Rows this slot renders over; 0 for a spanned slot
    pub fn row_span(&self) -> usize {
        match self {
            CellSlot::Cell { row_span, .. } | CellSlot::Empty { row_span } => *row_span,
            CellSlot::Spanned { .. } => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainRow {
    pub index: usize,
    pub fm: CellSlot<ChainMode>,
    pub fe: CellSlot<EffectEntry>,
    pub fc: CellSlot<CauseEntry>,
}

/// All rows for one failure mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FmGroup {
    pub fm_id: String,
    pub fm_text: String,
    pub process: String,
    pub max_rows: usize,
    /// Highest FE severity, 0 when no effect carries one
    pub max_severity: u8,
    pub max_severity_fe: Option<String>,
    pub severity_label: String,
    /// No effect or no cause is linked to this mode
    pub incomplete: bool,
    pub effect_count: usize,
    pub cause_count: usize,
    pub rows: Vec<ChainRow>,
}

fn column_is_rectangular<'a, T: 'a>(
    cells: impl Iterator<Item = &'a CellSlot<T>>,
    max_rows: usize,
) -> bool {
    let mut next_uncovered = 0;
    let mut anchor = None;
    let mut rows = 0;

    for (i, cell) in cells.enumerate() {
        rows += 1;
        match cell {
            CellSlot::Cell { row_span, .. } | CellSlot::Empty { row_span } => {
                if i != next_uncovered || *row_span == 0 {
                    return false;
                }
                anchor = Some(i);
                next_uncovered = i + row_span;
            }
            CellSlot::Spanned { by_row } => {
                if anchor != Some(*by_row) || i >= next_uncovered {
                    return false;
                }
            }
        }
    }

    rows == max_rows && next_uncovered == max_rows
}

impl FmGroup {
    /// Every column covers exactly `max_rows` rows with no gap and no overlap
    pub fn is_rectangular(&self) -> bool {
        self.rows.len() == self.max_rows
            && column_is_rectangular(self.rows.iter().map(|r| &r.fm), self.max_rows)
            && column_is_rectangular(self.rows.iter().map(|r| &r.fe), self.max_rows)
            && column_is_rectangular(self.rows.iter().map(|r| &r.fc), self.max_rows)
    }
}

/// Lay out one column; the last entry spans the rows the column runs short
fn layout<T: Clone>(entries: &[T], max_rows: usize) -> Vec<CellSlot<T>> {
    if entries.is_empty() {
        return (0..max_rows)
            .map(|i| match i {
                0 => CellSlot::Empty { row_span: max_rows },
                _ => CellSlot::Spanned { by_row: 0 },
            })
            .collect();
    }

    let last = entries.len() - 1;
    (0..max_rows)
        .map(|i| {
            if i < last {
                CellSlot::Cell {
                    value: entries[i].clone(),
                    row_span: 1,
                }
            } else if i == last {
                CellSlot::Cell {
                    value: entries[i].clone(),
                    row_span: max_rows - last,
                }
            } else {
                CellSlot::Spanned { by_row: last }
            }
        })
        .collect()
}

fn severity_label(max: Option<&EffectEntry>) -> String {
    match max {
        Some(fe) => match fe.severity {
            Some(s) => format!("S{} ({})", s, fe.text),
            None => "-".to_string(),
        },
        None => "-".to_string(),
    }
}

/// Groups links by failure mode into rectangular row blocks
#[derive(Debug, Default, Clone, Copy)]
pub struct FailureChainGrouper;

impl FailureChainGrouper {
    /// One group per mode, in `modes` order
    ///
    /// Modes without links still get a group (one blank row, flagged
    /// incomplete). Links whose mode is not in `modes` get a group of their
    /// own after the known modes, so no link is lost.
    pub fn group(modes: &[ChainMode], links: &[ResolvedLink]) -> Vec<FmGroup> {
        let mut ordered: Vec<ChainMode> = modes.to_vec();
        let known: HashSet<&str> = modes.iter().map(|m| m.id.as_str()).collect();
        let mut extra: Vec<&str> = Vec::new();
        for link in links {
            if !known.contains(link.fm_id.as_str()) && !extra.contains(&link.fm_id.as_str()) {
                extra.push(&link.fm_id);
            }
        }
        ordered.extend(extra.into_iter().map(|id| ChainMode {
            id: id.to_string(),
            text: id.to_string(),
            process: String::new(),
            special_char: false,
        }));

        ordered
            .iter()
            .map(|mode| Self::group_one(mode, links))
            .collect()
    }

    fn group_one(mode: &ChainMode, links: &[ResolvedLink]) -> FmGroup {
        let mut effects: Vec<EffectEntry> = Vec::new();
        let mut causes: Vec<CauseEntry> = Vec::new();

        for link in links.iter().filter(|l| l.fm_id == mode.id) {
            if let Some(fe) = &link.fe {
                if !effects.iter().any(|e| e.id == fe.id) {
                    effects.push(fe.clone());
                }
            }
            if let Some(fc) = &link.fc {
                if !causes.iter().any(|c| c.id == fc.id) {
                    causes.push(fc.clone());
                }
            }
        }

        let max_rows = effects.len().max(causes.len()).max(1);

        // First effect wins a tie
        let worst = effects.iter().fold(None::<&EffectEntry>, |best, fe| {
            let s = fe.severity.map_or(0, Rating::get);
            match best {
                Some(b) if b.severity.map_or(0, Rating::get) >= s => Some(b),
                _ if s > 0 => Some(fe),
                _ => best,
            }
        });

        let fm_column = layout(std::slice::from_ref(mode), max_rows);
        let fe_column = layout(&effects, max_rows);
        let fc_column = layout(&causes, max_rows);

        let rows = fm_column
            .into_iter()
            .zip(fe_column)
            .zip(fc_column)
            .enumerate()
            .map(|(index, ((fm, fe), fc))| ChainRow { index, fm, fe, fc })
            .collect();

        FmGroup {
            fm_id: mode.id.clone(),
            fm_text: mode.text.clone(),
            process: mode.process.clone(),
            max_rows,
            max_severity: worst.and_then(|fe| fe.severity).map_or(0, Rating::get),
            max_severity_fe: worst.map(|fe| fe.id.clone()),
            severity_label: severity_label(worst),
            incomplete: effects.is_empty() || causes.is_empty(),
            effect_count: effects.len(),
            cause_count: causes.len(),
            rows,
        }
    }

    /// Resolve the batch's modes and links, then group
    pub fn from_batch(batch: &AtomicBatch) -> Vec<FmGroup> {
        let modes: Vec<ChainMode> = batch
            .failure_modes
            .iter()
            .map(|fm| ChainMode {
                id: fm.id.clone(),
                text: fm.mode.clone(),
                process: batch
                    .l2_structure(&fm.l2_struct_id)
                    .map(|s| format!("{} {}", s.no, s.name).trim().to_string())
                    .unwrap_or_default(),
                special_char: fm.special_char,
            })
            .collect();

        let links: Vec<ResolvedLink> = batch
            .failure_links
            .iter()
            .map(|link| ResolvedLink {
                link_id: link.id.clone(),
                fm_id: link.fm_id.clone(),
                fe: batch.failure_effect(&link.fe_id).map(|fe| EffectEntry {
                    id: fe.id.clone(),
                    text: fe.effect.clone(),
                    category: Some(fe.category),
                    severity: fe.severity,
                }),
                fc: batch.failure_cause(&link.fc_id).map(|fc| CauseEntry {
                    id: fc.id.clone(),
                    text: fc.cause.clone(),
                    occurrence: fc.occurrence,
                    work_element: batch
                        .l3_structure(&fc.l3_struct_id)
                        .map(|s| s.name.clone())
                        .unwrap_or_default(),
                }),
            })
            .collect();

        Self::group(&modes, &links)
    }
}
