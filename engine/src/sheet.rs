//! FILENAME: engine/src/sheet.rs
//! PURPOSE: The sparse grid and its mutation engine — `SetCell`,
//! `ClearCell`, structural row/column insert and delete, and the
//! dependency bookkeeping (cycle detection, cache invalidation,
//! on-demand recompute) that keeps formula results correct across edits.
//! CONTEXT: `Sheet` is the sole owner of every `CellHolder`. It implements
//! `parser::SheetLookup` so a `Formula` can resolve its own cell
//! references without knowing anything about how the grid is stored.

use std::collections::HashSet;

use log::{debug, trace, warn};
use parser::position::{MAX_COLS, MAX_ROWS};
use parser::{Formula, FormulaError, Position, SheetLookup};

use crate::cell::{CellHolder, CellKind, CellValue, ErrorCell, FormulaCell, LiteralCell};
use crate::error::SheetError;

/// True when `text` should be parsed as a formula: a leading `=` with at
/// least one more character. A bare `"="` and any text starting with the
/// escape `'` are literals, matching `CellHolder::value`'s own rules.
fn has_formula(text: &str) -> bool {
    !text.is_empty() && text.starts_with('=') && text.len() > 1
}

/// A spreadsheet's cell grid, addressed row-major, with lazily-grown rows
/// and columns. Two counters (`rows_count`/`cols_count`) track the
/// *printable* extent, which can be smaller than the physical grid when a
/// holder exists only to host a back-edge for some other cell's formula.
#[derive(Debug, Default)]
pub struct Sheet {
    cells: Vec<Vec<Option<CellHolder>>>,
    rows_count: i32,
    cols_count: i32,
    total_objects: usize,
}

impl Sheet {
    pub fn new() -> Self {
        Sheet { cells: Vec::new(), rows_count: 0, cols_count: 0, total_objects: 0 }
    }

    // ---------------------------------------------------------------
    // Grid access
    // ---------------------------------------------------------------

    fn get(&self, pos: Position) -> Option<&CellHolder> {
        if pos.row < 0 || pos.col < 0 {
            return None;
        }
        self.cells.get(pos.row as usize)?.get(pos.col as usize)?.as_ref()
    }

    fn get_mut(&mut self, pos: Position) -> Option<&mut CellHolder> {
        if pos.row < 0 || pos.col < 0 {
            return None;
        }
        self.cells.get_mut(pos.row as usize)?.get_mut(pos.col as usize)?.as_mut()
    }

    fn cell_exists(&self, pos: Position) -> bool {
        self.get(pos).is_some()
    }

    fn set_slot(&mut self, pos: Position, value: Option<CellHolder>) {
        if value.is_none() && self.get(pos).is_some() {
            self.total_objects -= 1;
        }
        if let Some(row) = self.cells.get_mut(pos.row as usize) {
            if let Some(slot) = row.get_mut(pos.col as usize) {
                *slot = value;
            }
        }
    }

    /// Grows the physical grid so `pos` is addressable and ensures a
    /// holder exists there, without touching the printable counters.
    /// Used both for ordinary writes (which bump the counters themselves
    /// right after) and for holders created solely to host a back-edge.
    fn ensure_holder(&mut self, pos: Position) {
        let row_idx = pos.row as usize;
        let col_idx = pos.col as usize;
        if self.cells.len() <= row_idx {
            self.cells.resize_with(row_idx + 1, Vec::new);
        }
        let row = &mut self.cells[row_idx];
        if row.len() <= col_idx {
            row.resize_with(col_idx + 1, || None);
        }
        if row[col_idx].is_none() {
            row[col_idx] = Some(CellHolder::new());
            self.total_objects += 1;
        }
    }

    /// Like `ensure_holder`, but also grows the printable extent — the
    /// position is being written to directly, not just referenced.
    fn create_cell(&mut self, pos: Position) {
        self.ensure_holder(pos);
        if self.rows_count <= pos.row {
            self.rows_count = pos.row + 1;
        }
        if self.cols_count <= pos.col {
            self.cols_count = pos.col + 1;
        }
    }

    // ---------------------------------------------------------------
    // Dependency bookkeeping
    // ---------------------------------------------------------------

    fn add_used_by(&mut self, target: Position, referrer: Position) {
        if let Some(holder) = self.get_mut(target) {
            if !holder.used_by.contains(&referrer) {
                holder.used_by.push(referrer);
            }
        }
    }

    /// Removes `cell` from the `used_by` list of each position in `refs`.
    /// Used when `cell`'s own forward edges are being replaced or dropped,
    /// without touching `cell`'s own `used_by` (things that depend on
    /// `cell` are unaffected by `cell` changing what it depends on).
    fn clear_used_graph(&mut self, cell: Position, refs: &[Position]) {
        for &r in refs {
            if let Some(holder) = self.get_mut(r) {
                holder.used_by.retain(|&p| p != cell);
            }
        }
    }

    /// Fully detaches `cell` from the graph: removes it from every
    /// referent's `used_by` and clears its own `used_by`. Only correct
    /// when `cell` itself is about to be destroyed.
    fn clear_graph(&mut self, cell: Position) {
        let refs = self.get(cell).map(|h| h.referenced_cells()).unwrap_or_default();
        self.clear_used_graph(cell, &refs);
        if let Some(holder) = self.get_mut(cell) {
            holder.used_by.clear();
        }
    }

    /// Marks `pos` itself invalid (a no-op for non-formula holders) and
    /// cascades into every member of its `used_by` that isn't already
    /// invalid. Used where the holder being invalidated is itself the
    /// subject of the change (`ClearCell`).
    fn invalidate_holder(&mut self, pos: Position) {
        let used_by = match self.get_mut(pos) {
            Some(holder) => {
                holder.invalidate();
                holder.used_by.clone()
            }
            None => return,
        };
        for dep in used_by {
            let already_invalid = self.get(dep).map(|h| h.is_invalid()).unwrap_or(true);
            if !already_invalid {
                self.invalidate_holder(dep);
            }
        }
    }

    /// Invalidates everything transitively dependent on `pos`, without
    /// touching `pos`'s own cache. This is `SetCell`'s closing step: the
    /// cell just got a fresh value (or was reset), so its *dependents*
    /// need to recompute, but `pos` itself is already current.
    fn invalidate_dependents(&mut self, pos: Position) {
        let used_by = match self.get(pos) {
            Some(holder) => holder.used_by.clone(),
            None => return,
        };
        for dep in used_by {
            let already_invalid = self.get(dep).map(|h| h.is_invalid()).unwrap_or(true);
            if !already_invalid {
                self.invalidate_holder(dep);
            }
        }
    }

    /// Recursively brings `pos`'s cache current: first recurses into
    /// every cell it references (so nested invalid caches resolve
    /// bottom-up), then re-evaluates `pos` itself if it's a stale
    /// formula. A no-op for anything else.
    fn ensure_cache_current(&mut self, pos: Position) {
        let needs_update = self.get(pos).map(|h| h.is_invalid()).unwrap_or(false);
        if !needs_update {
            return;
        }
        let refs = self.get(pos).map(|h| h.referenced_cells()).unwrap_or_default();
        for r in &refs {
            if self.cell_exists(*r) {
                self.ensure_cache_current(*r);
            }
        }
        let formula = match self.get(pos).and_then(|h| h.formula()) {
            Some(fc) => fc.formula().clone(),
            None => return,
        };
        let result = formula.evaluate(self);
        if let Some(holder) = self.get_mut(pos) {
            if let Some(fc) = holder.formula_mut() {
                fc.set_cached(result);
            }
        }
    }

    /// Depth-first search for a path from any position in `refs` back to
    /// `target`. To bound the search on diamond-shaped graphs, a branch
    /// is only followed past its first hop when that hop currently
    /// evaluates to a value-level error — a cell with a clean value
    /// cannot be part of a cycle that was just introduced.
    fn check_dependency(&mut self, target: Position, refs: &[Position]) -> bool {
        for &r in refs {
            if r == target {
                return true;
            }
            if !self.cell_exists(r) {
                continue;
            }
            self.ensure_cache_current(r);
            let holds_error = self.get(r).and_then(|h| h.formula()).map(|fc| fc.holds_error()).unwrap_or(false);
            if holds_error {
                let sub_refs = self.get(r).map(|h| h.referenced_cells()).unwrap_or_default();
                if self.check_dependency(target, &sub_refs) {
                    return true;
                }
            }
        }
        false
    }

    // ---------------------------------------------------------------
    // Public mutation API
    // ---------------------------------------------------------------

    pub fn set_cell(&mut self, pos: Position, text: &str) -> Result<(), SheetError> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition);
        }
        let cell_existed = self.cell_exists(pos);
        self.create_cell(pos);

        if self.get(pos).unwrap().last_call() == text {
            return Ok(());
        }

        let old_refs = self.get(pos).unwrap().referenced_cells();
        if !old_refs.is_empty() {
            self.clear_used_graph(pos, &old_refs);
        }

        if text.is_empty() {
            self.set_holder_kind(pos, None);
        } else if has_formula(text) {
            self.handle_formula_creation(pos, text, cell_existed)?;
        } else {
            self.set_holder_kind(pos, Some(CellKind::Literal(LiteralCell::new(text.to_string()))));
        }

        self.invalidate_dependents(pos);
        trace!("set_cell {} = {:?}", pos.to_label(), text);
        Ok(())
    }

    fn set_holder_kind(&mut self, pos: Position, kind: Option<CellKind>) {
        if let Some(holder) = self.get_mut(pos) {
            holder.set_kind(kind);
        }
    }

    fn handle_formula_creation(&mut self, pos: Position, text: &str, cell_existed: bool) -> Result<(), SheetError> {
        let formula = Formula::parse(&text[1..])?;

        if formula.has_overflowed_literal() {
            // Rust's float parser saturates an out-of-range literal to
            // infinity instead of raising an error, so this stands in for
            // the `stod` overflow that the original caught and turned
            // into a stored error cell keeping the raw formula text.
            self.set_holder_kind(pos, Some(CellKind::Error(ErrorCell::new(text.to_string(), FormulaError::Div0))));
            return Ok(());
        }

        let refs = formula.get_referenced_cells().to_vec();
        for &r in &refs {
            if self.cell_exists(r) {
                self.add_used_by(r, pos);
            }
        }

        if self.check_dependency(pos, &refs) {
            self.clear_used_graph(pos, &refs);
            if !cell_existed {
                self.set_slot(pos, None);
            }
            warn!("circular dependency rejected at {}", pos.to_label());
            return Err(SheetError::CircularDependency);
        }

        for &r in &refs {
            if self.cell_exists(r) {
                self.ensure_cache_current(r);
            }
        }

        let value = formula.evaluate(self);
        self.set_holder_kind(pos, Some(CellKind::Formula(FormulaCell::new(formula, value))));

        for &r in &refs {
            if !self.cell_exists(r) {
                self.ensure_holder(r);
                self.add_used_by(r, pos);
            }
        }

        Ok(())
    }

    pub fn clear_cell(&mut self, pos: Position) -> Result<(), SheetError> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition);
        }
        if self.cell_exists(pos) {
            self.invalidate_holder(pos);
            self.clear_graph(pos);
            self.set_slot(pos, None);
        }
        if self.total_objects == 0 {
            self.rows_count = 0;
            self.cols_count = 0;
        }
        Ok(())
    }

    pub fn get_value(&mut self, pos: Position) -> Result<CellValue, SheetError> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition);
        }
        self.ensure_cache_current(pos);
        Ok(self.get(pos).map(|h| h.value()).unwrap_or(CellValue::Number(0.0)))
    }

    pub fn get_text(&self, pos: Position) -> Result<String, SheetError> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition);
        }
        Ok(self.get(pos).map(|h| h.text()).unwrap_or_default())
    }

    pub fn get_referenced_cells(&self, pos: Position) -> Result<Vec<Position>, SheetError> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition);
        }
        Ok(self.get(pos).map(|h| h.referenced_cells()).unwrap_or_default())
    }

    pub fn get_printable_size(&self) -> (i32, i32) {
        (self.rows_count, self.cols_count)
    }

    // ---------------------------------------------------------------
    // Structural edits
    // ---------------------------------------------------------------

    pub fn insert_rows(&mut self, before: i32, count: i32) -> Result<(), SheetError> {
        if self.rows_count + count >= MAX_ROWS {
            return Err(SheetError::TableTooBig);
        }
        // The shift has to reach every physically-existing row, not just
        // the printable ones: a row that exists solely to host a
        // back-edge target sits outside `rows_count` but still holds
        // positions other formulas reference.
        let old_physical_rows = self.cells.len() as i32;
        self.rows_count += count;
        let new_physical_len = (old_physical_rows + count).max(self.rows_count).max(0) as usize;
        if self.cells.len() < new_physical_len {
            self.cells.resize_with(new_physical_len, Vec::new);
        }

        let mut already_changed = HashSet::new();
        for i in (before..old_physical_rows).rev() {
            let row = std::mem::take(&mut self.cells[i as usize]);
            for slot in row.iter() {
                if let Some(holder) = slot {
                    let used_by = holder.used_by.clone();
                    self.rewrite_on_insert(&used_by, &mut already_changed, before, count, true);
                }
            }
            self.cells[(i + count) as usize] = row;
        }
        debug!("insert_rows before={before} count={count}");
        Ok(())
    }

    pub fn insert_cols(&mut self, before: i32, count: i32) -> Result<(), SheetError> {
        if self.cols_count + count >= MAX_COLS {
            return Err(SheetError::TableTooBig);
        }
        self.cols_count += count;

        let mut already_changed = HashSet::new();
        let physical_rows = self.cells.len();
        for i in 0..physical_rows {
            let old_row_len = self.cells[i].len() as i32;
            if old_row_len == 0 {
                continue;
            }
            let new_row_len = (old_row_len + count).max(self.cols_count).max(0) as usize;
            if self.cells[i].len() < new_row_len {
                self.cells[i].resize_with(new_row_len, || None);
            }
            for j in (before..old_row_len).rev() {
                let used_by = self.cells[i][j as usize].as_ref().map(|h| h.used_by.clone());
                if let Some(used_by) = used_by {
                    self.rewrite_on_insert(&used_by, &mut already_changed, before, count, false);
                }
                self.cells[i].swap(j as usize, (j + count) as usize);
            }
        }
        debug!("insert_cols before={before} count={count}");
        Ok(())
    }

    fn rewrite_on_insert(&mut self, used_by: &[Position], already_changed: &mut HashSet<Position>, before: i32, count: i32, is_row: bool) {
        for &referrer in used_by {
            if !already_changed.insert(referrer) {
                continue;
            }
            if let Some(holder) = self.get_mut(referrer) {
                if let Some(fc) = holder.formula_mut() {
                    // An insert already guaranteed the sheet's own extent
                    // stays addressable; a per-formula overflow here is a
                    // vanishingly rare edge case (a reference already
                    // sitting at the grid's outer edge). The rewrite's
                    // own rollback leaves the formula untouched, so the
                    // sheet stays consistent even if we ignore it.
                    let _ = if is_row {
                        fc.formula_mut().handle_inserted_rows(before, count)
                    } else {
                        fc.formula_mut().handle_inserted_cols(before, count)
                    };
                }
            }
        }
    }

    pub fn delete_rows(&mut self, first: i32, count: i32) -> Result<(), SheetError> {
        let mut already_changed = HashSet::new();
        // Same reasoning as `insert_rows`: the shift and the dependent
        // rewrite both need to see every physically-existing row, since a
        // back-edge-only host can sit beyond the printable extent.
        let old_physical_rows = self.cells.len() as i32;
        let band_end = (first + count).min(old_physical_rows);

        for row in first..band_end {
            let row_len = self.cells.get(row as usize).map(|r| r.len()).unwrap_or(0);
            for col in 0..row_len as i32 {
                let pos = Position::new(row, col);
                if !self.cell_exists(pos) {
                    continue;
                }
                let used_by = self.get(pos).unwrap().used_by.clone();
                self.rewrite_on_delete(&used_by, &mut already_changed, first, count, true);
                self.invalidate_holder(pos);
                self.clear_graph(pos);
                self.set_slot(pos, None);
            }
        }

        for row in band_end..old_physical_rows {
            let row_len = self.cells.get(row as usize).map(|r| r.len()).unwrap_or(0);
            for col in 0..row_len as i32 {
                let pos = Position::new(row, col);
                if !self.cell_exists(pos) {
                    continue;
                }
                let used_by = self.get(pos).unwrap().used_by.clone();
                self.rewrite_on_delete(&used_by, &mut already_changed, first, count, true);
            }
            let moved = std::mem::take(&mut self.cells[row as usize]);
            self.cells[(row - count) as usize] = moved;
        }

        let new_physical_len = (old_physical_rows - count).max(0) as usize;
        self.cells.truncate(new_physical_len);
        self.rows_count = (self.rows_count - count).max(0);
        if self.cols_count == 1 && self.rows_count == 0 {
            self.cols_count = 0;
        }
        debug!("delete_rows first={first} count={count}");
        Ok(())
    }

    pub fn delete_cols(&mut self, first: i32, count: i32) -> Result<(), SheetError> {
        let mut already_changed = HashSet::new();
        let physical_rows = self.cells.len();

        for row in 0..physical_rows {
            let row_len = self.cells[row].len() as i32;
            if row_len == 0 {
                continue;
            }
            let band_end = (first + count).min(row_len);

            for col in first..band_end {
                let pos = Position::new(row as i32, col);
                if !self.cell_exists(pos) {
                    continue;
                }
                let used_by = self.get(pos).unwrap().used_by.clone();
                self.rewrite_on_delete(&used_by, &mut already_changed, first, count, false);
                self.invalidate_holder(pos);
                self.clear_graph(pos);
                self.set_slot(pos, None);
            }
            for col in band_end..row_len {
                let pos = Position::new(row as i32, col);
                if !self.cell_exists(pos) {
                    continue;
                }
                let used_by = self.get(pos).unwrap().used_by.clone();
                self.rewrite_on_delete(&used_by, &mut already_changed, first, count, false);
            }
            for col in band_end..row_len {
                self.cells[row].swap(col as usize, (col - count) as usize);
            }
            let new_row_len = (row_len - count).max(0) as usize;
            let cur_len = self.cells[row].len();
            self.cells[row].truncate(new_row_len.min(cur_len));
        }

        self.cols_count = (self.cols_count - count).max(0);
        if self.cols_count == 0 && self.rows_count == 1 {
            self.rows_count = 0;
        }
        debug!("delete_cols first={first} count={count}");
        Ok(())
    }

    fn rewrite_on_delete(&mut self, used_by: &[Position], already_changed: &mut HashSet<Position>, first: i32, count: i32, is_row: bool) {
        for &referrer in used_by {
            if !already_changed.insert(referrer) {
                continue;
            }
            let result = match self.get_mut(referrer).and_then(|h| h.formula_mut()) {
                Some(fc) => {
                    if is_row {
                        Some(fc.formula_mut().handle_deleted_rows(first, count))
                    } else {
                        Some(fc.formula_mut().handle_deleted_cols(first, count))
                    }
                }
                None => None,
            };
            if let Some(parser::HandlingResult::ReferencesChanged) = result {
                self.invalidate_holder(referrer);
            }
        }
    }

    // ---------------------------------------------------------------
    // Printer
    // ---------------------------------------------------------------

    pub fn print_values(&mut self) -> String {
        let mut out = String::new();
        for row in 0..self.rows_count {
            for col in 0..self.cols_count {
                let pos = Position::new(row, col);
                if self.cell_exists(pos) {
                    self.ensure_cache_current(pos);
                    out.push_str(&format_value(&self.get(pos).unwrap().value()));
                }
                if col != self.cols_count - 1 {
                    out.push('\t');
                }
            }
            out.push('\n');
        }
        out
    }

    pub fn print_texts(&self) -> String {
        let mut out = String::new();
        for row in 0..self.rows_count {
            for col in 0..self.cols_count {
                let pos = Position::new(row, col);
                if let Some(holder) = self.get(pos) {
                    out.push_str(&holder.text());
                }
                if col != self.cols_count - 1 {
                    out.push('\t');
                }
            }
            out.push('\n');
        }
        out
    }
}

fn format_value(value: &CellValue) -> String {
    match value {
        CellValue::Number(n) => {
            if n.is_finite() && *n == n.trunc() && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{n}")
            }
        }
        CellValue::Text(s) => s.clone(),
        CellValue::Error(e) => e.label().to_string(),
    }
}

impl SheetLookup for Sheet {
    fn resolve(&mut self, pos: Position) -> Result<f64, FormulaError> {
        if !self.cell_exists(pos) {
            return Ok(0.0);
        }
        self.ensure_cache_current(pos);
        match self.get(pos).unwrap().value() {
            CellValue::Number(n) => Ok(n),
            CellValue::Text(s) => {
                if s.chars().any(|c| c.is_ascii_alphabetic()) {
                    Err(FormulaError::Value)
                } else {
                    s.parse::<f64>().map_err(|_| FormulaError::Value)
                }
            }
            CellValue::Error(e) => Err(e),
        }
    }
}
