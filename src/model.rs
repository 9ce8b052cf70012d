use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::charts::{ChartInput, ChartPass, ColorGen};
use crate::domain::{CMDMode, HELP_TEXT, Message, TCConfig, TCError};
use crate::inputter::{InputResult, Inputter};
use crate::table::Table;
use crate::ui::{CMDLINE_HEIGH, COLUMN_WIDTH_MARGIN, SCROLLBAR_WIDTH, TABLE_HEADER_HEIGHT};

#[derive(Debug, PartialEq)]
pub enum Status {
    EMPTY,
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Modus {
    TABLE,
    CHART,
    CHARTMENU,
    POPUP,
    CMDINPUT,
}

#[derive(Clone)]
pub struct ColumnView {
    pub name: String,
    pub width: usize,
    pub data: Vec<String>,
}

impl ColumnView {
    fn empty() -> Self {
        ColumnView {
            name: "".to_string(),
            width: 0,
            data: Vec::new(),
        }
    }
}

/// Chart data handed to the ui, one column at a time.
#[derive(Clone)]
pub struct ChartView {
    pub column: String,
    pub input: ChartInput,
    /// Number of non-empty cells behind the chart
    pub total: usize,
    /// (current, of) position in the set of viewable charts
    pub position: (usize, usize),
}

pub struct UIData {
    pub name: String,
    pub modus: Modus,
    pub table: Vec<ColumnView>,
    pub index: ColumnView,
    pub show_index: bool,
    pub nrows: usize,
    pub selected_row: usize,
    pub selected_column: usize,
    pub abs_selected_row: usize,
    pub chart: Option<ChartView>,
    pub menu: Vec<String>,
    pub menu_selected: usize,
    pub show_popup: bool,
    pub popup_message: String,
    pub layout: UILayout,
    pub last_update: Instant,
    pub cmdinput: InputResult,
    pub cmd_mode: Option<CMDMode>,
    pub active_cmdinput: bool,
    pub status_message: String,
    pub last_status_message_update: Instant,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            modus: Modus::TABLE,
            table: Vec::new(),
            index: ColumnView::empty(),
            show_index: false,
            nrows: 0,
            selected_row: 0,
            selected_column: 0,
            abs_selected_row: 0,
            chart: None,
            menu: Vec::new(),
            menu_selected: 0,
            show_popup: false,
            popup_message: String::new(),
            layout: UILayout::default(),
            last_update: Instant::now(),
            cmdinput: InputResult::default(),
            cmd_mode: None,
            active_cmdinput: false,
            status_message: String::new(),
            last_status_message_update: Instant::now(),
        }
    }
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_width: usize,
    pub table_height: usize,
    pub index_width: usize,
    pub index_height: usize,
    pub statusline_width: usize,
    pub statusline_height: usize,
}

impl UILayout {
    pub fn from_values(index_width: usize, ui_width: usize, ui_height: usize) -> Self {
        let cmdline_heigth = CMDLINE_HEIGH;
        let cmdline_width = ui_width;

        let table_width = ui_width.saturating_sub(SCROLLBAR_WIDTH + index_width);
        let table_height = ui_height.saturating_sub(cmdline_heigth + TABLE_HEADER_HEIGHT);
        let index_height = table_height;

        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_width,
            table_height,
            index_width,
            index_height,
            statusline_width: cmdline_width,
            statusline_height: cmdline_heigth,
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

/// The one session object: owns the table, the grid viewport, the chart
/// pass and the command line state.
pub struct Model {
    config: TCConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    table: Option<Table>,

    // Grid viewport
    curser_row: usize,
    curser_column: usize,
    offset_row: usize,
    offset_column: usize,
    visible_columns: Vec<usize>,
    column_widths: Vec<usize>,
    show_index: bool,
    index: ColumnView,

    // Charts
    charts: Option<ChartPass>,
    chart_curser: usize,
    menu_curser: usize,
    colors: ColorGen,

    uilayout: UILayout,
    uidata: UIData,
    clipboard: Option<Clipboard>,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    active_cmdinput: bool,
    status_message: String,
    last_status_message_update: Instant,
    last_update: Instant,
}

impl Model {
    pub fn init(config: &TCConfig, ui_width: usize, ui_height: usize) -> Self {
        let clipboard = match Clipboard::new() {
            Ok(cb) => Some(cb),
            Err(e) => {
                warn!("Clipboard unavailable: {:?}", e);
                None
            }
        };
        let mut model = Self {
            config: config.clone(),
            status: Status::EMPTY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            table: None,
            curser_row: 0,
            curser_column: 0,
            offset_row: 0,
            offset_column: 0,
            visible_columns: Vec::new(),
            column_widths: Vec::new(),
            show_index: true,
            index: ColumnView::empty(),
            charts: None,
            chart_curser: 0,
            menu_curser: 0,
            colors: ColorGen::new(),
            uilayout: UILayout::from_values(0, ui_width, ui_height),
            uidata: UIData::empty(),
            clipboard,
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            active_cmdinput: false,
            status_message: "Started tabchart!".to_string(),
            last_status_message_update: Instant::now(),
            last_update: Instant::now(),
        };
        model.update_table_data();
        model
    }

    /// Load a csv file into a fresh session. The previous table, its edits
    /// and all of its charts are dropped unconditionally.
    pub fn load_data_file(&mut self, path: PathBuf) -> Result<(), TCError> {
        let table = Table::load(path)?;
        info!(
            "Loaded \"{}\": {} columns, {} rows",
            table.name(),
            table.ncols(),
            table.nrows()
        );

        self.charts = None;
        self.chart_curser = 0;
        self.menu_curser = 0;
        self.curser_row = 0;
        self.curser_column = 0;
        self.offset_row = 0;
        self.offset_column = 0;
        self.table = Some(table);
        self.status = Status::READY;
        self.modus = Modus::TABLE;

        // Build the chart pass for the freshly parsed data right away, the
        // way the grid edits never touch it.
        self.rebuild_charts();

        self.refresh_widths();
        self.update_table_data();
        let (ncols, nrows) = self
            .table
            .as_ref()
            .map(|t| (t.ncols(), t.nrows()))
            .unwrap_or((0, 0));
        self.set_status_message(format!("Loaded {nrows} rows x {ncols} columns"));
        Ok(())
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
        self.uidata.status_message = self.status_message.clone();
        self.uidata.last_status_message_update = self.last_status_message_update;
        self.uidata.last_update = Instant::now();
    }

    pub fn update(&mut self, message: Message) -> Result<(), TCError> {
        match self.modus {
            Modus::TABLE => match message {
                Message::Quit => self.quit(),
                Message::MoveDown => self.move_table_selection_down(1),
                Message::MoveUp => self.move_table_selection_up(1),
                Message::MoveLeft => self.move_table_selection_left(),
                Message::MoveRight => self.move_table_selection_right(),
                Message::MovePageUp => {
                    self.move_table_selection_up(self.uilayout.table_height.max(1))
                }
                Message::MovePageDown => {
                    self.move_table_selection_down(self.uilayout.table_height.max(1))
                }
                Message::MoveBeginning => self.move_table_selection_beginning(),
                Message::MoveEnd => self.move_table_selection_end(),
                Message::MoveToFirstColumn => self.select_column(0),
                Message::MoveToLastColumn => {
                    let last = self.ncols().saturating_sub(1);
                    self.select_column(last);
                }
                Message::ToggleIndex => self.toggle_table_index(),
                Message::Resize(width, height) => self.ui_resize(width, height),
                Message::CopyCell => self.copy_table_cell(),
                Message::CopyRow => self.copy_table_row(),
                Message::Help => self.show_help(),
                Message::EditCell | Message::Enter => self.edit_cell(),
                Message::AddRow => self.add_row(),
                Message::DeleteRow => self.delete_row(),
                Message::ClearRows => self.clear_rows(),
                Message::ResetRows => self.reset_rows(),
                Message::SortAscending => self.sort_current_column(true),
                Message::SortDescending => self.sort_current_column(false),
                Message::Export => self.enter_export(),
                Message::OpenFile => self.enter_cmd_mode(CMDMode::OpenFile),
                Message::Charts => self.enter_charts(),
                Message::ChartMenu => self.enter_chart_menu(),
                Message::RebuildCharts => {
                    self.rebuild_charts();
                    self.set_status_message("Rebuilt charts from current grid");
                }
                _ => (),
            },
            Modus::CHART => match message {
                Message::Quit => self.quit(),
                Message::NextChart | Message::MoveRight | Message::MoveDown => self.next_chart(1),
                Message::PrevChart | Message::MoveLeft | Message::MoveUp => self.next_chart(-1),
                Message::ChartMenu => self.enter_chart_menu(),
                Message::RebuildCharts => {
                    self.rebuild_charts();
                    self.chart_curser = 0;
                    self.update_uidata_for_chart();
                    self.set_status_message("Rebuilt charts from current grid");
                }
                Message::Resize(width, height) => self.ui_resize(width, height),
                Message::Help => self.show_help(),
                Message::Exit => self.exit(),
                _ => (),
            },
            Modus::CHARTMENU => match message {
                Message::Quit => self.quit(),
                Message::MoveDown => self.move_menu_selection(1),
                Message::MoveUp => self.move_menu_selection(-1),
                Message::Enter => self.select_menu_entry(),
                Message::Resize(width, height) => self.ui_resize(width, height),
                Message::Help => self.show_help(),
                Message::Exit => self.exit(),
                _ => (),
            },
            Modus::POPUP => match message {
                Message::Quit => self.quit(),
                Message::Resize(width, height) => self.ui_resize(width, height),
                Message::Exit | Message::Enter => self.exit(),
                _ => (),
            },
            Modus::CMDINPUT => {
                if let Message::RawKey(key) = message {
                    self.raw_input(key);
                }
            }
        }

        self.last_update = Instant::now();
        Ok(())
    }

    // -------------------- Grid viewport ---------------------- //

    fn ncols(&self) -> usize {
        self.table.as_ref().map(Table::ncols).unwrap_or(0)
    }

    fn nrows(&self) -> usize {
        self.table.as_ref().map(Table::nrows).unwrap_or(0)
    }

    /// Absolute (row, column) of the grid selection.
    fn selected_cell(&self) -> (usize, usize) {
        let row = self.offset_row + self.curser_row;
        let column = self
            .visible_columns
            .get(self.curser_column)
            .copied()
            .unwrap_or(0);
        (row, column)
    }

    fn refresh_widths(&mut self) {
        let Some(table) = &self.table else {
            self.column_widths = Vec::new();
            return;
        };
        self.column_widths = table
            .schema()
            .iter()
            .enumerate()
            .map(|(cidx, name)| {
                let data_width = table
                    .rows()
                    .iter()
                    .map(|row| row.get(cidx).map(|c| c.chars().count()).unwrap_or(0))
                    .max()
                    .unwrap_or(0);
                let width = name.chars().count().max(data_width) + COLUMN_WIDTH_MARGIN;
                width.min(self.config.max_column_width)
            })
            .collect();
    }

    fn build_index(&mut self) {
        let rbegin = self.offset_row;
        let rend = (rbegin + self.uilayout.table_height).min(self.nrows());

        let data = (rbegin..rend)
            .map(|idx| (idx + 1).to_string())
            .collect::<Vec<String>>();
        let width = data.last().map(|s| s.len()).unwrap_or(3);
        self.index = ColumnView {
            name: "".to_string(),
            width,
            data,
        }
    }

    fn update_table_data(&mut self) {
        let mut views: Vec<ColumnView> = Vec::new();
        if let Some(table) = &self.table {
            let rbegin = self.offset_row.min(table.nrows());
            let rend = (rbegin + self.uilayout.table_height).min(table.nrows());

            // Greedily fit columns starting at the column offset, the last
            // one may render partially
            self.visible_columns = Vec::new();
            let mut visible_width = 0;
            let mut render_widths: Vec<usize> = Vec::new();
            for (cidx, &width) in self
                .column_widths
                .iter()
                .enumerate()
                .skip(self.offset_column)
            {
                if visible_width + width + 1 <= self.uilayout.table_width {
                    self.visible_columns.push(cidx);
                    render_widths.push(width);
                    visible_width += width + 1;
                } else {
                    if visible_width < self.uilayout.table_width {
                        let remaining = self.uilayout.table_width - visible_width;
                        self.visible_columns.push(cidx);
                        render_widths.push(remaining);
                    }
                    break;
                }
            }

            if !self.visible_columns.is_empty() {
                self.curser_column = self.curser_column.min(self.visible_columns.len() - 1);
            } else {
                self.curser_column = 0;
            }

            for (&cidx, &width) in self.visible_columns.iter().zip(render_widths.iter()) {
                let name = crate::charts::truncate_label(&table.schema()[cidx], width);
                let data = (rbegin..rend)
                    .map(|ridx| table.cell(ridx, cidx).replace("\r\n", " ↵ ").replace('\n', " ↵ "))
                    .collect();
                views.push(ColumnView { name, width, data });
            }
        }

        self.build_index();
        self.uidata = UIData {
            name: self
                .table
                .as_ref()
                .map(|t| t.name().to_string())
                .unwrap_or_default(),
            modus: self.modus,
            table: views,
            index: self.index.clone(),
            show_index: self.show_index,
            nrows: self.nrows(),
            selected_row: self.curser_row,
            selected_column: self.curser_column,
            abs_selected_row: self.offset_row + self.curser_row,
            chart: None,
            menu: Vec::new(),
            menu_selected: 0,
            show_popup: false,
            popup_message: String::new(),
            layout: self.uilayout.clone(),
            cmdinput: self.last_input.clone(),
            cmd_mode: self.cmd_mode,
            active_cmdinput: self.active_cmdinput,
            last_update: Instant::now(),
            status_message: self.status_message.clone(),
            last_status_message_update: self.last_status_message_update,
        };
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        let index_width = if self.show_index { self.index.width } else { 0 };
        self.uilayout = UILayout::from_values(index_width, width, height);
        match self.modus {
            Modus::TABLE => self.update_table_data(),
            Modus::CHART => self.update_uidata_for_chart(),
            Modus::CHARTMENU => self.update_uidata_for_menu(),
            Modus::POPUP => {}
            Modus::CMDINPUT => {}
        }
    }

    fn toggle_table_index(&mut self) {
        self.show_index = !self.show_index;
        let index_width = if self.show_index { self.index.width } else { 0 };
        self.uilayout = UILayout::from_values(index_width, self.uilayout.width, self.uilayout.height);
        self.update_table_data();
    }

    fn select_column(&mut self, column: usize) {
        if self.ncols() == 0 {
            return;
        }
        if self.visible_columns.contains(&column) {
            self.curser_column = self
                .visible_columns
                .iter()
                .position(|&c| c == column)
                .unwrap_or(0);
        } else {
            self.offset_column = column;
            self.curser_column = 0;
        }
        self.update_table_data();
    }

    fn move_table_selection_beginning(&mut self) {
        self.curser_row = 0;
        self.offset_row = 0;
        self.update_table_data();
    }

    fn move_table_selection_end(&mut self) {
        let nrows = self.nrows();
        if nrows == 0 {
            return;
        }
        if nrows < self.uilayout.table_height {
            self.offset_row = 0;
            self.curser_row = nrows - 1;
        } else {
            self.offset_row = nrows - self.uilayout.table_height;
            self.curser_row = self.uilayout.table_height - 1;
        }
        self.update_table_data();
    }

    fn move_table_selection_up(&mut self, size: usize) {
        if self.curser_row > 0 {
            self.curser_row = self.curser_row.saturating_sub(size);
        } else if self.offset_row > 0 {
            self.offset_row = self.offset_row.saturating_sub(size);
        }
        self.update_table_data();
    }

    fn move_table_selection_down(&mut self, size: usize) {
        let nrows = self.nrows();
        if nrows == 0 || self.curser_row + self.offset_row >= nrows - 1 {
            return;
        }
        if self.curser_row < self.uilayout.table_height.saturating_sub(1) {
            self.curser_row = (self.curser_row + size).min(nrows - self.offset_row - 1);
        } else {
            self.offset_row = (self.offset_row + size).min(nrows - 1);
            self.curser_row = self
                .uilayout
                .table_height
                .saturating_sub(1)
                .min(nrows - self.offset_row - 1);
        }
        self.update_table_data();
    }

    fn move_table_selection_left(&mut self) {
        if self.curser_column > 0 {
            self.curser_column -= 1;
        } else if self.offset_column > 0 {
            self.offset_column -= 1;
        }
        self.update_table_data();
    }

    fn move_table_selection_right(&mut self) {
        let ncols = self.ncols();
        if ncols == 0 {
            return;
        }
        let (_, abs_column) = self.selected_cell();
        if abs_column >= ncols - 1 {
            return;
        }
        if self.curser_column < self.visible_columns.len().saturating_sub(1) {
            self.curser_column += 1;
        } else {
            self.offset_column += 1;
        }
        self.update_table_data();
    }

    // -------------------- Grid edits ---------------------- //

    fn edit_cell(&mut self) {
        if self.nrows() == 0 {
            self.set_status_message("Nothing to edit");
            return;
        }
        let (ridx, cidx) = self.selected_cell();
        let current = self
            .table
            .as_ref()
            .map(|t| t.cell(ridx, cidx).to_string())
            .unwrap_or_default();
        self.enter_cmd_mode(CMDMode::EditCell);
        self.input.set(&current);
        self.last_input = self.input.get();
        self.uidata.cmdinput = self.last_input.clone();
    }

    fn add_row(&mut self) {
        let Some(table) = &mut self.table else {
            return;
        };
        table.add_row();
        // The new row lands on top, select it
        self.curser_row = 0;
        self.offset_row = 0;
        self.refresh_widths();
        self.update_table_data();
        self.set_status_message("Added empty row");
    }

    fn delete_row(&mut self) {
        if self.nrows() == 0 {
            self.set_status_message("No row to delete");
            return;
        }
        let (ridx, _) = self.selected_cell();
        if let Some(table) = &mut self.table {
            table.delete_row(ridx);
        }
        let nrows = self.nrows();
        if self.offset_row + self.curser_row >= nrows && nrows > 0 {
            self.move_table_selection_up(1);
        }
        self.refresh_widths();
        self.update_table_data();
        self.set_status_message(format!("Deleted row {}", ridx + 1));
    }

    fn clear_rows(&mut self) {
        if let Some(table) = &mut self.table {
            table.clear();
        }
        self.curser_row = 0;
        self.offset_row = 0;
        self.refresh_widths();
        self.update_table_data();
        self.set_status_message("Cleared all rows");
    }

    fn reset_rows(&mut self) {
        if let Some(table) = &mut self.table {
            table.reset();
        }
        self.curser_row = 0;
        self.offset_row = 0;
        self.refresh_widths();
        self.update_table_data();
        self.set_status_message("Reset rows to loaded data");
    }

    fn sort_current_column(&mut self, ascending: bool) {
        if self.nrows() == 0 {
            return;
        }
        let (_, cidx) = self.selected_cell();
        if let Some(table) = &mut self.table {
            table.sort_by_column(cidx, ascending);
        }
        self.update_table_data();
        self.set_status_message(format!(
            "Sorted by column {} {}",
            cidx + 1,
            if ascending { "ascending" } else { "descending" }
        ));
    }

    fn copy_table_cell(&mut self) {
        let (ridx, cidx) = self.selected_cell();
        let Some(table) = &self.table else { return };
        let cell = table.cell(ridx, cidx).to_string();
        trace!("Cell content: {}", cell);
        match &mut self.clipboard {
            Some(clipboard) => match clipboard.set_text(cell) {
                Ok(_) => self.set_status_message("Copied cell to clipboard"),
                Err(e) => {
                    error!("Error copying to clipboard: {:?}", e);
                    self.set_status_message("Clipboard error");
                }
            },
            None => self.set_status_message("No clipboard available"),
        }
    }

    fn copy_table_row(&mut self) {
        let (ridx, _) = self.selected_cell();
        let Some(table) = &self.table else { return };
        let row_content = table.row_as_csv(ridx);
        match &mut self.clipboard {
            Some(clipboard) => match clipboard.set_text(row_content) {
                Ok(_) => self.set_status_message("Copied row to clipboard"),
                Err(e) => {
                    error!("Error copying to clipboard: {:?}", e);
                    self.set_status_message("Clipboard error");
                }
            },
            None => self.set_status_message("No clipboard available"),
        }
    }

    // -------------------- Charts ---------------------- //

    fn rebuild_charts(&mut self) {
        if let Some(table) = &self.table {
            self.charts = Some(ChartPass::build(table, &self.config, &mut self.colors));
            self.menu_curser = 0;
        }
    }

    fn enter_charts(&mut self) {
        if self.charts.is_none() {
            self.rebuild_charts();
        }
        let viewable = self
            .charts
            .as_ref()
            .map(|p| p.viewable())
            .unwrap_or_default();
        if viewable.is_empty() {
            self.set_status_message("No chartable columns");
            return;
        }
        self.previous_modus = self.modus;
        self.modus = Modus::CHART;
        self.chart_curser = self.chart_curser.min(viewable.len() - 1);
        self.update_uidata_for_chart();
    }

    fn next_chart(&mut self, step: i32) {
        let viewable = self
            .charts
            .as_ref()
            .map(|p| p.viewable())
            .unwrap_or_default();
        if viewable.is_empty() {
            return;
        }
        let n = viewable.len() as i32;
        self.chart_curser = ((self.chart_curser as i32 + step).rem_euclid(n)) as usize;
        self.update_uidata_for_chart();
    }

    fn update_uidata_for_chart(&mut self) {
        let Some(pass) = &self.charts else { return };
        let viewable = pass.viewable();
        if viewable.is_empty() {
            return;
        }
        self.chart_curser = self.chart_curser.min(viewable.len() - 1);
        let entry = &pass.entries[viewable[self.chart_curser]];
        let chart = entry.chart().cloned().unwrap_or(ChartInput {
            labels: Vec::new(),
            values: Vec::new(),
            colors: Vec::new(),
        });

        let name = self
            .table
            .as_ref()
            .map(|t| format!("C[{}]", t.name()))
            .unwrap_or_default();
        self.uidata.name = name;
        self.uidata.modus = self.modus;
        self.uidata.chart = Some(ChartView {
            column: entry.column.clone(),
            total: entry.map.total(),
            input: chart,
            position: (self.chart_curser + 1, viewable.len()),
        });
        self.uidata.layout = self.uilayout.clone();
        self.uidata.status_message = self.status_message.clone();
        self.uidata.last_update = Instant::now();
    }

    fn enter_chart_menu(&mut self) {
        if self.charts.is_none() {
            self.rebuild_charts();
        }
        let menu = self
            .charts
            .as_ref()
            .map(|p| p.deferred_menu())
            .unwrap_or_default();
        if menu.is_empty() {
            self.set_status_message("No deferred charts");
            return;
        }
        self.previous_modus = self.modus;
        self.modus = Modus::CHARTMENU;
        self.menu_curser = self.menu_curser.min(menu.len() - 1);
        self.update_uidata_for_menu();
    }

    fn move_menu_selection(&mut self, step: i32) {
        let menu_len = self
            .charts
            .as_ref()
            .map(|p| p.deferred_menu().len())
            .unwrap_or(0);
        if menu_len == 0 {
            return;
        }
        let n = menu_len as i32;
        self.menu_curser = ((self.menu_curser as i32 + step).rem_euclid(n)) as usize;
        self.update_uidata_for_menu();
    }

    /// Render the selected deferred chart and switch to it. Its menu entry
    /// disappears with the rendering.
    fn select_menu_entry(&mut self) {
        let Some(pass) = &mut self.charts else { return };
        let menu = pass.deferred_menu();
        let Some(&(entry_idx, _)) = menu.get(self.menu_curser) else {
            return;
        };
        pass.entries[entry_idx].render(&mut self.colors, self.config.max_label_width);
        debug!(
            "Deferred chart for column \"{}\" selected",
            pass.entries[entry_idx].column
        );

        self.chart_curser = pass
            .viewable()
            .iter()
            .position(|&idx| idx == entry_idx)
            .unwrap_or(0);
        self.menu_curser = 0;
        self.previous_modus = self.modus;
        self.modus = Modus::CHART;
        self.update_uidata_for_chart();
    }

    fn update_uidata_for_menu(&mut self) {
        let Some(pass) = &self.charts else { return };
        let menu: Vec<String> = pass.deferred_menu().into_iter().map(|(_, s)| s).collect();
        self.uidata.modus = self.modus;
        self.uidata.menu = menu;
        self.uidata.menu_selected = self.menu_curser;
        self.uidata.layout = self.uilayout.clone();
        self.uidata.last_update = Instant::now();
    }

    // -------------------- Command line ---------------------- //

    fn enter_export(&mut self) {
        let Some(table) = &self.table else {
            self.set_status_message("Nothing to export");
            return;
        };
        // Default export target: the original file name
        let name = table.export_name();
        self.enter_cmd_mode(CMDMode::ExportPath);
        self.input.set(&name);
        self.last_input = self.input.get();
        self.uidata.cmdinput = self.last_input.clone();
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {:?}", mode);
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);

        self.active_cmdinput = true;
        self.input.clear();
        self.last_input = self.input.get();
        self.uidata.cmdinput = self.last_input.clone();
        self.uidata.active_cmdinput = self.active_cmdinput;
        self.uidata.cmd_mode = self.cmd_mode;
        self.uidata.last_update = Instant::now();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if self.active_cmdinput {
            self.last_input = self.input.read(key);
            if self.last_input.finished {
                self.handle_cmd_input();
            }
            self.uidata.cmdinput = self.last_input.clone();
            self.uidata.cmd_mode = self.cmd_mode;
            self.uidata.last_update = Instant::now();
        }
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {}", self.last_input.input);

        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;
        self.uidata.active_cmdinput = self.active_cmdinput;

        let canceled = self.last_input.canceled;
        let cmd_input = self.last_input.input.clone();
        match self.cmd_mode {
            Some(CMDMode::EditCell) => {
                if canceled {
                    self.set_status_message("Edit canceled");
                } else {
                    let (ridx, cidx) = self.selected_cell();
                    if let Some(table) = &mut self.table {
                        table.set_cell(ridx, cidx, cmd_input);
                    }
                    self.refresh_widths();
                    self.set_status_message("Cell updated");
                }
                self.update_table_data();
            }
            Some(CMDMode::ExportPath) => {
                if canceled || cmd_input.is_empty() {
                    self.set_status_message("Export canceled");
                } else {
                    self.export_to(&cmd_input);
                }
                self.update_table_data();
            }
            Some(CMDMode::OpenFile) => {
                if canceled || cmd_input.is_empty() {
                    self.set_status_message("Open canceled");
                } else {
                    self.open_file(&cmd_input);
                }
            }
            None => {
                info!("Cmd mode is none!");
            }
        }
        self.cmd_mode = None;
        self.uidata.cmd_mode = None;
    }

    fn expand_path(input: &str) -> PathBuf {
        match shellexpand::full(input) {
            Ok(expanded) => PathBuf::from(expanded.as_ref()),
            Err(e) => {
                warn!("Could not expand \"{}\": {:?}", input, e);
                PathBuf::from(input)
            }
        }
    }

    fn export_to(&mut self, raw_path: &str) {
        let path = Self::expand_path(raw_path);
        let result = match &self.table {
            Some(table) => table.export(&path),
            None => return,
        };
        match result {
            Ok(_) => self.set_status_message(format!("Exported to {}", path.display())),
            Err(e) => {
                error!("Export to {:?} failed: {:?}", path, e);
                self.set_status_message("Export failed (see log)");
            }
        }
    }

    fn open_file(&mut self, raw_path: &str) {
        let path = Self::expand_path(raw_path);
        match self.load_data_file(path.clone()) {
            Ok(_) => {}
            Err(e) => {
                error!("Loading {:?} failed: {:?}", path, e);
                self.set_status_message("Loading failed (see log)");
                self.update_table_data();
            }
        }
    }

    // -------------------- Popups ---------------------- //

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.uidata.modus = self.modus;
        self.uidata.popup_message = HELP_TEXT.to_string();
        self.uidata.show_popup = true;
        self.uidata.last_update = Instant::now();
    }

    fn exit(&mut self) {
        match self.modus {
            Modus::TABLE => {}
            Modus::CHART => {
                self.previous_modus = Modus::CHART;
                self.modus = Modus::TABLE;
                self.update_table_data();
            }
            Modus::CHARTMENU => {
                self.previous_modus = Modus::CHARTMENU;
                self.modus = Modus::TABLE;
                self.update_table_data();
            }
            Modus::POPUP => {
                trace!("Close popup ...");
                self.modus = self.previous_modus;
                self.previous_modus = Modus::POPUP;
                self.uidata.show_popup = false;
                self.uidata.modus = self.modus;
                match self.modus {
                    Modus::TABLE => self.update_table_data(),
                    Modus::CHART => self.update_uidata_for_chart(),
                    Modus::CHARTMENU => self.update_uidata_for_menu(),
                    _ => {}
                }
                self.uidata.last_update = Instant::now();
            }
            Modus::CMDINPUT => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyCode;

    fn model_with_fixture() -> Model {
        let mut model = Model::init(&TCConfig::default(), 80, 24);
        model
            .load_data_file("tests/fixtures/testdata_01.csv".into())
            .unwrap();
        model
    }

    fn raw(model: &mut Model, code: KeyCode) {
        model.update(Message::RawKey(KeyEvent::from(code))).unwrap();
    }

    #[test]
    fn quit_message_sets_status() {
        let mut model = Model::init(&TCConfig::default(), 80, 24);
        model.update(Message::Quit).unwrap();
        assert_eq!(model.status, Status::QUITTING);
    }

    #[test]
    fn load_builds_grid_and_charts() {
        let model = model_with_fixture();
        assert_eq!(model.status, Status::READY);
        let uidata = model.get_uidata();
        assert_eq!(uidata.nrows, 4);
        assert!(!uidata.table.is_empty());
        // color column has 2 distinct values -> immediate chart
        let pass = model.charts.as_ref().unwrap();
        assert!(!pass.viewable().is_empty());
    }

    #[test]
    fn add_and_delete_row_via_messages() {
        let mut model = model_with_fixture();
        model.update(Message::AddRow).unwrap();
        assert_eq!(model.nrows(), 5);
        assert_eq!(model.get_uidata().abs_selected_row, 0);

        model.update(Message::DeleteRow).unwrap();
        assert_eq!(model.nrows(), 4);
    }

    #[test]
    fn clear_then_reset_restores_rows() {
        let mut model = model_with_fixture();
        model.update(Message::ClearRows).unwrap();
        assert_eq!(model.nrows(), 0);
        assert_eq!(model.get_uidata().nrows, 0);

        model.update(Message::ResetRows).unwrap();
        assert_eq!(model.nrows(), 4);
        assert_eq!(
            model.table.as_ref().unwrap().cell(0, 0),
            "ada"
        );
    }

    #[test]
    fn edit_cell_through_command_line() {
        let mut model = model_with_fixture();
        model.update(Message::EditCell).unwrap();
        assert!(model.raw_keyevents());
        // Prefilled with the current cell value
        assert_eq!(model.get_uidata().cmdinput.input, "ada");

        for _ in 0..3 {
            raw(&mut model, KeyCode::Backspace);
        }
        for c in "zoe".chars() {
            raw(&mut model, KeyCode::Char(c));
        }
        raw(&mut model, KeyCode::Enter);

        assert!(!model.raw_keyevents());
        assert_eq!(model.table.as_ref().unwrap().cell(0, 0), "zoe");
    }

    #[test]
    fn canceled_edit_leaves_cell_untouched() {
        let mut model = model_with_fixture();
        model.update(Message::EditCell).unwrap();
        raw(&mut model, KeyCode::Char('x'));
        raw(&mut model, KeyCode::Esc);
        assert_eq!(model.table.as_ref().unwrap().cell(0, 0), "ada");
    }

    #[test]
    fn chart_mode_cycles_viewable_columns() {
        let mut model = model_with_fixture();
        model.update(Message::Charts).unwrap();
        assert_eq!(model.modus, Modus::CHART);
        let first = model.get_uidata().chart.as_ref().unwrap().column.clone();

        model.update(Message::NextChart).unwrap();
        let second = model.get_uidata().chart.as_ref().unwrap().column.clone();
        assert_ne!(first, second);

        model.update(Message::Exit).unwrap();
        assert_eq!(model.modus, Modus::TABLE);
    }

    #[test]
    fn deferred_menu_lists_high_cardinality_columns() {
        let schema = vec!["id".to_string(), "flag".to_string()];
        let rows: Vec<Vec<String>> = (0..11)
            .map(|i| vec![format!("id{i}"), "on".to_string()])
            .collect();
        let mut model = Model::init(&TCConfig::default(), 80, 24);
        model.table = Some(Table::from_parts("t.csv", schema, rows));
        model.status = Status::READY;
        model.rebuild_charts();
        model.refresh_widths();
        model.update_table_data();

        model.update(Message::ChartMenu).unwrap();
        assert_eq!(model.modus, Modus::CHARTMENU);
        assert_eq!(model.get_uidata().menu, vec!["id (11 entries)"]);

        // Selecting the entry renders it and consumes the menu entry
        model.update(Message::Enter).unwrap();
        assert_eq!(model.modus, Modus::CHART);
        assert_eq!(model.get_uidata().chart.as_ref().unwrap().column, "id");
        assert!(model.charts.as_ref().unwrap().deferred_menu().is_empty());

        // No deferred entries left, the menu refuses to open
        model.update(Message::Exit).unwrap();
        model.update(Message::ChartMenu).unwrap();
        assert_eq!(model.modus, Modus::TABLE);
    }

    #[test]
    fn charts_are_not_live_updated_by_grid_edits() {
        let mut model = model_with_fixture();
        model.update(Message::ClearRows).unwrap();
        // The pass still reflects the loaded data
        model.update(Message::Charts).unwrap();
        assert_eq!(model.modus, Modus::CHART);
        model.update(Message::Exit).unwrap();

        // An explicit rebuild sees the emptied grid
        model.update(Message::RebuildCharts).unwrap();
        model.update(Message::Charts).unwrap();
        assert_eq!(model.modus, Modus::TABLE);
        assert_eq!(model.get_uidata().status_message, "No chartable columns");
    }
}
