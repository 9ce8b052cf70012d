use std::io::Error;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

#[derive(Debug)]
pub enum TCError {
    IoError(Error),
    PolarsError(PolarsError),
    LoadingFailed(String),
    ExportFailed(String),
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
}

impl From<Error> for TCError {
    fn from(err: Error) -> Self {
        TCError::IoError(err)
    }
}

impl From<PolarsError> for TCError {
    fn from(err: PolarsError) -> Self {
        TCError::PolarsError(err)
    }
}

#[derive(Debug, Clone, Setters)]
pub struct TCConfig {
    pub event_poll_time: u64,
    pub max_column_width: usize,
    // Columns with more distinct values than this get a deferred chart
    pub chart_threshold: usize,
    pub max_label_width: usize,
}

impl Default for TCConfig {
    fn default() -> Self {
        TCConfig {
            event_poll_time: 100,
            max_column_width: 40,
            chart_threshold: 10,
            max_label_width: 23,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    EditCell,
    ExportPath,
    OpenFile,
}

#[derive(Debug)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    MoveToFirstColumn,
    MoveToLastColumn,
    ToggleIndex,
    Resize(usize, usize),
    CopyCell,
    CopyRow,
    Help,
    EditCell,
    AddRow,
    DeleteRow,
    ClearRows,
    ResetRows,
    SortAscending,
    SortDescending,
    Export,
    OpenFile,
    Charts,
    ChartMenu,
    RebuildCharts,
    NextChart,
    PrevChart,
    Enter,
    Exit,
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "tabchart key bindings

Grid
  arrows / hjkl     move selection
  PgUp / PgDn       move one page
  g / G             first / last row
  0 / $             first / last column
  i                 toggle row index
  e                 edit selected cell
  a                 add empty row (top)
  d                 delete selected row
  x                 clear all rows
  r                 reset to loaded data
  s / S             sort column asc / desc
  y / Y             copy cell / row (csv)
  w                 export to csv file
  o                 open another file

Charts
  c                 show column charts
  m                 deferred chart menu
  n / p             next / previous chart
  R                 rebuild charts from grid

  ?                 this help
  Esc               back
  q                 quit";
