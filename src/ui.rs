use ratatui::{
    Frame,
    layout::{Constraint, Direction, Flex, Layout, Position, Rect},
    style::{Style, Stylize},
    text::{Line, Text},
    widgets::{
        Bar, BarChart, BarGroup, Block, Clear, List, ListItem, ListState, Paragraph, Scrollbar,
        ScrollbarOrientation, ScrollbarState,
    },
};

use crate::domain::{CMDMode, TCConfig};
use crate::model::{Model, Modus, UIData};

pub const CMDLINE_HEIGH: usize = 1;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const SCROLLBAR_WIDTH: usize = 1;
pub const COLUMN_WIDTH_MARGIN: usize = 2;

pub struct TableUI {
    config: TCConfig,
}

impl TableUI {
    pub fn new(cfg: &TCConfig) -> Self {
        Self {
            config: cfg.clone(),
        }
    }

    pub fn draw(&self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let [main_area, cmd_area] = Layout::vertical([
            Constraint::Min(1),
            Constraint::Length(CMDLINE_HEIGH as u16),
        ])
        .areas(frame.area());

        match uidata.modus {
            Modus::TABLE | Modus::CMDINPUT => self.draw_table(uidata, frame, main_area),
            Modus::CHART => self.draw_chart(uidata, frame, main_area),
            Modus::CHARTMENU => self.draw_menu(uidata, frame, main_area),
            Modus::POPUP => {
                self.draw_table(uidata, frame, main_area);
            }
        }

        if uidata.show_popup {
            self.draw_popup(uidata, frame, main_area);
        }

        self.draw_cmdline(uidata, frame, cmd_area);
    }

    fn draw_table(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        if uidata.table.is_empty() {
            let hint = if uidata.nrows == 0 && !uidata.name.is_empty() {
                "No rows. <a> add row, <r> reset, <o> open file, <?> help"
            } else {
                "No data loaded. <o> open file, <?> help"
            };
            frame.render_widget(
                Paragraph::new(hint).style(Style::new().dim()).centered(),
                area,
            );
            return;
        }

        let mut constraints: Vec<Constraint> = Vec::new();
        if uidata.show_index {
            constraints.push(Constraint::Length(uidata.index.width as u16 + 1));
        }
        for column in &uidata.table {
            constraints.push(Constraint::Length(column.width as u16 + 1));
        }
        constraints.push(Constraint::Min(0));
        constraints.push(Constraint::Length(SCROLLBAR_WIDTH as u16));
        let chunks = Layout::horizontal(constraints).split(area);

        let mut chunk_idx = 0;
        if uidata.show_index {
            let mut lines = vec![Line::from("")];
            for (ridx, number) in uidata.index.data.iter().enumerate() {
                let mut line = Line::from(number.clone()).dim();
                if ridx == uidata.selected_row {
                    line = line.bold();
                }
                lines.push(line);
            }
            frame.render_widget(Paragraph::new(Text::from(lines)), chunks[chunk_idx]);
            chunk_idx += 1;
        }

        for (cidx, column) in uidata.table.iter().enumerate() {
            let mut lines = vec![Line::from(column.name.clone().bold().underlined())];
            for (ridx, value) in column.data.iter().enumerate() {
                let mut line = Line::from(value.clone());
                if ridx == uidata.selected_row && cidx == uidata.selected_column {
                    line = line.reversed();
                }
                lines.push(line);
            }
            frame.render_widget(Paragraph::new(Text::from(lines)), chunks[chunk_idx]);
            chunk_idx += 1;
        }

        // Last chunk is reserved for the scrollbar
        let mut scrollbar_state =
            ScrollbarState::new(uidata.nrows).position(uidata.abs_selected_row);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            chunks[chunks.len() - 1],
            &mut scrollbar_state,
        );
    }

    fn draw_chart(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let Some(chart) = &uidata.chart else {
            return;
        };

        let title = format!(
            " {} | chart {}/{} | {} values from {} cells ",
            chart.column,
            chart.position.0,
            chart.position.1,
            chart.input.labels.len(),
            chart.total,
        );

        let bars: Vec<Bar> = chart
            .input
            .labels
            .iter()
            .zip(chart.input.values.iter())
            .zip(chart.input.colors.iter())
            .map(|((label, &value), &color)| {
                Bar::default()
                    .value(value)
                    .label(Line::from(label.clone()))
                    .style(Style::default().fg(color))
                    .text_value(format!("{value}"))
            })
            .collect();

        let barchart = BarChart::default()
            .block(
                Block::bordered()
                    .title(title)
                    .title_bottom(Line::from(" <n> next <p> prev <m> menu <Esc> back ").centered()),
            )
            .direction(Direction::Horizontal)
            .bar_width(1)
            .bar_gap(0)
            .data(BarGroup::default().bars(&bars));
        frame.render_widget(barchart, area);
    }

    fn draw_menu(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = uidata
            .menu
            .iter()
            .map(|entry| ListItem::new(entry.clone()))
            .collect();
        let list = List::new(items)
            .block(
                Block::bordered()
                    .title(format!(
                        " Deferred charts (more than {} entries) ",
                        self.config.chart_threshold
                    ))
                    .title_bottom(Line::from(" <Enter> render <Esc> back ").centered()),
            )
            .highlight_style(Style::new().reversed())
            .highlight_symbol("> ");
        let mut state = ListState::default();
        state.select(Some(uidata.menu_selected));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_popup(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let popup = popup_area(area, 60, 80);
        frame.render_widget(Clear, popup);
        frame.render_widget(
            Paragraph::new(uidata.popup_message.clone()).block(Block::bordered().title(" Help ")),
            popup,
        );
    }

    fn draw_cmdline(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        if uidata.active_cmdinput {
            let prompt = match uidata.cmd_mode {
                Some(CMDMode::EditCell) => "edit: ",
                Some(CMDMode::ExportPath) => "export: ",
                Some(CMDMode::OpenFile) => "open: ",
                None => ": ",
            };
            frame.render_widget(
                Paragraph::new(format!("{}{}", prompt, uidata.cmdinput.input)),
                area,
            );
            let x = area.x + (prompt.chars().count() + uidata.cmdinput.curser_pos) as u16;
            frame.set_cursor_position(Position::new(
                x.min(area.right().saturating_sub(1)),
                area.y,
            ));
        } else {
            let status = format!(
                "{} [{}/{}]  {}",
                uidata.name,
                if uidata.nrows == 0 {
                    0
                } else {
                    uidata.abs_selected_row + 1
                },
                uidata.nrows,
                uidata.status_message,
            );
            frame.render_widget(Paragraph::new(status).style(Style::new().dim()), area);
        }
    }
}

/// Centered sub-area used for popups.
fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::vertical([Constraint::Percentage(percent_y)]).flex(Flex::Center);
    let horizontal = Layout::horizontal([Constraint::Percentage(percent_x)]).flex(Flex::Center);
    let [area] = vertical.areas(area);
    let [area] = horizontal.areas(area);
    area
}
