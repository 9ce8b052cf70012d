use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ratatui::style::Color;
use tracing::{debug, trace};

use crate::domain::TCConfig;
use crate::freq::{self, FrequencyMap};
use crate::table::Table;

/// Fresh uniform-random fully opaque color per call.
pub struct ColorGen {
    rng: StdRng,
}

impl ColorGen {
    pub fn new() -> Self {
        ColorGen {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic generator, for tests.
    pub fn with_seed(seed: u64) -> Self {
        ColorGen {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn next(&mut self) -> Color {
        Color::Rgb(
            self.rng.gen_range(0..=u8::MAX),
            self.rng.gen_range(0..=u8::MAX),
            self.rng.gen_range(0..=u8::MAX),
        )
    }
}

impl Default for ColorGen {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// No distinct values, no chart at all
    Skip,
    /// Rendered as soon as the chart pass is built
    Immediate,
    /// Rendered only on explicit selection from the menu
    Deferred,
}

/// A column with exactly `threshold` distinct values still charts
/// immediately, one more defers it.
pub fn classify(map: &FrequencyMap, threshold: usize) -> Eligibility {
    if map.is_empty() {
        Eligibility::Skip
    } else if map.len() <= threshold {
        Eligibility::Immediate
    } else {
        Eligibility::Deferred
    }
}

/// Position-aligned chart data: index i of all three vectors describes the
/// same distinct value.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartInput {
    pub labels: Vec<String>,
    pub values: Vec<u64>,
    pub colors: Vec<Color>,
}

/// Shorten a legend label to `width` characters, marking the cut with `...`.
/// Also used for grid column headers.
pub fn truncate_label(label: &str, width: usize) -> String {
    if width < 3 {
        return String::new();
    }
    if label.chars().count() > width {
        let mut reduced: String = label.chars().take(width - 3).collect();
        reduced.push_str("...");
        reduced
    } else {
        label.to_string()
    }
}

/// Turn one frequency map into chart data, drawing one fresh color per
/// distinct value. Ordered by count descending so the biggest slice
/// renders first.
pub fn to_chart_input(
    map: &FrequencyMap,
    colors: &mut ColorGen,
    max_label_width: usize,
) -> ChartInput {
    let entries = map.sorted_entries();
    let mut input = ChartInput {
        labels: Vec::with_capacity(entries.len()),
        values: Vec::with_capacity(entries.len()),
        colors: Vec::with_capacity(entries.len()),
    };
    for (value, count) in entries {
        input.labels.push(truncate_label(&value, max_label_width));
        input.values.push(count as u64);
        input.colors.push(colors.next());
    }
    input
}

/// One column of a chart pass: its frequency map, its classification and,
/// once rendered, its chart data.
pub struct ColumnChartEntry {
    pub column: String,
    pub map: FrequencyMap,
    pub eligibility: Eligibility,
    chart: Option<ChartInput>,
}

impl ColumnChartEntry {
    pub fn distinct(&self) -> usize {
        self.map.len()
    }

    pub fn chart(&self) -> Option<&ChartInput> {
        self.chart.as_ref()
    }

    /// Build the chart data for a deferred column. Afterwards the entry no
    /// longer shows up in the menu.
    pub fn render(&mut self, colors: &mut ColorGen, max_label_width: usize) -> &ChartInput {
        if self.chart.is_none() {
            trace!("Rendering deferred chart for column \"{}\"", self.column);
            self.chart = Some(to_chart_input(&self.map, colors, max_label_width));
        }
        self.chart.as_ref().unwrap()
    }

    /// Menu text for a deferred column, e.g. `country (42 entries)`.
    pub fn menu_label(&self) -> String {
        format!("{} ({} entries)", self.column, self.distinct())
    }
}

/// One full chart-build pass over the current grid data:
/// rows -> frequency maps -> classified entries -> chart inputs.
///
/// The pass owns its data. It is not updated when the grid is edited,
/// a new pass has to be built instead.
pub struct ChartPass {
    pub entries: Vec<ColumnChartEntry>,
}

impl ChartPass {
    pub fn build(table: &Table, config: &TCConfig, colors: &mut ColorGen) -> Self {
        let maps = freq::aggregate(table.schema(), table.rows());
        let entries = maps
            .into_iter()
            .map(|(column, map)| {
                let eligibility = classify(&map, config.chart_threshold);
                let chart = match eligibility {
                    Eligibility::Immediate => {
                        Some(to_chart_input(&map, colors, config.max_label_width))
                    }
                    Eligibility::Skip | Eligibility::Deferred => None,
                };
                trace!(
                    "Column \"{}\": {} distinct values, {:?}",
                    column,
                    map.len(),
                    eligibility
                );
                ColumnChartEntry {
                    column,
                    map,
                    eligibility,
                    chart,
                }
            })
            .collect::<Vec<ColumnChartEntry>>();

        debug!(
            "Chart pass over {} columns: {} immediate, {} deferred",
            entries.len(),
            entries
                .iter()
                .filter(|e| e.eligibility == Eligibility::Immediate)
                .count(),
            entries
                .iter()
                .filter(|e| e.eligibility == Eligibility::Deferred)
                .count(),
        );
        ChartPass { entries }
    }

    /// Indices of entries that have chart data, in schema order. Deferred
    /// entries join this set once rendered.
    pub fn viewable(&self) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.chart.is_some())
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Menu of deferred columns that have not been rendered yet.
    pub fn deferred_menu(&self) -> Vec<(usize, String)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.eligibility == Eligibility::Deferred && e.chart.is_none())
            .map(|(idx, e)| (idx, e.menu_label()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_with(values: &[&str]) -> FrequencyMap {
        let mut map = FrequencyMap::default();
        for v in values {
            map.record(v);
        }
        map
    }

    fn singleton_map(n: usize) -> FrequencyMap {
        let mut map = FrequencyMap::default();
        for i in 0..n {
            map.record(&format!("v{i}"));
        }
        map
    }

    #[test]
    fn classify_boundaries() {
        assert_eq!(classify(&singleton_map(0), 10), Eligibility::Skip);
        assert_eq!(classify(&singleton_map(1), 10), Eligibility::Immediate);
        assert_eq!(classify(&singleton_map(10), 10), Eligibility::Immediate);
        assert_eq!(classify(&singleton_map(11), 10), Eligibility::Deferred);
    }

    #[test]
    fn classify_with_custom_threshold() {
        assert_eq!(classify(&singleton_map(1), 1), Eligibility::Immediate);
        assert_eq!(classify(&singleton_map(2), 1), Eligibility::Deferred);
    }

    #[test]
    fn chart_input_arrays_are_aligned() {
        let map = map_with(&["red", "blue", "red", "green"]);
        let mut colors = ColorGen::with_seed(7);
        let input = to_chart_input(&map, &mut colors, 23);

        assert_eq!(input.labels.len(), 3);
        assert_eq!(input.values.len(), input.labels.len());
        assert_eq!(input.colors.len(), input.labels.len());
        for (i, label) in input.labels.iter().enumerate() {
            assert_eq!(input.values[i], map.count(label) as u64);
        }
        // Biggest slice first
        assert_eq!(input.labels[0], "red");
        assert_eq!(input.values[0], 2);
    }

    #[test]
    fn empty_map_yields_empty_input() {
        let mut colors = ColorGen::with_seed(1);
        let input = to_chart_input(&FrequencyMap::default(), &mut colors, 23);
        assert!(input.labels.is_empty());
        assert!(input.values.is_empty());
        assert!(input.colors.is_empty());
    }

    #[test]
    fn labels_truncate_at_max_width() {
        assert_eq!(truncate_label("short", 23), "short");
        let long = "a".repeat(30);
        let cut = truncate_label(&long, 23);
        assert_eq!(cut.chars().count(), 23);
        assert!(cut.ends_with("..."));
        assert_eq!(cut, format!("{}...", "a".repeat(20)));
        assert_eq!(truncate_label("abcdef", 2), "");
    }

    #[test]
    fn colors_are_rgb_and_freshly_drawn() {
        let mut colors = ColorGen::with_seed(42);
        let drawn: Vec<Color> = (0..16).map(|_| colors.next()).collect();
        for c in &drawn {
            assert!(matches!(c, Color::Rgb(_, _, _)));
        }
        // A fresh draw per call, so 16 draws from one seed are not all equal
        assert!(drawn.iter().any(|c| c != &drawn[0]));
        // Same seed replays the same sequence
        let mut replay = ColorGen::with_seed(42);
        let again: Vec<Color> = (0..16).map(|_| replay.next()).collect();
        assert_eq!(drawn, again);
    }

    #[test]
    fn pass_partitions_columns() {
        let schema = vec!["mono".to_string(), "wide".to_string(), "void".to_string()];
        let rows: Vec<Vec<String>> = (0..11)
            .map(|i| vec!["same".to_string(), format!("v{i}"), String::new()])
            .collect();
        let table = Table::from_parts("t", schema, rows);

        let config = TCConfig::default();
        let mut colors = ColorGen::with_seed(3);
        let mut pass = ChartPass::build(&table, &config, &mut colors);

        assert_eq!(pass.entries[0].eligibility, Eligibility::Immediate);
        assert_eq!(pass.entries[1].eligibility, Eligibility::Deferred);
        assert_eq!(pass.entries[2].eligibility, Eligibility::Skip);

        assert_eq!(pass.viewable(), vec![0]);
        let menu = pass.deferred_menu();
        assert_eq!(menu.len(), 1);
        assert_eq!(menu[0].1, "wide (11 entries)");

        // Rendering a deferred entry consumes its menu entry
        pass.entries[1].render(&mut colors, config.max_label_width);
        assert!(pass.deferred_menu().is_empty());
        assert_eq!(pass.viewable(), vec![0, 1]);
        assert_eq!(pass.entries[1].chart().unwrap().labels.len(), 11);
    }
}
