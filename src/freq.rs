use std::collections::HashMap;

/// Occurrence counts of the distinct non-empty values of one column.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FrequencyMap {
    counts: HashMap<String, usize>,
}

impl FrequencyMap {
    /// Count one cell value. Empty cells hold no information and are skipped.
    pub fn record(&mut self, value: &str) {
        if !value.is_empty() {
            *self.counts.entry(value.to_string()).or_insert(0) += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn count(&self, value: &str) -> usize {
        self.counts.get(value).copied().unwrap_or(0)
    }

    /// Sum of all counts, i.e. the number of non-empty cells seen.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Entries ordered by count descending, ties broken by value so the
    /// ordering is stable between calls on the same map.
    pub fn sorted_entries(&self) -> Vec<(String, usize)> {
        let mut entries: Vec<(String, usize)> = self
            .counts
            .iter()
            .map(|(v, c)| (v.clone(), *c))
            .collect();
        entries.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries
    }
}

/// Build one FrequencyMap per column, returned in schema order.
///
/// Every column gets an entry, even when all its cells are empty. Rows
/// shorter than the schema are tolerated, the missing cells are simply
/// not counted.
pub fn aggregate(schema: &[String], rows: &[Vec<String>]) -> Vec<(String, FrequencyMap)> {
    let mut maps: Vec<(String, FrequencyMap)> = schema
        .iter()
        .map(|name| (name.clone(), FrequencyMap::default()))
        .collect();

    for row in rows {
        for (cidx, (_, map)) in maps.iter_mut().enumerate() {
            if let Some(value) = row.get(cidx) {
                map.record(value);
            }
        }
    }
    maps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(values: &[&[&str]]) -> Vec<Vec<String>> {
        values
            .iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    fn schema(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn counts_values_and_skips_empty_cells() {
        let maps = aggregate(
            &schema(&["color"]),
            &rows(&[&["red"], &["blue"], &["red"], &[""]]),
        );
        assert_eq!(maps.len(), 1);
        let (name, map) = &maps[0];
        assert_eq!(name, "color");
        assert_eq!(map.count("red"), 2);
        assert_eq!(map.count("blue"), 1);
        assert_eq!(map.count(""), 0);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn every_column_gets_a_map() {
        let maps = aggregate(&schema(&["a", "b", "c"]), &rows(&[]));
        let names: Vec<&str> = maps.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(maps.iter().all(|(_, m)| m.is_empty()));
    }

    #[test]
    fn total_equals_rows_minus_empty_cells() {
        let data = rows(&[&["x", "1"], &["", "2"], &["x", ""], &["y", "2"]]);
        let maps = aggregate(&schema(&["k", "v"]), &data);
        // column k: one empty cell out of four rows
        assert_eq!(maps[0].1.total(), 3);
        // column v: one empty cell out of four rows
        assert_eq!(maps[1].1.total(), 3);
    }

    #[test]
    fn short_rows_are_tolerated() {
        let maps = aggregate(&schema(&["a", "b"]), &rows(&[&["1"], &["2", "3"]]));
        assert_eq!(maps[0].1.total(), 2);
        assert_eq!(maps[1].1.total(), 1);
    }

    #[test]
    fn values_compare_byte_exact() {
        let maps = aggregate(
            &schema(&["c"]),
            &rows(&[&["Red"], &["red"], &["red "]]),
        );
        assert_eq!(maps[0].1.len(), 3);
    }

    #[test]
    fn sorted_entries_order_by_count_then_value() {
        let mut map = FrequencyMap::default();
        for v in ["b", "a", "b", "c", "a", "b"] {
            map.record(v);
        }
        assert_eq!(
            map.sorted_entries(),
            vec![
                ("b".to_string(), 3),
                ("a".to_string(), 2),
                ("c".to_string(), 1)
            ]
        );
    }
}
