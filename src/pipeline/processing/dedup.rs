use std::cmp::Ordering;

use crate::pipeline::table::TrialTable;

/// Result of collapsing duplicate keys
#[derive(Debug, Clone, PartialEq)]
pub struct DedupOutcome {
    pub table: TrialTable,
    /// Rows dropped because an earlier row in their key group was kept
    pub removed: usize,
}

/// Keep one row per key, preferring the most complete row of each group.
///
/// Rows are stable-sorted by key ascending (missing keys last, forming a
/// single group) and then by completeness descending, and the first row of
/// each group survives. Ties on completeness go to the row seen first. The
/// output is in key order. When `key` is not a column the table is returned
/// unchanged.
pub fn dedupe(table: TrialTable, key: &str) -> DedupOutcome {
    let Some(key_idx) = table.column_index(key) else {
        return DedupOutcome { table, removed: 0 };
    };

    let rows = table.rows();
    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.sort_by(|&a, &b| {
        compare_keys(rows[a][key_idx].as_deref(), rows[b][key_idx].as_deref())
            .then_with(|| table.completeness(b).cmp(&table.completeness(a)))
    });

    let mut kept = Vec::with_capacity(order.len());
    let mut previous: Option<Option<&str>> = None;
    for idx in order {
        let current = rows[idx][key_idx].as_deref();
        if previous != Some(current) {
            kept.push(idx);
            previous = Some(current);
        }
    }

    let removed = rows.len() - kept.len();
    DedupOutcome {
        table: table.select_rows(&kept),
        removed,
    }
}

fn compare_keys(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn cell(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    fn table(rows: Vec<Vec<Option<String>>>) -> TrialTable {
        TrialTable::from_rows(
            vec!["NCT Number".into(), "Study Title".into(), "Sponsor".into()],
            rows,
        )
        .unwrap()
    }

    #[test]
    fn test_keeps_most_complete_row_per_key() {
        let input = table(vec![
            vec![cell("NCT00000002"), cell("Sparse"), None],
            vec![cell("NCT00000001"), cell("Only"), None],
            vec![cell("NCT00000002"), cell("Full"), cell("NIH")],
        ]);

        let outcome = dedupe(input, "NCT Number");

        assert_eq!(outcome.removed, 1);
        assert_eq!(outcome.table.len(), 2);
        let titles: Vec<_> = outcome.table.column("Study Title").unwrap().collect();
        assert_eq!(titles, vec![Some("Only"), Some("Full")]);
    }

    #[test]
    fn test_ties_go_to_first_seen_row() {
        let input = table(vec![
            vec![cell("NCT00000001"), cell("First"), None],
            vec![cell("NCT00000001"), cell("Second"), None],
        ]);

        let outcome = dedupe(input, "NCT Number");

        assert_eq!(outcome.removed, 1);
        let titles: Vec<_> = outcome.table.column("Study Title").unwrap().collect();
        assert_eq!(titles, vec![Some("First")]);
    }

    #[test]
    fn test_missing_keys_sort_last_and_collapse() {
        let input = table(vec![
            vec![None, cell("No id A"), None],
            vec![cell("NCT00000005"), cell("Five"), None],
            vec![None, cell("No id B"), cell("NIH")],
        ]);

        let outcome = dedupe(input, "NCT Number");

        assert_eq!(outcome.removed, 1);
        let ids: Vec<_> = outcome.table.column("NCT Number").unwrap().collect();
        assert_eq!(ids, vec![Some("NCT00000005"), None]);
        let titles: Vec<_> = outcome.table.column("Study Title").unwrap().collect();
        assert_eq!(titles[1], Some("No id B"));
    }

    #[test]
    fn test_keys_unique_and_never_grows() {
        let input = table(vec![
            vec![cell("NCT00000003"), None, None],
            vec![cell("NCT00000001"), None, None],
            vec![cell("NCT00000003"), cell("t"), None],
            vec![cell("NCT00000002"), None, None],
            vec![cell("NCT00000001"), None, cell("s")],
        ]);
        let before = input.len();

        let outcome = dedupe(input, "NCT Number");

        assert!(outcome.table.len() <= before);
        assert_eq!(outcome.table.len() + outcome.removed, before);
        let ids: Vec<_> = outcome.table.column("NCT Number").unwrap().collect();
        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
        assert_eq!(
            ids,
            vec![Some("NCT00000001"), Some("NCT00000002"), Some("NCT00000003")]
        );
    }

    #[test]
    fn test_missing_key_column_is_a_no_op() {
        let input = table(vec![
            vec![cell("NCT00000001"), None, None],
            vec![cell("NCT00000001"), None, None],
        ]);
        let expected = input.clone();

        let outcome = dedupe(input, "Trial Id");

        assert_eq!(outcome.removed, 0);
        assert_eq!(outcome.table, expected);
    }
}
