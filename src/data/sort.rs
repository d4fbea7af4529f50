use std::cmp::Ordering;

use super::model::{CellValue, Dataset};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            SortDirection::Ascending => "⏶",
            SortDirection::Descending => "⏷",
        }
    }
}

/// Single-column ordering directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub column: usize,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn ascending(column: usize) -> Self {
        Self {
            column,
            direction: SortDirection::Ascending,
        }
    }

    /// Clicking the same column flips direction; a new column starts ascending.
    pub fn clicked(current: Option<SortSpec>, column: usize) -> SortSpec {
        match current {
            Some(spec) if spec.column == column => SortSpec {
                column,
                direction: spec.direction.toggled(),
            },
            _ => SortSpec::ascending(column),
        }
    }

    /// Compare two cells. Missing cells sort last in both directions.
    fn compare(&self, a: &CellValue, b: &CellValue) -> Ordering {
        match (a.is_missing(), b.is_missing()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => match self.direction {
                SortDirection::Ascending => a.sort_cmp(b),
                SortDirection::Descending => b.sort_cmp(a),
            },
        }
    }
}

/// Stable sort of `indices` (row indices into `dataset`) by `spec.column`.
pub fn sort_indices(dataset: &Dataset, indices: &mut [usize], spec: SortSpec) {
    if spec.column >= dataset.column_count() {
        log::warn!("Sort column {} out of range, keeping order", spec.column);
        return;
    }
    indices.sort_by(|&a, &b| {
        let (Some(ca), Some(cb)) = (dataset.cell(a, spec.column), dataset.cell(b, spec.column))
        else {
            return Ordering::Equal;
        };
        spec.compare(ca, cb)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn column(values: &[CellValue]) -> Dataset {
        Dataset {
            source: "test".into(),
            headers: vec!["v".into(), "pos".into()],
            rows: values
                .iter()
                .enumerate()
                .map(|(i, v)| vec![v.clone(), CellValue::Number(i as f64)])
                .collect(),
        }
    }

    fn sorted(ds: &Dataset, spec: SortSpec) -> Vec<usize> {
        let mut idx: Vec<usize> = (0..ds.len()).collect();
        sort_indices(ds, &mut idx, spec);
        idx
    }

    #[test]
    fn numbers_sort_numerically_not_lexically() {
        let ds = column(&[
            CellValue::Number(10.0),
            CellValue::Number(9.0),
            CellValue::Number(100.0),
        ]);
        assert_eq!(sorted(&ds, SortSpec::ascending(0)), vec![1, 0, 2]);
    }

    #[test]
    fn missing_cells_stay_last_when_descending() {
        let ds = column(&[
            CellValue::Missing,
            CellValue::Number(1.0),
            CellValue::Text("loader".into()),
            CellValue::Number(5.0),
        ]);
        let desc = SortSpec {
            column: 0,
            direction: SortDirection::Descending,
        };
        assert_eq!(sorted(&ds, desc), vec![2, 3, 1, 0]);
        assert_eq!(sorted(&ds, SortSpec::ascending(0)), vec![1, 3, 2, 0]);
    }

    #[test]
    fn numeric_text_sorts_by_value() {
        let ds = column(&[
            CellValue::from_text("010"),
            CellValue::from_text("9"),
            CellValue::from_text("1.50"),
            CellValue::from_text("1e3"),
        ]);
        assert_eq!(sorted(&ds, SortSpec::ascending(0)), vec![2, 1, 0, 3]);
    }

    #[test]
    fn ties_keep_dataset_order() {
        let ds = column(&[
            CellValue::Text("b".into()),
            CellValue::Text("a".into()),
            CellValue::Text("B".into()),
            CellValue::Text("a".into()),
        ]);
        assert_eq!(sorted(&ds, SortSpec::ascending(0)), vec![1, 3, 2, 0]);
    }

    #[test]
    fn header_click_toggles_direction() {
        let first = SortSpec::clicked(None, 2);
        assert_eq!(first, SortSpec::ascending(2));
        let second = SortSpec::clicked(Some(first), 2);
        assert_eq!(second.direction, SortDirection::Descending);
        assert_eq!(SortSpec::clicked(Some(second), 0), SortSpec::ascending(0));
    }

    proptest! {
        #[test]
        fn toggled_direction_reverses_without_ties(values in prop::collection::btree_set(-1000i32..1000, 0..40)) {
            // Shuffle deterministically so input order differs from sorted order.
            let mut cells: Vec<CellValue> = values.iter().map(|&v| CellValue::Number(v as f64)).collect();
            cells.reverse();
            let third = cells.len() / 3;
            cells.rotate_left(third);
            let ds = column(&cells);

            let asc = sorted(&ds, SortSpec::ascending(0));
            let mut desc = sorted(&ds, SortSpec { column: 0, direction: SortDirection::Descending });
            desc.reverse();
            prop_assert_eq!(asc, desc);
        }
    }
}
