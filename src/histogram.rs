use std::collections::HashMap;

use crate::{
    data::{Cell, Value},
    table::Table,
};

pub const COUNT_COLUMN: &str = "count";

/// Groups rows by the values at `columns` and appends a trailing `count` column.
///
/// Each group keeps up to `max_exemplars` first-seen rows. With a single
/// exemplar, groups are ordered by ascending count (ties keep first-seen
/// order); otherwise groups stay in first-seen order.
pub fn apply_histogram(table: &mut Table, columns: &[usize], max_exemplars: usize) {
    let mut accumulator = HistogramAccumulator::new(columns, max_exemplars);
    for row in table.rows.drain(..) {
        accumulator.ingest(row);
    }
    table.rows = accumulator.render_rows();
    table.header.push(COUNT_COLUMN.to_string());
}

struct HistogramAccumulator {
    columns: Vec<usize>,
    max_exemplars: usize,
    positions: HashMap<Vec<Cell>, usize>,
    groups: Vec<Group>,
}

struct Group {
    exemplars: Vec<Vec<Cell>>,
    count: usize,
}

impl HistogramAccumulator {
    fn new(columns: &[usize], max_exemplars: usize) -> Self {
        Self {
            columns: columns.to_vec(),
            max_exemplars: max_exemplars.max(1),
            positions: HashMap::new(),
            groups: Vec::new(),
        }
    }

    fn ingest(&mut self, row: Vec<Cell>) {
        let key = self
            .columns
            .iter()
            .map(|idx| row[*idx].clone())
            .collect::<Vec<_>>();
        let position = match self.positions.get(&key) {
            Some(position) => *position,
            None => {
                self.groups.push(Group {
                    exemplars: Vec::new(),
                    count: 0,
                });
                self.positions.insert(key, self.groups.len() - 1);
                self.groups.len() - 1
            }
        };
        let group = &mut self.groups[position];
        group.count += 1;
        if group.exemplars.len() < self.max_exemplars {
            group.exemplars.push(row);
        }
    }

    fn render_rows(mut self) -> Vec<Vec<Cell>> {
        if self.max_exemplars == 1 {
            self.groups.sort_by_key(|group| group.count);
        }
        self.groups
            .into_iter()
            .flat_map(|group| {
                let count = Some(Value::Integer(group.count as i64));
                group.exemplars.into_iter().map(move |mut row| {
                    row.push(count.clone());
                    row
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(k: &str, v: i64) -> Vec<Cell> {
        vec![Some(Value::from(k)), Some(Value::Integer(v))]
    }

    fn sample() -> Table {
        Table::new(
            vec!["k".to_string(), "v".to_string()],
            vec![row("a", 1), row("b", 2), row("a", 3), row("c", 4), row("a", 5)],
        )
    }

    fn counts(table: &Table) -> Vec<(String, i64)> {
        table
            .rows
            .iter()
            .map(|r| match (&r[0], r.last()) {
                (Some(k), Some(Some(Value::Integer(c)))) => (k.as_display(), *c),
                other => panic!("unexpected row {other:?}"),
            })
            .collect()
    }

    #[test]
    fn single_exemplar_orders_groups_by_ascending_count() {
        let mut table = sample();
        apply_histogram(&mut table, &[0], 1);
        assert_eq!(table.header, vec!["k", "v", "count"]);
        assert_eq!(
            counts(&table),
            vec![("b".into(), 1), ("c".into(), 1), ("a".into(), 3)]
        );
        // first-seen exemplar is retained
        assert_eq!(table.rows[2][1], Some(Value::Integer(1)));
    }

    #[test]
    fn multiple_exemplars_keep_first_seen_group_order() {
        let mut table = sample();
        apply_histogram(&mut table, &[0], 2);
        assert_eq!(
            counts(&table),
            vec![
                ("a".into(), 3),
                ("a".into(), 3),
                ("b".into(), 1),
                ("c".into(), 1)
            ]
        );
        assert_eq!(table.rows[1][1], Some(Value::Integer(3)));
    }

    #[test]
    fn absent_values_form_their_own_group() {
        let mut table = Table::new(
            vec!["k".to_string()],
            vec![vec![None], vec![Some(Value::from("x"))], vec![None]],
        );
        apply_histogram(&mut table, &[0], 1);
        assert_eq!(
            table.rows,
            vec![
                vec![Some(Value::from("x")), Some(Value::Integer(1))],
                vec![None, Some(Value::Integer(2))],
            ]
        );
    }
}
