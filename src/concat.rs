use log::debug;

use crate::{
    data::{Cell, Value},
    error::{TableError, TableResult},
    table::Table,
};

pub const DEFAULT_SOURCE_COLUMN: &str = "source";

/// Stacks tables that share one header, in order.
///
/// When `tag` is set, a column of that name is prepended holding each row's
/// source label (the table's `source`, or its ordinal when it has none).
pub fn concat(tables: Vec<Table>, tag: Option<&str>) -> TableResult<Table> {
    let mut tables = tables.into_iter().enumerate();
    let Some((_, first)) = tables.next() else {
        return Ok(Table::default());
    };
    let baseline = first.header.clone();
    let mut rows = Vec::with_capacity(first.len());
    append_rows(&mut rows, first, 0, tag.is_some());
    for (ordinal, table) in tables {
        if table.header != baseline {
            return Err(TableError::SchemaMismatch {
                expected: baseline,
                found: table.header,
            });
        }
        debug!(
            "Appending {} row(s) from {}",
            table.len(),
            table.source.as_deref().unwrap_or("unnamed input")
        );
        append_rows(&mut rows, table, ordinal, tag.is_some());
    }

    let header = match tag {
        Some(name) => std::iter::once(name.to_string()).chain(baseline).collect(),
        None => baseline,
    };
    Ok(Table::new(header, rows))
}

fn append_rows(rows: &mut Vec<Vec<Cell>>, table: Table, ordinal: usize, tagged: bool) {
    if !tagged {
        rows.extend(table.rows);
        return;
    }
    let label: Cell = Some(match table.source {
        Some(source) => Value::String(source),
        None => Value::Integer(ordinal as i64),
    });
    rows.extend(table.rows.into_iter().map(|row| {
        let mut tagged_row = Vec::with_capacity(row.len() + 1);
        tagged_row.push(label.clone());
        tagged_row.extend(row);
        tagged_row
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(header: &[&str], rows: &[&[&str]]) -> Table {
        Table::new(
            header.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|s| Some(Value::from(*s))).collect())
                .collect(),
        )
    }

    #[test]
    fn concatenates_rows_in_input_order() {
        let joined = concat(
            vec![table(&["a"], &[&["1"], &["2"]]), table(&["a"], &[&["3"]])],
            None,
        )
        .expect("concat");
        assert_eq!(joined.header, vec!["a"]);
        assert_eq!(joined.len(), 3);
        assert_eq!(joined.rows[2], vec![Some(Value::from("3"))]);
    }

    #[test]
    fn header_mismatch_names_both_headers() {
        let err = concat(vec![table(&["a", "b"], &[]), table(&["a", "c"], &[])], None).unwrap_err();
        assert_eq!(
            err,
            TableError::SchemaMismatch {
                expected: vec!["a".into(), "b".into()],
                found: vec!["a".into(), "c".into()],
            }
        );
    }

    #[test]
    fn tagging_prepends_the_source_label() {
        let first = table(&["a"], &[&["1"]]).with_source("one.tsv");
        let second = table(&["a"], &[&["2"]]);
        let joined = concat(vec![first, second], Some("from")).expect("concat");
        assert_eq!(joined.header, vec!["from", "a"]);
        assert_eq!(
            joined.rows,
            vec![
                vec![Some(Value::from("one.tsv")), Some(Value::from("1"))],
                vec![Some(Value::Integer(1)), Some(Value::from("2"))],
            ]
        );
    }

    #[test]
    fn empty_input_list_yields_an_empty_table() {
        assert_eq!(concat(Vec::new(), None).unwrap(), Table::default());
    }
}
