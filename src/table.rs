//! Plain-text grid rendering for previews and cluster listings.

use std::fmt::Write as _;

use crate::{cluster::Cluster, data::Value, dataset::Table};

const COLUMN_GAP: &str = "  ";
const MIN_RULE: usize = 3;

/// Renders `headers` over `rows`, left-aligned, with a dashed rule under the
/// header. Cells beyond the header width are ignored.
pub fn render_grid(headers: &[String], rows: &[Vec<String>]) -> String {
    let cleaned_rows = rows
        .iter()
        .map(|row| row.iter().take(headers.len()).map(|cell| flatten(cell)).collect())
        .collect::<Vec<Vec<String>>>();
    let mut widths = headers
        .iter()
        .map(|header| header.chars().count().max(MIN_RULE))
        .collect::<Vec<_>>();
    for row in &cleaned_rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "{}", line(headers, &widths));
    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(out, "{}", line(&rule, &widths));
    for row in &cleaned_rows {
        let _ = writeln!(out, "{}", line(row, &widths));
    }
    out
}

/// First `limit` rows of a table, nulls shown empty.
pub fn render_frame(table: &Table, limit: usize) -> String {
    let rows = table
        .rows()
        .iter()
        .take(limit)
        .map(|row| row.iter().map(Value::as_display).collect())
        .collect::<Vec<_>>();
    render_grid(table.columns(), &rows)
}

/// One line per proposed cluster: index, member count, key and members.
pub fn render_clusters(clusters: &[Cluster]) -> String {
    let headers = ["#", "count", "key", "values"].map(String::from);
    let rows = clusters
        .iter()
        .enumerate()
        .map(|(idx, cluster)| {
            vec![
                idx.to_string(),
                cluster.count.to_string(),
                cluster.key.clone(),
                cluster.values.join(" | "),
            ]
        })
        .collect::<Vec<_>>();
    render_grid(&headers, &rows)
}

fn line(cells: &[String], widths: &[usize]) -> String {
    let mut out = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join(COLUMN_GAP);
    out.truncate(out.trim_end().len());
    out
}

/// Control characters would break the grid.
fn flatten(cell: &str) -> String {
    cell.chars()
        .map(|ch| if ch.is_control() { ' ' } else { ch })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_pads_columns_and_trims_line_ends() {
        let headers = vec!["id".to_string(), "name".to_string()];
        let rows = vec![
            vec!["1".to_string(), "Ada".to_string()],
            vec!["10".to_string(), "line\nbreak".to_string()],
        ];
        let rendered = render_grid(&headers, &rows);
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "id   name");
        assert_eq!(lines[1], "---  ----------");
        assert_eq!(lines[2], "1    Ada");
        assert_eq!(lines[3], "10   line break");
    }

    #[test]
    fn cluster_listing_numbers_each_cluster() {
        let clusters = vec![Cluster {
            key: "usa".into(),
            values: vec!["USA".into(), "usa".into()],
            count: 2,
        }];
        let rendered = render_clusters(&clusters);
        assert!(rendered.lines().nth(2).unwrap().starts_with("0    2      usa  USA | usa"));
    }
}
