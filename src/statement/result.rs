use crate::core::{Row, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Value of `column` in row `row`, if both exist
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }

    /// Aligned text table: header, separator, rows, row count
    pub fn render(&self) -> String {
        if self.columns.is_empty() {
            return "Empty result set\n".to_string();
        }

        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.len()).collect();
        for row in &self.rows {
            for (i, value) in row.iter().enumerate() {
                if let Some(width) = widths.get_mut(i) {
                    *width = (*width).max(value.to_string().len());
                }
            }
        }

        let mut out = String::new();
        let header: Vec<String> = self
            .columns
            .iter()
            .zip(&widths)
            .map(|(col, width)| format!("{:width$}", col, width = width))
            .collect();
        out.push_str(header.join(" | ").trim_end());
        out.push('\n');

        let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        out.push_str(&separator.join("-+-"));
        out.push('\n');

        for row in &self.rows {
            let cells: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(val, width)| format!("{:width$}", val.to_string(), width = width))
                .collect();
            out.push_str(cells.join(" | ").trim_end());
            out.push('\n');
        }

        out.push_str(&format!("({} row(s))\n", self.rows.len()));
        out
    }

    pub fn print(&self) {
        print!("{}", self.render());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_by_column_name() {
        let result = QueryResult::new(
            vec!["college_id".into(), "avg_age".into()],
            vec![vec![Value::Integer(1), Value::Float(20.0)]],
        );
        assert_eq!(result.get(0, "avg_age"), Some(&Value::Float(20.0)));
        assert_eq!(result.get(1, "avg_age"), None);
        assert_eq!(result.get(0, "missing"), None);
    }

    #[test]
    fn test_render_aligns_columns() {
        let result = QueryResult::new(
            vec!["id".into(), "name".into()],
            vec![
                vec![Value::Integer(1), Value::Text("Alice".into())],
                vec![Value::Integer(22), Value::Null],
            ],
        );
        let text = result.render();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "id | name");
        assert_eq!(lines[1], "---+------");
        assert_eq!(lines[2], "1  | Alice");
        assert_eq!(lines[4], "(2 row(s))");
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(QueryResult::empty().render(), "Empty result set\n");
    }
}
