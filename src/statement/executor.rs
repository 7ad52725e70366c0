// ============================================================================
// Statement Executor
// ============================================================================
//
// Runs a bound statement directly against storage. Mutations return the
// changes they made so the caller can record them in the open transaction;
// a mutation that fails on its n-th row undoes rows 1..n-1 before returning.
//
// ============================================================================

use super::plan::{Aggregate, AggregateFunction, Delete, Insert, Param, Predicate, Select, Update};
use super::{QueryResult, Statement};
use crate::core::{DbError, Result, Row, Value};
use crate::storage::{Catalog, InMemoryStorage, TableSchema};
use crate::transaction::Change;
use std::collections::BTreeMap;
use tracing::trace;

static NULL: Value = Value::Null;

/// Execute a statement and return (affected rows, changes made)
pub fn execute(
    storage: &mut InMemoryStorage,
    catalog: &Catalog,
    stmt: &Statement,
    args: &[Value],
) -> Result<(u64, Vec<Change>)> {
    trace!(statement = %stmt, args = args.len(), "execute");
    match stmt {
        Statement::Insert(plan) => insert(storage, catalog, plan, args),
        Statement::Update(plan) => update(storage, catalog, plan, args),
        Statement::Delete(plan) => delete(storage, catalog, plan, args),
        Statement::Select(_) | Statement::Aggregate(_) => {
            let result = query(storage, stmt, args)?;
            Ok((result.row_count() as u64, Vec::new()))
        }
    }
}

/// Run a read-only statement
pub fn query(storage: &InMemoryStorage, stmt: &Statement, args: &[Value]) -> Result<QueryResult> {
    trace!(statement = %stmt, args = args.len(), "query");
    match stmt {
        Statement::Select(plan) => select(storage, plan, args),
        Statement::Aggregate(plan) => aggregate(storage, plan, args),
        _ => Err(DbError::ExecutionError(format!(
            "Statement on '{}' does not return rows",
            stmt.table()
        ))),
    }
}

fn bind(args: &[Value], param: Param) -> Result<&Value> {
    args.get(param.0).ok_or_else(|| {
        DbError::ExecutionError(format!("No value bound for parameter {}", param))
    })
}

// ----------------------------------------------------------------------------
// Column resolution
// ----------------------------------------------------------------------------

/// (table, column) for each position of the rows a statement sees
struct Layout {
    columns: Vec<(String, String)>,
}

impl Layout {
    fn of(schema: &TableSchema) -> Self {
        let table = schema.name().to_string();
        Self {
            columns: schema
                .schema()
                .column_names()
                .into_iter()
                .map(|c| (table.clone(), c))
                .collect(),
        }
    }

    fn append(mut self, other: Layout) -> Self {
        self.columns.extend(other.columns);
        self
    }

    fn width(&self) -> usize {
        self.columns.len()
    }

    /// Accepts `table.column`, or a bare column name when it is unambiguous
    fn resolve(&self, name: &str) -> Result<usize> {
        if let Some((table, column)) = name.split_once('.') {
            return self
                .columns
                .iter()
                .position(|(t, c)| t == table && c == column)
                .ok_or_else(|| DbError::ColumnNotFound(column.to_string(), table.to_string()));
        }

        let mut matches = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, (_, c))| c == name)
            .map(|(i, _)| i);
        match (matches.next(), matches.next()) {
            (Some(idx), None) => Ok(idx),
            (Some(_), Some(_)) => Err(DbError::ExecutionError(format!(
                "Column reference '{}' is ambiguous",
                name
            ))),
            (None, _) => {
                let table = self.columns.first().map(|(t, _)| t.clone()).unwrap_or_default();
                Err(DbError::ColumnNotFound(name.to_string(), table))
            }
        }
    }
}

fn output_name(name: &str) -> String {
    name.rsplit_once('.')
        .map(|(_, column)| column)
        .unwrap_or(name)
        .to_string()
}

// ----------------------------------------------------------------------------
// Predicates
// ----------------------------------------------------------------------------

/// A predicate with columns resolved and parameters bound
enum Filter<'a> {
    All,
    Eq(usize, &'a Value),
    IsNotNull(usize),
    Contains(usize, &'a str),
    And(Vec<Filter<'a>>),
}

impl<'a> Filter<'a> {
    fn compile(predicate: &Predicate, layout: &Layout, args: &'a [Value]) -> Result<Self> {
        Ok(match predicate {
            Predicate::All => Filter::All,
            Predicate::Eq(column, param) => Filter::Eq(layout.resolve(column)?, bind(args, *param)?),
            Predicate::IsNotNull(column) => Filter::IsNotNull(layout.resolve(column)?),
            Predicate::Contains(column, param) => {
                let value = bind(args, *param)?;
                let needle = value.as_str().ok_or_else(|| {
                    DbError::TypeMismatch(format!(
                        "Pattern for {} must be TEXT, got {}",
                        param,
                        value.type_name()
                    ))
                })?;
                Filter::Contains(layout.resolve(column)?, needle)
            }
            Predicate::And(parts) => Filter::And(
                parts
                    .iter()
                    .map(|p| Filter::compile(p, layout, args))
                    .collect::<Result<_>>()?,
            ),
        })
    }

    fn matches(&self, row: &[Value]) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(idx, value) => {
                let cell = row.get(*idx).unwrap_or(&NULL);
                !cell.is_null() && !value.is_null() && cell == *value
            }
            Filter::IsNotNull(idx) => !row.get(*idx).unwrap_or(&NULL).is_null(),
            Filter::Contains(idx, needle) => row
                .get(*idx)
                .and_then(Value::as_str)
                .is_some_and(|text| text.contains(needle)),
            Filter::And(parts) => parts.iter().all(|p| p.matches(row)),
        }
    }
}

// ----------------------------------------------------------------------------
// Mutations
// ----------------------------------------------------------------------------

fn insert(
    storage: &mut InMemoryStorage,
    catalog: &Catalog,
    plan: &Insert,
    args: &[Value],
) -> Result<(u64, Vec<Change>)> {
    let schema = catalog.get_table(&plan.table)?;
    let mut row: Row = vec![Value::Null; schema.schema().column_count()];
    for (i, column) in plan.columns.iter().enumerate() {
        let idx = schema.column_index(column)?;
        row[idx] = bind(args, Param(i))?.clone();
    }

    let changes = storage.insert(catalog, &plan.table, row)?;
    Ok((1, changes))
}

fn update(
    storage: &mut InMemoryStorage,
    catalog: &Catalog,
    plan: &Update,
    args: &[Value],
) -> Result<(u64, Vec<Change>)> {
    let schema = catalog.get_table(&plan.table)?;
    let layout = Layout::of(schema);
    let filter = Filter::compile(&plan.filter, &layout, args)?;
    let assignments = plan
        .assignments
        .iter()
        .map(|(column, param)| Ok((layout.resolve(column)?, bind(args, *param)?.clone())))
        .collect::<Result<Vec<_>>>()?;

    let targets: Vec<_> = storage
        .scan(&plan.table)?
        .into_iter()
        .filter(|(_, row)| filter.matches(row))
        .collect();

    let mut changes = Vec::new();
    for (row_id, mut row) in targets.iter().cloned() {
        for (idx, value) in &assignments {
            row[*idx] = value.clone();
        }
        match storage.update(catalog, &plan.table, row_id, row) {
            Ok(made) => changes.extend(made),
            Err(err) => {
                storage.undo(&changes)?;
                return Err(err);
            }
        }
    }

    Ok((targets.len() as u64, changes))
}

fn delete(
    storage: &mut InMemoryStorage,
    catalog: &Catalog,
    plan: &Delete,
    args: &[Value],
) -> Result<(u64, Vec<Change>)> {
    let schema = catalog.get_table(&plan.table)?;
    let layout = Layout::of(schema);
    let filter = Filter::compile(&plan.filter, &layout, args)?;

    let targets: Vec<_> = storage
        .scan(&plan.table)?
        .into_iter()
        .filter(|(_, row)| filter.matches(row))
        .map(|(row_id, _)| row_id)
        .collect();

    let mut affected = 0;
    let mut changes = Vec::new();
    for row_id in targets {
        // An earlier cascade in this statement may already have removed it
        if storage.get_table(&plan.table)?.get(row_id).is_none() {
            continue;
        }
        match storage.delete(catalog, &plan.table, row_id) {
            Ok(made) => {
                affected += 1;
                changes.extend(made);
            }
            Err(err) => {
                storage.undo(&changes)?;
                return Err(err);
            }
        }
    }

    Ok((affected, changes))
}

// ----------------------------------------------------------------------------
// Queries
// ----------------------------------------------------------------------------

fn select(storage: &InMemoryStorage, plan: &Select, args: &[Value]) -> Result<QueryResult> {
    let left = storage.get_table(&plan.table)?;
    let mut layout = Layout::of(left.schema());
    let mut rows: Vec<Row> = left.scan().map(|(_, row)| row.clone()).collect();

    if let Some(join) = &plan.join {
        let right = storage.get_table(&join.table)?;
        layout = layout.append(Layout::of(right.schema()));
        let l = layout.resolve(&join.left_column)?;
        let r = layout.resolve(&join.right_column)?;

        let mut joined = Vec::new();
        for left_row in &rows {
            for (_, right_row) in right.scan() {
                let mut combined = left_row.clone();
                combined.extend(right_row.iter().cloned());
                let (a, b) = (&combined[l], &combined[r]);
                if !a.is_null() && a == b {
                    joined.push(combined);
                }
            }
        }
        rows = joined;
    }

    let filter = Filter::compile(&plan.filter, &layout, args)?;
    rows.retain(|row| filter.matches(row));

    if let Some(order) = &plan.order_by {
        let idx = layout.resolve(order)?;
        rows.sort_by(|a, b| a[idx].cmp(&b[idx]));
    }

    let (columns, indices): (Vec<String>, Vec<usize>) = if plan.projection.is_empty() {
        layout
            .columns
            .iter()
            .enumerate()
            .map(|(i, (_, c))| (c.clone(), i))
            .unzip()
    } else {
        plan.projection
            .iter()
            .map(|name| Ok((output_name(name), layout.resolve(name)?)))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .unzip()
    };

    debug_assert!(indices.iter().all(|i| *i < layout.width()));
    let rows = rows
        .into_iter()
        .map(|row| indices.iter().map(|i| row[*i].clone()).collect())
        .collect();

    Ok(QueryResult::new(columns, rows))
}

fn aggregate(storage: &InMemoryStorage, plan: &Aggregate, args: &[Value]) -> Result<QueryResult> {
    let table = storage.get_table(&plan.table)?;
    let layout = Layout::of(table.schema());
    let filter = Filter::compile(&plan.filter, &layout, args)?;
    let group_idx = layout.resolve(&plan.group_by)?;
    let target_idx = match &plan.function {
        AggregateFunction::Count => None,
        AggregateFunction::Avg(column) => Some(layout.resolve(column)?),
    };

    #[derive(Default)]
    struct Accumulator {
        rows: i64,
        sum: f64,
        counted: u64,
    }

    let mut groups: BTreeMap<Value, Accumulator> = BTreeMap::new();
    for (_, row) in table.scan().filter(|(_, row)| filter.matches(row)) {
        let acc = groups.entry(row[group_idx].clone()).or_default();
        acc.rows += 1;
        if let Some(x) = target_idx.and_then(|i| row[i].as_f64()) {
            acc.sum += x;
            acc.counted += 1;
        }
    }

    let rows = groups
        .into_iter()
        .map(|(key, acc)| {
            let value = match plan.function {
                AggregateFunction::Count => Value::Integer(acc.rows),
                AggregateFunction::Avg(_) if acc.counted == 0 => Value::Null,
                AggregateFunction::Avg(_) => Value::Float(acc.sum / acc.counted as f64),
            };
            vec![key, value]
        })
        .collect();

    Ok(QueryResult::new(
        vec![output_name(&plan.group_by), plan.alias.clone()],
        rows,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType, ForeignKey, OnDelete};

    fn setup() -> (InMemoryStorage, Catalog) {
        let college = TableSchema::new(
            "College",
            vec![
                Column::new("college_id", DataType::Integer),
                Column::new("college_name", DataType::Text),
            ],
        )
        .primary_key(&["college_id"])
        .unwrap();
        let student = TableSchema::new(
            "Student",
            vec![
                Column::new("student_id", DataType::Integer),
                Column::new("student_name", DataType::Text),
                Column::new("student_age", DataType::Integer),
                Column::new("college_id", DataType::Integer),
            ],
        )
        .primary_key(&["student_id"])
        .unwrap()
        .foreign_key(
            ForeignKey::new("college_id", "College", "college_id").on_delete(OnDelete::SetNull),
        )
        .unwrap();

        let catalog = Catalog::new()
            .with_table(college.clone())
            .unwrap()
            .with_table(student.clone())
            .unwrap();
        let mut storage = InMemoryStorage::new();
        storage.create_table(college).unwrap();
        storage.create_table(student).unwrap();

        let add_college: Statement = Insert::into("College", &["college_id", "college_name"]).into();
        let add_student: Statement = Insert::into(
            "Student",
            &["student_id", "student_name", "student_age", "college_id"],
        )
        .into();
        for (id, name) in [(1, "North"), (2, "South")] {
            execute(&mut storage, &catalog, &add_college, &[id.into(), name.into()]).unwrap();
        }
        for (id, name, age, college) in [
            (10, "Ann", 19, Some(1)),
            (11, "Bob", 21, Some(1)),
            (12, "Cid", 30, Some(2)),
            (13, "Dee", 25, None),
        ] {
            execute(
                &mut storage,
                &catalog,
                &add_student,
                &[id.into(), name.into(), age.into(), college.into()],
            )
            .unwrap();
        }
        (storage, catalog)
    }

    #[test]
    fn test_select_with_filter_and_projection() {
        let (storage, _) = setup();
        let stmt: Statement = Select::from("Student")
            .columns(&["student_name"])
            .filter(Predicate::eq("college_id", 0))
            .order_by("student_id")
            .into();
        let result = query(&storage, &stmt, &[1.into()]).unwrap();
        assert_eq!(result.columns, vec!["student_name".to_string()]);
        assert_eq!(
            result.rows,
            vec![vec![Value::from("Ann")], vec![Value::from("Bob")]]
        );
    }

    #[test]
    fn test_missing_parameter_is_an_error() {
        let (storage, _) = setup();
        let stmt: Statement = Select::from("Student")
            .filter(Predicate::eq("student_id", 0))
            .into();
        assert!(matches!(
            query(&storage, &stmt, &[]),
            Err(DbError::ExecutionError(_))
        ));
    }

    #[test]
    fn test_contains_is_substring_match() {
        let (storage, _) = setup();
        let stmt: Statement = Select::from("Student")
            .columns(&["student_id"])
            .filter(Predicate::contains("student_name", 0))
            .into();
        let result = query(&storage, &stmt, &["e".into()]).unwrap();
        assert_eq!(result.rows, vec![vec![Value::Integer(13)]]);

        let all = query(&storage, &stmt, &["".into()]).unwrap();
        assert_eq!(all.row_count(), 4);
    }

    #[test]
    fn test_join_resolves_qualified_columns() {
        let (storage, _) = setup();
        let stmt: Statement = Select::from("Student")
            .join("College", "Student.college_id", "College.college_id")
            .columns(&["student_name", "college_name"])
            .order_by("Student.student_id")
            .into();
        let result = query(&storage, &stmt, &[]).unwrap();
        assert_eq!(result.row_count(), 3);
        assert_eq!(result.get(2, "college_name"), Some(&Value::from("South")));

        let ambiguous: Statement = Select::from("Student")
            .join("College", "Student.college_id", "College.college_id")
            .columns(&["college_id"])
            .into();
        assert!(query(&storage, &ambiguous, &[]).is_err());
    }

    #[test]
    fn test_aggregate_groups_in_key_order() {
        let (storage, _) = setup();
        let avg: Statement = Aggregate::avg("Student", "college_id", "student_age", "avg_age")
            .filter(Predicate::is_not_null("college_id"))
            .into();
        let result = query(&storage, &avg, &[]).unwrap();
        assert_eq!(result.columns, vec!["college_id".to_string(), "avg_age".to_string()]);
        assert_eq!(
            result.rows,
            vec![
                vec![Value::Integer(1), Value::Float(20.0)],
                vec![Value::Integer(2), Value::Float(30.0)],
            ]
        );

        let count: Statement = Aggregate::count("Student", "college_id", "n").into();
        let result = query(&storage, &count, &[]).unwrap();
        assert_eq!(result.rows[0], vec![Value::Null, Value::Integer(1)]);
        assert_eq!(result.rows[1], vec![Value::Integer(1), Value::Integer(2)]);
    }

    #[test]
    fn test_update_touches_only_matching_rows() {
        let (mut storage, catalog) = setup();
        let stmt: Statement = Update::table("Student")
            .set("student_age", 0)
            .filter(Predicate::eq("student_id", 1))
            .into();
        let (affected, changes) =
            execute(&mut storage, &catalog, &stmt, &[40.into(), 12.into()]).unwrap();
        assert_eq!(affected, 1);
        assert_eq!(changes.len(), 1);

        let (affected, _) = execute(&mut storage, &catalog, &stmt, &[40.into(), 99.into()]).unwrap();
        assert_eq!(affected, 0);
    }

    #[test]
    fn test_failed_update_leaves_no_partial_rows() {
        let (mut storage, catalog) = setup();
        let before = storage.scan("Student").unwrap();
        let stmt: Statement = Update::table("Student")
            .set("college_id", 0)
            .filter(Predicate::is_not_null("student_id"))
            .into();
        assert!(execute(&mut storage, &catalog, &stmt, &[99.into()]).is_err());
        assert_eq!(storage.scan("Student").unwrap(), before);
    }

    #[test]
    fn test_delete_applies_set_null() {
        let (mut storage, catalog) = setup();
        let stmt: Statement = Delete::from("College")
            .filter(Predicate::eq("college_id", 0))
            .into();
        let (affected, changes) = execute(&mut storage, &catalog, &stmt, &[1.into()]).unwrap();
        assert_eq!(affected, 1);
        assert_eq!(changes.len(), 3);

        let orphans: Statement = Select::from("Student")
            .filter(Predicate::is_not_null("college_id"))
            .into();
        assert_eq!(query(&storage, &orphans, &[]).unwrap().row_count(), 1);
    }

    #[test]
    fn test_query_rejects_mutations() {
        let (storage, _) = setup();
        let stmt: Statement = Delete::from("College").into();
        assert!(query(&storage, &stmt, &[]).is_err());
    }
}
