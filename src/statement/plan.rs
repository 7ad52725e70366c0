//! Parameterized statement plans.
//!
//! A statement names tables and columns statically; every caller-supplied
//! value enters through a positional `Param` bound at execution time.

use std::fmt;

/// Positional placeholder, zero-based. Rendered as `$n` (one-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param(pub usize);

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0 + 1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every row
    All,
    /// `column = $n`; NULL never matches
    Eq(String, Param),
    IsNotNull(String),
    /// Case-sensitive substring match, `column LIKE '%' || $n || '%'`
    Contains(String, Param),
    And(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(column: impl Into<String>, param: usize) -> Self {
        Predicate::Eq(column.into(), Param(param))
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Predicate::IsNotNull(column.into())
    }

    pub fn contains(column: impl Into<String>, param: usize) -> Self {
        Predicate::Contains(column.into(), Param(param))
    }

    pub fn and(self, other: Predicate) -> Self {
        match (self, other) {
            (Predicate::All, p) | (p, Predicate::All) => p,
            (Predicate::And(mut left), Predicate::And(right)) => {
                left.extend(right);
                Predicate::And(left)
            }
            (Predicate::And(mut left), p) => {
                left.push(p);
                Predicate::And(left)
            }
            (p, other) => Predicate::And(vec![p, other]),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::All => write!(f, "TRUE"),
            Predicate::Eq(col, p) => write!(f, "{} = {}", col, p),
            Predicate::IsNotNull(col) => write!(f, "{} IS NOT NULL", col),
            Predicate::Contains(col, p) => write!(f, "{} LIKE '%' || {} || '%'", col, p),
            Predicate::And(parts) => {
                let rendered: Vec<String> = parts.iter().map(|p| p.to_string()).collect();
                write!(f, "{}", rendered.join(" AND "))
            }
        }
    }
}

/// Inner equi-join of the driving table with one other table
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub table: String,
    pub left_column: String,
    pub right_column: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub table: String,
    /// Bound to `$1..$n` in order; omitted columns are NULL
    pub columns: Vec<String>,
}

impl Insert {
    pub fn into(table: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            table: table.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub table: String,
    pub join: Option<Join>,
    /// Empty means every column
    pub projection: Vec<String>,
    pub filter: Predicate,
    pub order_by: Option<String>,
}

impl Select {
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            join: None,
            projection: Vec::new(),
            filter: Predicate::All,
            order_by: None,
        }
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.projection = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn join(
        mut self,
        table: impl Into<String>,
        left_column: impl Into<String>,
        right_column: impl Into<String>,
    ) -> Self {
        self.join = Some(Join {
            table: table.into(),
            left_column: left_column.into(),
            right_column: right_column.into(),
        });
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = predicate;
        self
    }

    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by = Some(column.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub table: String,
    pub assignments: Vec<(String, Param)>,
    pub filter: Predicate,
}

impl Update {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            assignments: Vec::new(),
            filter: Predicate::All,
        }
    }

    pub fn set(mut self, column: impl Into<String>, param: usize) -> Self {
        self.assignments.push((column.into(), Param(param)));
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = predicate;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub table: String,
    pub filter: Predicate,
}

impl Delete {
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: Predicate::All,
        }
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = predicate;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggregateFunction {
    Count,
    Avg(String),
}

/// `SELECT group_by, f(...) AS alias FROM table WHERE filter GROUP BY group_by`
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub table: String,
    pub group_by: String,
    pub function: AggregateFunction,
    pub alias: String,
    pub filter: Predicate,
}

impl Aggregate {
    pub fn count(table: impl Into<String>, group_by: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            group_by: group_by.into(),
            function: AggregateFunction::Count,
            alias: alias.into(),
            filter: Predicate::All,
        }
    }

    pub fn avg(
        table: impl Into<String>,
        group_by: impl Into<String>,
        column: impl Into<String>,
        alias: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            group_by: group_by.into(),
            function: AggregateFunction::Avg(column.into()),
            alias: alias.into(),
            filter: Predicate::All,
        }
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = predicate;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Insert(Insert),
    Select(Select),
    Update(Update),
    Delete(Delete),
    Aggregate(Aggregate),
}

impl Statement {
    pub fn is_read_only(&self) -> bool {
        matches!(self, Statement::Select(_) | Statement::Aggregate(_))
    }

    pub fn table(&self) -> &str {
        match self {
            Statement::Insert(s) => &s.table,
            Statement::Select(s) => &s.table,
            Statement::Update(s) => &s.table,
            Statement::Delete(s) => &s.table,
            Statement::Aggregate(s) => &s.table,
        }
    }
}

macro_rules! impl_from_plan {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Statement {
                fn from(plan: $variant) -> Self {
                    Statement::$variant(plan)
                }
            }
        )*
    };
}

impl_from_plan!(Insert, Select, Update, Delete, Aggregate);

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Insert(s) => {
                let params: Vec<String> =
                    (0..s.columns.len()).map(|i| Param(i).to_string()).collect();
                write!(
                    f,
                    "INSERT INTO {} ({}) VALUES ({})",
                    s.table,
                    s.columns.join(", "),
                    params.join(", ")
                )
            }
            Statement::Select(s) => {
                let projection = if s.projection.is_empty() {
                    "*".to_string()
                } else {
                    s.projection.join(", ")
                };
                write!(f, "SELECT {} FROM {}", projection, s.table)?;
                if let Some(join) = &s.join {
                    write!(
                        f,
                        " JOIN {} ON {} = {}",
                        join.table, join.left_column, join.right_column
                    )?;
                }
                write!(f, " WHERE {}", s.filter)?;
                if let Some(order) = &s.order_by {
                    write!(f, " ORDER BY {}", order)?;
                }
                Ok(())
            }
            Statement::Update(s) => {
                let sets: Vec<String> = s
                    .assignments
                    .iter()
                    .map(|(col, p)| format!("{} = {}", col, p))
                    .collect();
                write!(f, "UPDATE {} SET {} WHERE {}", s.table, sets.join(", "), s.filter)
            }
            Statement::Delete(s) => write!(f, "DELETE FROM {} WHERE {}", s.table, s.filter),
            Statement::Aggregate(s) => {
                let function = match &s.function {
                    AggregateFunction::Count => "COUNT(*)".to_string(),
                    AggregateFunction::Avg(col) => format!("AVG({})", col),
                };
                write!(
                    f,
                    "SELECT {}, {} AS {} FROM {} WHERE {} GROUP BY {}",
                    s.group_by, function, s.alias, s.table, s.filter, s.group_by
                )
            }
        }
    }
}
