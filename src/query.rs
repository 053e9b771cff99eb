//! Record queries.
//!
//! A [`Query`] is any predicate over a [`Record`]. Closures work directly;
//! [`Filter`] is a declarative predicate that can be deserialized from JSON:
//!
//! ```ignore
//! let filter: Filter = serde_json::from_value(json!({
//!     "must": [{"field": "age", "op": "gte", "value": 18}],
//!     "must_not": [{"field": "status", "op": "eq", "value": "banned"}]
//! }))?;
//! let adults = store.collection("users")?.query(&filter);
//! ```

use crate::types::{Record, ID_KEY};
use serde::Deserialize;
use serde_json::Value;
use std::borrow::Cow;
use std::cmp::Ordering;

/// A predicate deciding whether a record belongs to a query's result.
pub trait Query {
    fn matches(&self, record: &Record) -> bool;
}

impl<F> Query for F
where
    F: Fn(&Record) -> bool,
{
    fn matches(&self, record: &Record) -> bool {
        self(record)
    }
}

/// Run `query` over `records`, keeping matches in input order.
pub fn execute_query<'a, Q, I>(records: I, query: &Q) -> Vec<Record>
where
    Q: Query + ?Sized,
    I: IntoIterator<Item = &'a Record>,
{
    records
        .into_iter()
        .filter(|record| query.matches(record))
        .cloned()
        .collect()
}

/// Field filter with `must` (AND) and `must_not` (AND-NOT) conditions.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Filter {
    #[serde(default)]
    pub must: Vec<Condition>,
    #[serde(default)]
    pub must_not: Vec<Condition>,
}

impl Filter {
    /// Filter requiring every condition to hold.
    pub fn must(conditions: Vec<Condition>) -> Self {
        Self {
            must: conditions,
            must_not: Vec::new(),
        }
    }

    /// Also require `condition` to be false.
    pub fn with_must_not(mut self, condition: Condition) -> Self {
        self.must_not.push(condition);
        self
    }
}

impl Query for Filter {
    fn matches(&self, record: &Record) -> bool {
        self.must.iter().all(|cond| cond.evaluate(record))
            && !self.must_not.iter().any(|cond| cond.evaluate(record))
    }
}

/// A single condition on a record field. `_id` addresses the identifier.
#[derive(Clone, Debug, Deserialize)]
pub struct Condition {
    pub field: String,
    pub op: Op,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub values: Option<Vec<Value>>,
}

/// Comparison operator for filter conditions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    In,
}

impl Condition {
    /// Compare `field` against a single value.
    pub fn new(field: impl Into<String>, op: Op, value: Value) -> Self {
        Self {
            field: field.into(),
            op,
            value: Some(value),
            values: None,
        }
    }

    /// Membership of `field` in `values`.
    pub fn one_of(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            field: field.into(),
            op: Op::In,
            value: None,
            values: Some(values),
        }
    }

    fn evaluate(&self, record: &Record) -> bool {
        let field_value = match field_value(record, &self.field) {
            Some(v) => v,
            None => return false,
        };

        if self.op == Op::In {
            return self
                .values
                .as_ref()
                .is_some_and(|vals| vals.iter().any(|v| json_eq(&field_value, v)));
        }

        let Some(ref val) = self.value else {
            return false;
        };

        match self.op {
            Op::Eq => json_eq(&field_value, val),
            Op::Ne => !json_eq(&field_value, val),
            Op::Gt => json_cmp(&field_value, val) == Some(Ordering::Greater),
            Op::Lt => json_cmp(&field_value, val) == Some(Ordering::Less),
            Op::Gte => json_cmp(&field_value, val).is_some_and(|o| o != Ordering::Less),
            Op::Lte => json_cmp(&field_value, val).is_some_and(|o| o != Ordering::Greater),
            Op::In => unreachable!("handled above"),
        }
    }
}

fn field_value<'a>(record: &'a Record, field: &str) -> Option<Cow<'a, Value>> {
    if field == ID_KEY {
        Some(Cow::Owned(record.id().to_value()))
    } else {
        record.get(field).map(Cow::Borrowed)
    }
}

/// Equality with numeric coercion between integers and floats.
fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(xi), Some(yi)) => xi == yi,
            _ => x
                .as_f64()
                .zip(y.as_f64())
                .is_some_and(|(xf, yf)| (xf - yf).abs() < f64::EPSILON),
        },
        _ => a == b,
    }
}

/// Ordering for numbers and strings; other combinations are unordered.
fn json_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(xi), Some(yi)) => Some(xi.cmp(&yi)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
