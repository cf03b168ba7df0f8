//! Structured queries over one collection.
//!
//! The model is the subset of Firestore's structured query that the service
//! uses: AND-ed field filters, at most one ordering, and a limit. The memory
//! store evaluates queries with `Query::matches` / `compare_values`; the
//! Firestore store translates them into `runQuery` requests.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::{Document, Fields};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    /// Field is an array that contains the value.
    ArrayContains,
    /// Field equals one of the values in the (array) filter value.
    In,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(name: &str) -> Self {
        Self {
            collection: name.to_string(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn filter(mut self, field: &str, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn where_eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Eq, value)
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// True when every filter accepts the document.
    pub fn matches(&self, fields: &Fields) -> bool {
        self.filters.iter().all(|f| f.matches(fields))
    }

    /// Filters, orders and limits documents in memory.
    ///
    /// Documents without the ordering field are dropped, as Firestore does.
    pub fn apply(&self, docs: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut out: Vec<Document> = docs.into_iter().filter(|d| self.matches(&d.fields)).collect();

        if let Some(order) = &self.order_by {
            out.retain(|d| d.fields.contains_key(&order.field));
            out.sort_by(|a, b| {
                let ord = compare_values(&a.fields[&order.field], &b.fields[&order.field]);
                let ord = match order.direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                };
                ord.then_with(|| a.id.cmp(&b.id))
            });
        }

        if let Some(limit) = self.limit {
            out.truncate(limit);
        }
        out
    }
}

impl Filter {
    pub fn matches(&self, fields: &Fields) -> bool {
        let Some(actual) = fields.get(&self.field) else {
            return false;
        };
        match self.op {
            FilterOp::Eq => values_equal(actual, &self.value),
            FilterOp::NotEq => !values_equal(actual, &self.value),
            FilterOp::Lt => comparable(actual, &self.value) && compare_values(actual, &self.value) == Ordering::Less,
            FilterOp::Le => comparable(actual, &self.value) && compare_values(actual, &self.value) != Ordering::Greater,
            FilterOp::Gt => comparable(actual, &self.value) && compare_values(actual, &self.value) == Ordering::Greater,
            FilterOp::Ge => comparable(actual, &self.value) && compare_values(actual, &self.value) != Ordering::Less,
            FilterOp::ArrayContains => actual
                .as_array()
                .is_some_and(|items| items.iter().any(|v| values_equal(v, &self.value))),
            FilterOp::In => self
                .value
                .as_array()
                .is_some_and(|options| options.iter().any(|v| values_equal(actual, v))),
        }
    }
}

/// Range filters only match values of the same type class.
fn comparable(a: &Value, b: &Value) -> bool {
    type_rank(a) == type_rank(b)
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => compare_values(a, b) == Ordering::Equal && type_rank(a) == type_rank(b),
    }
}

/// Total order across JSON values: null < bool < number < string < array < object.
///
/// Strings that both parse as RFC 3339 timestamps compare chronologically.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => match (parse_ts(x), parse_ts(y)) {
            (Some(tx), Some(ty)) => tx.cmp(&ty),
            _ => x.cmp(y),
        },
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let ord = compare_values(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => x.len().cmp(&y.len()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    // Cheap pre-check so ordinary strings skip the parser.
    if s.len() < 20 || s.as_bytes().get(4) != Some(&b'-') {
        return None;
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, v: Value) -> Document {
        Document::new(id, v.as_object().cloned().unwrap())
    }

    #[test]
    fn timestamps_order_chronologically_despite_fraction_digits() {
        let a = json!("2024-01-01T00:00:00Z");
        let b = json!("2024-01-01T00:00:00.5Z");
        assert_eq!(compare_values(&a, &b), Ordering::Less);
    }

    #[test]
    fn order_by_drops_documents_missing_the_field() {
        let q = Query::collection("c").order_by("rank", Direction::Descending);
        let out = q.apply(vec![
            doc("a", json!({"rank": 1})),
            doc("b", json!({})),
            doc("c", json!({"rank": 3})),
        ]);
        let ids: Vec<_> = out.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[test]
    fn in_and_array_contains_filters() {
        let fields = json!({"tags": ["sat", "hard"], "status": "learning"});
        let fields = fields.as_object().unwrap();
        assert!(Filter {
            field: "tags".into(),
            op: FilterOp::ArrayContains,
            value: json!("sat")
        }
        .matches(fields));
        assert!(Filter {
            field: "status".into(),
            op: FilterOp::In,
            value: json!(["new", "learning"])
        }
        .matches(fields));
        assert!(!Filter {
            field: "missing".into(),
            op: FilterOp::NotEq,
            value: json!(1)
        }
        .matches(fields));
    }

    #[test]
    fn integer_and_float_compare_equal() {
        assert!(values_equal(&json!(3), &json!(3.0)));
    }
}
