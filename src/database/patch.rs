//! Partial-update statements built from an allow-list of mutable columns.
//!
//! Column names and SQL fragments only ever come from the static allow-list;
//! caller-supplied values are always bound as `$n` parameters.

use serde_json::{Map, Value};

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Bool,
}

/// One mutable column a request body may set.
#[derive(Debug, Clone, Copy)]
pub struct PatchField {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl PatchField {
    pub const fn text(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Text }
    }

    pub const fn number(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Number }
    }

    pub const fn flag(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Bool }
    }

    fn extract(&self, value: &Value) -> Option<PatchValue> {
        match (self.kind, value) {
            (FieldKind::Text, Value::String(s)) => Some(PatchValue::Text(s.clone())),
            (FieldKind::Number, Value::Number(n)) => n.as_f64().map(PatchValue::Number),
            (FieldKind::Bool, Value::Bool(b)) => Some(PatchValue::Bool(*b)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatchValue {
    Text(String),
    Number(f64),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: &'static str,
    pub value: PatchValue,
}

/// Static description of the row an update applies to.
#[derive(Debug, Clone, Copy)]
pub struct UpdateTarget {
    pub table: &'static str,
    /// Equality predicates bound after the assignments, in order.
    pub keys: &'static [&'static str],
    /// Restrict to rows that have not been soft-deleted.
    pub live_only: bool,
    pub returning: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    assignments: Vec<Assignment>,
    touched: Vec<&'static str>,
}

impl Patch {
    /// Collect the allow-listed fields present in `body`.
    ///
    /// Fails with `No fields to update` when none are present. Touched
    /// timestamp columns are added afterwards and never count.
    pub fn from_body(body: &Map<String, Value>, allowed: &[PatchField]) -> Result<Self, ApiError> {
        let mut assignments = Vec::new();
        for field in allowed {
            let Some(raw) = body.get(field.name) else {
                continue;
            };
            let value = field
                .extract(raw)
                .ok_or_else(|| ApiError::bad_request(format!("Invalid value for field '{}'", field.name)))?;
            assignments.push(Assignment { column: field.name, value });
        }

        if assignments.is_empty() {
            return Err(ApiError::bad_request("No fields to update"));
        }

        Ok(Self { assignments, touched: Vec::new() })
    }

    /// Also set `column = NOW()`.
    pub fn touch(mut self, column: &'static str) -> Self {
        self.touched.push(column);
        self
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn touched(&self) -> &[&'static str] {
        &self.touched
    }

    /// Render the parameterized UPDATE. Assignment values bind to
    /// `$1..$n`, then the target keys bind to `$n+1..`.
    pub fn to_sql(&self, target: &UpdateTarget) -> String {
        let mut fragments: Vec<String> = self
            .assignments
            .iter()
            .enumerate()
            .map(|(i, a)| format!("{} = ${}", a.column, i + 1))
            .collect();
        fragments.extend(self.touched.iter().map(|column| format!("{} = NOW()", column)));

        let offset = self.assignments.len();
        let mut predicates: Vec<String> = target
            .keys
            .iter()
            .enumerate()
            .map(|(i, key)| format!("{} = ${}", key, offset + i + 1))
            .collect();
        if target.live_only {
            predicates.push("deleted_at IS NULL".to_string());
        }

        format!(
            "UPDATE {} SET {} WHERE {} RETURNING {}",
            target.table,
            fragments.join(", "),
            predicates.join(" AND "),
            target.returning
        )
    }
}
