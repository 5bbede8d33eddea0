/// Row filter rendered as a PostgREST query pair, e.g. `user_id=eq.42`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    column: String,
    value: String,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl AsRef<str>) -> Self {
        Self {
            column: column.into(),
            value: format!("eq.{}", value.as_ref()),
        }
    }

    pub(crate) fn as_pair(&self) -> (&str, &str) {
        (&self.column, &self.value)
    }
}

/// Ascending result ordering, rendered as `order=<column>.asc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    column: String,
}

impl Order {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }

    pub(crate) fn render(&self) -> String {
        format!("{}.asc", self.column)
    }
}
