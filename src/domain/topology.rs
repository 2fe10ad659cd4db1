// Row sets returned by topology queries
use super::equipment::EntityId;

/// Result of a topology query: variable names plus rows aligned to them. Unbound
/// optional variables are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRows {
    variables: Vec<String>,
    rows: Vec<Vec<Option<EntityId>>>,
}

impl QueryRows {
    pub fn new(variables: Vec<String>, rows: Vec<Vec<Option<EntityId>>>) -> Self {
        Self { variables, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column(&self, variable: &str) -> Option<usize> {
        let variable = variable.trim_start_matches('?');
        self.variables.iter().position(|v| v == variable)
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |values| Row { set: self, values })
    }

    /// Every bound value of `variable`, in row order, without duplicates.
    pub fn values(&self, variable: &str) -> Vec<EntityId> {
        let mut out: Vec<EntityId> = Vec::new();
        for row in self.rows() {
            if let Some(value) = row.get(variable) {
                if !out.contains(value) {
                    out.push(value.clone());
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    set: &'a QueryRows,
    values: &'a [Option<EntityId>],
}

impl<'a> Row<'a> {
    /// Value bound to `variable` (with or without a leading `?`).
    pub fn get(&self, variable: &str) -> Option<&'a EntityId> {
        let idx = self.set.column(variable)?;
        let values: &'a [Option<EntityId>] = self.values;
        values.get(idx).and_then(Option::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> QueryRows {
        QueryRows::new(
            vec!["vav".to_string(), "sat".to_string()],
            vec![
                vec![Some(EntityId::new("vav1")), None],
                vec![Some(EntityId::new("vav2")), Some(EntityId::new("sat2"))],
                vec![Some(EntityId::new("vav2")), Some(EntityId::new("sat3"))],
            ],
        )
    }

    #[test]
    fn test_lookup_by_name() {
        let rows = rows();
        let second = rows.rows().nth(1).unwrap();
        assert_eq!(second.get("?sat"), Some(&EntityId::new("sat2")));
        assert_eq!(second.get("vav"), Some(&EntityId::new("vav2")));
        assert_eq!(second.get("missing"), None);
    }

    #[test]
    fn test_unbound_is_none() {
        let rows = rows();
        assert_eq!(rows.rows().next().unwrap().get("sat"), None);
    }

    #[test]
    fn test_values_deduplicated() {
        let rows = rows();
        assert_eq!(
            rows.values("vav"),
            vec![EntityId::new("vav1"), EntityId::new("vav2")]
        );
    }
}
