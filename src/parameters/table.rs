//! Table-valued parameters such as `start_v: s->b:1, default:0`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::alphabet::{Alphabet, Matrix};
use super::ParameterError;
use crate::script::text::{split_key_value, split_list};

/// Key set a table parameter is indexed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    ElementBehavior,
    ElementElement,
    Element,
    Behavior,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableKey {
    Single(String),
    Pair(String, String),
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TableKey::Single(name) => write!(f, "{}", name),
            TableKey::Pair(first, second) => write!(f, "{}->{}", first, second),
        }
    }
}

/// A table parameter as written: one value for every key, or one per key.
#[derive(Debug, Clone, PartialEq)]
pub enum TableValue {
    Scalar(f64),
    Map(BTreeMap<TableKey, f64>),
}

impl TableKind {
    pub fn expected_keys(&self, elements: &[String], behaviors: &[String]) -> BTreeSet<TableKey> {
        let pairs = |rows: &[String], cols: &[String]| -> BTreeSet<TableKey> {
            rows.iter()
                .flat_map(|r| cols.iter().map(move |c| TableKey::Pair(r.clone(), c.clone())))
                .collect()
        };
        match self {
            TableKind::ElementBehavior => pairs(elements, behaviors),
            TableKind::ElementElement => pairs(elements, elements),
            TableKind::Element => elements.iter().cloned().map(TableKey::Single).collect(),
            TableKind::Behavior => behaviors.iter().cloned().map(TableKey::Single).collect(),
        }
    }

    fn mismatch(&self, name: &str) -> ParameterError {
        ParameterError::new(match self {
            TableKind::ElementBehavior => format!(
                "The parameter '{}' does not match 'stimulus_elements' and 'behaviors'.",
                name
            ),
            TableKind::ElementElement | TableKind::Element => format!(
                "The parameter '{}' does not match 'stimulus_elements'.",
                name
            ),
            TableKind::Behavior => format!("The parameter '{}' does not match 'behaviors'.", name),
        })
    }

    fn expected_form(&self) -> &'static str {
        match self {
            TableKind::ElementBehavior | TableKind::ElementElement => "x->y:value",
            TableKind::Element => "element:value",
            TableKind::Behavior => "behavior:value",
        }
    }
}

/// Parses the value text of a table parameter.
///
/// `number` evaluates a value expression. Keys not listed explicitly take
/// the `default` value.
pub fn parse_table<F>(
    name: &str,
    kind: TableKind,
    text: &str,
    elements: &[String],
    behaviors: &[String],
    mut number: F,
) -> Result<TableValue, ParameterError>
where
    F: FnMut(&str) -> Result<f64, String>,
{
    let needs_elements = !matches!(kind, TableKind::Behavior);
    let needs_behaviors = matches!(kind, TableKind::ElementBehavior | TableKind::Behavior);
    if needs_elements && elements.is_empty() {
        return Err(ParameterError::new(format!(
            "The parameter 'stimulus_elements' must be assigned before the parameter '{}'.",
            name
        )));
    }
    if needs_behaviors && behaviors.is_empty() {
        return Err(ParameterError::new(format!(
            "The parameter 'behaviors' must be assigned before the parameter '{}'.",
            name
        )));
    }

    let items = split_list(text, ',');
    if items.is_empty() {
        return Err(ParameterError::new(format!(
            "Parameter '{}' has no value.",
            name
        )));
    }

    let mut values: BTreeMap<TableKey, f64> = BTreeMap::new();
    let mut default: Option<f64> = None;
    for (i, item) in items.iter().enumerate() {
        let Some((key, value)) = split_key_value(item) else {
            if i > 0 {
                return Err(ParameterError::new(format!(
                    "A single value for '{}' cannot follow other values.",
                    name
                )));
            }
            if items.len() > 1 {
                return Err(ParameterError::new(format!(
                    "A single value for '{}' cannot be followed by other values.",
                    name
                )));
            }
            let scalar = number(item).map_err(ParameterError::new)?;
            return Ok(TableValue::Scalar(scalar));
        };

        let parsed = number(value).map_err(|_| {
            ParameterError::new(format!(
                "Invalid value '{}' for '{}' in parameter '{}'.",
                value, key, name
            ))
        })?;

        if key == "default" {
            if default.is_some() {
                return Err(ParameterError::new(format!(
                    "Default value for '{}' can only be stated once.",
                    name
                )));
            }
            default = Some(parsed);
            continue;
        }

        let table_key = parse_key(name, kind, key, item, elements, behaviors)?;
        if values.contains_key(&table_key) {
            return Err(ParameterError::new(format!(
                "Duplicate of {} in '{}'.",
                table_key, name
            )));
        }
        values.insert(table_key, parsed);
    }

    for key in kind.expected_keys(elements, behaviors) {
        if !values.contains_key(&key) {
            let value = default.ok_or_else(|| {
                ParameterError::new(format!("Missing default value for parameter '{}'.", name))
            })?;
            values.insert(key, value);
        }
    }
    Ok(TableValue::Map(values))
}

fn parse_key(
    name: &str,
    kind: TableKind,
    key: &str,
    item: &str,
    elements: &[String],
    behaviors: &[String],
) -> Result<TableKey, ParameterError> {
    let element = |e: &str| -> Result<String, ParameterError> {
        if elements.iter().any(|x| x == e) {
            Ok(e.to_string())
        } else {
            Err(ParameterError::new(format!(
                "Error in parameter '{}': '{}' is an invalid stimulus element.",
                name, e
            )))
        }
    };
    let behavior = |b: &str| -> Result<String, ParameterError> {
        if behaviors.iter().any(|x| x == b) {
            Ok(b.to_string())
        } else {
            Err(ParameterError::new(format!(
                "Error in parameter '{}': '{}' is an invalid behavior name.",
                name, b
            )))
        }
    };

    let malformed = || {
        ParameterError::new(format!(
            "Expected '{}' or 'default:value' in '{}', got '{}'.",
            kind.expected_form(),
            name,
            item
        ))
    };

    match kind {
        TableKind::Element => Ok(TableKey::Single(element(key)?)),
        TableKind::Behavior => Ok(TableKey::Single(behavior(key)?)),
        TableKind::ElementBehavior | TableKind::ElementElement => {
            let parts: Vec<&str> = key.split("->").map(str::trim).collect();
            let [first, second] = parts.as_slice() else {
                return Err(malformed());
            };
            let first = element(first)?;
            let second = if kind == TableKind::ElementBehavior {
                behavior(second)?
            } else {
                element(second)?
            };
            Ok(TableKey::Pair(first, second))
        }
    }
}

impl TableValue {
    /// Dense matrix over `rows × cols`; a map must cover exactly that key set.
    pub fn to_matrix(
        &self,
        name: &str,
        kind: TableKind,
        rows: &Alphabet,
        cols: &Alphabet,
    ) -> Result<Matrix, ParameterError> {
        match self {
            TableValue::Scalar(value) => Ok(Matrix::filled(rows.len(), cols.len(), *value)),
            TableValue::Map(values) => {
                let expected = kind.expected_keys(rows.names(), cols.names());
                if !values.keys().cloned().eq(expected.into_iter()) {
                    return Err(kind.mismatch(name));
                }
                let mut matrix = Matrix::filled(rows.len(), cols.len(), 0.0);
                for (key, value) in values {
                    if let TableKey::Pair(r, c) = key {
                        if let (Some(r), Some(c)) = (rows.id(r), cols.id(c)) {
                            matrix.set(r, c, *value);
                        }
                    }
                }
                Ok(matrix)
            }
        }
    }

    /// Dense vector over `keys`; a map must cover exactly that key set.
    pub fn to_vector(
        &self,
        name: &str,
        kind: TableKind,
        keys: &Alphabet,
    ) -> Result<Vec<f64>, ParameterError> {
        match self {
            TableValue::Scalar(value) => Ok(vec![*value; keys.len()]),
            TableValue::Map(values) => {
                let expected: BTreeSet<TableKey> =
                    keys.names().iter().cloned().map(TableKey::Single).collect();
                if !values.keys().cloned().eq(expected.into_iter()) {
                    return Err(kind.mismatch(name));
                }
                Ok(keys
                    .names()
                    .iter()
                    .map(|k| values[&TableKey::Single(k.clone())])
                    .collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn plain_number(text: &str) -> Result<f64, String> {
        text.trim()
            .parse::<f64>()
            .map_err(|_| format!("Error in expression '{}'.", text))
    }

    fn parse(kind: TableKind, text: &str) -> Result<TableValue, ParameterError> {
        parse_table(
            "start_v",
            kind,
            text,
            &names(&["s1", "s2"]),
            &names(&["b1", "b2"]),
            plain_number,
        )
    }

    #[test]
    fn test_scalar() {
        assert_eq!(
            parse(TableKind::ElementBehavior, "0.5"),
            Ok(TableValue::Scalar(0.5))
        );
    }

    #[test]
    fn test_map_with_default() {
        let value = parse(TableKind::ElementBehavior, "s1->b1: 2, default: -1").unwrap();
        let TableValue::Map(map) = value else {
            panic!("expected a map");
        };
        assert_eq!(map.len(), 4);
        assert_eq!(map[&TableKey::Pair("s1".into(), "b1".into())], 2.0);
        assert_eq!(map[&TableKey::Pair("s2".into(), "b2".into())], -1.0);
    }

    #[test]
    fn test_errors() {
        let message = |text: &str| parse(TableKind::ElementBehavior, text).unwrap_err().to_string();
        assert_eq!(
            message("s1->b1:1, 2"),
            "A single value for 'start_v' cannot follow other values."
        );
        assert_eq!(
            message("2, s1->b1:1"),
            "A single value for 'start_v' cannot be followed by other values."
        );
        assert_eq!(
            message("s1->b1:1"),
            "Missing default value for parameter 'start_v'."
        );
        assert_eq!(
            message("default:1, default:2"),
            "Default value for 'start_v' can only be stated once."
        );
        assert_eq!(
            message("s1->b1:1, s1->b1:2, default:0"),
            "Duplicate of s1->b1 in 'start_v'."
        );
        assert_eq!(
            message("s3->b1:1"),
            "Error in parameter 'start_v': 's3' is an invalid stimulus element."
        );
        assert_eq!(
            message("s1->x:1"),
            "Error in parameter 'start_v': 'x' is an invalid behavior name."
        );
        assert_eq!(
            message("s1:1"),
            "Expected 'x->y:value' or 'default:value' in 'start_v', got 's1:1'."
        );
    }

    #[test]
    fn test_alphabet_required() {
        let err = parse_table("u", TableKind::Element, "1", &[], &[], plain_number).unwrap_err();
        assert_eq!(
            err.to_string(),
            "The parameter 'stimulus_elements' must be assigned before the parameter 'u'."
        );
        let err = parse_table(
            "behavior_cost",
            TableKind::Behavior,
            "1",
            &names(&["s"]),
            &[],
            plain_number,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "The parameter 'behaviors' must be assigned before the parameter 'behavior_cost'."
        );
    }

    #[test]
    fn test_map_mismatch_after_alphabet_change() {
        let value = parse(TableKind::ElementBehavior, "s1->b1:1, default:0").unwrap();
        let rows = Alphabet::new(["s1", "s2", "s3"]);
        let cols = Alphabet::new(["b1", "b2"]);
        assert_eq!(
            value
                .to_matrix("start_v", TableKind::ElementBehavior, &rows, &cols)
                .unwrap_err()
                .to_string(),
            "The parameter 'start_v' does not match 'stimulus_elements' and 'behaviors'."
        );
    }

    fn alphabet_strategy(prefix: &'static str) -> impl Strategy<Value = Vec<String>> {
        (1usize..6).prop_map(move |n| (0..n).map(|i| format!("{}{}", prefix, i)).collect())
    }

    proptest! {
        #[test]
        fn scalar_expansion_fills_every_key(
            elements in alphabet_strategy("e"),
            behaviors in alphabet_strategy("b"),
            value in -10.0f64..10.0,
        ) {
            let rows = Alphabet::new(elements.clone());
            let cols = Alphabet::new(behaviors.clone());
            let matrix = TableValue::Scalar(value)
                .to_matrix("alpha_v", TableKind::ElementBehavior, &rows, &cols)
                .unwrap();
            for r in 0..rows.len() {
                for c in 0..cols.len() {
                    prop_assert_eq!(matrix.get(r, c), Some(value));
                }
            }
            let vss = TableValue::Scalar(value)
                .to_matrix("alpha_vss", TableKind::ElementElement, &rows, &rows)
                .unwrap();
            prop_assert_eq!(vss.rows() * vss.cols(), elements.len() * elements.len());
            let u = TableValue::Scalar(value).to_vector("u", TableKind::Element, &rows).unwrap();
            prop_assert!(u.iter().all(|x| *x == value));
        }

        #[test]
        fn map_with_missing_key_is_rejected(
            elements in alphabet_strategy("e"),
            behaviors in alphabet_strategy("b"),
            drop in 0usize..36,
        ) {
            let mut keys: Vec<TableKey> = TableKind::ElementBehavior
                .expected_keys(&elements, &behaviors)
                .into_iter()
                .collect();
            keys.remove(drop % keys.len());
            let value = TableValue::Map(keys.into_iter().map(|k| (k, 1.0)).collect());
            let rows = Alphabet::new(elements);
            let cols = Alphabet::new(behaviors);
            prop_assert!(value
                .to_matrix("start_v", TableKind::ElementBehavior, &rows, &cols)
                .is_err());
        }
    }
}
