// Argument binding: variables, settings and positional values passed
// alongside an expression string

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Dialect options for expression compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Resolve member, method and variable names ignoring ASCII case
    pub case_insensitive_members: bool,
    /// Name under which a bare expression can refer to its parameter
    pub implicit_parameter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            case_insensitive_members: false,
            implicit_parameter: "it".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from JSON; missing keys keep their defaults.
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub(crate) fn names_match(&self, declared: &str, written: &str) -> bool {
        if self.case_insensitive_members {
            declared.eq_ignore_ascii_case(written)
        } else {
            declared == written
        }
    }
}

/// Everything an expression string may refer to besides its parameters.
///
/// Scoped to a single operator call: `@0, @1, ...` read `values`, `@name`
/// and bare identifiers that are not members read `variables`.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    variables: Option<IndexMap<String, Value>>,
    settings: Option<Settings>,
    values: Vec<Value>,
}

impl Bindings {
    pub fn new() -> Self {
        Bindings::default()
    }

    pub fn with_variables(mut self, variables: IndexMap<String, Value>) -> Self {
        self.variables = Some(variables);
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables
            .get_or_insert_with(IndexMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_values(mut self, values: Vec<Value>) -> Self {
        self.values = values;
        self
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.values.push(value.into());
        self
    }

    pub fn variables(&self) -> Option<&IndexMap<String, Value>> {
        self.variables.as_ref()
    }

    pub fn settings(&self) -> Option<&Settings> {
        self.settings.as_ref()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Positional value `@index`
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Look up a variable; name matching follows `settings`.
    pub fn variable(&self, name: &str, settings: &Settings) -> Option<&Value> {
        let variables = self.variables.as_ref()?;
        variables.get(name).or_else(|| {
            variables
                .iter()
                .find(|(declared, _)| settings.names_match(declared, name))
                .map(|(_, value)| value)
        })
    }
}

impl From<()> for Bindings {
    fn from(_: ()) -> Self {
        Bindings::default()
    }
}

impl From<Vec<Value>> for Bindings {
    fn from(values: Vec<Value>) -> Self {
        Bindings::default().with_values(values)
    }
}

impl<V: Into<Value>, const N: usize> From<[V; N]> for Bindings {
    fn from(values: [V; N]) -> Self {
        Bindings::default().with_values(values.into_iter().map(Into::into).collect())
    }
}

impl From<IndexMap<String, Value>> for Bindings {
    fn from(variables: IndexMap<String, Value>) -> Self {
        Bindings::default().with_variables(variables)
    }
}

impl From<Settings> for Bindings {
    fn from(settings: Settings) -> Self {
        Bindings::default().with_settings(settings)
    }
}

impl From<&Bindings> for Bindings {
    fn from(bindings: &Bindings) -> Self {
        bindings.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_unit_is_empty() {
        let b = Bindings::from(());
        assert!(b.variables().is_none());
        assert!(b.settings().is_none());
        assert!(b.values().is_empty());
    }

    #[test]
    fn test_positional_from_array() {
        let b = Bindings::from([5, 7]);
        assert_eq!(b.value(0), Some(&Value::Int(5)));
        assert_eq!(b.value(1), Some(&Value::Int(7)));
        assert_eq!(b.value(2), None);
    }

    #[test]
    fn test_variable_lookup_follows_settings() {
        let b = Bindings::new().with_variable("MinId", 3);
        let exact = Settings::default();
        let loose = Settings {
            case_insensitive_members: true,
            ..Settings::default()
        };
        assert_eq!(b.variable("MinId", &exact), Some(&Value::Int(3)));
        assert_eq!(b.variable("minid", &exact), None);
        assert_eq!(b.variable("minid", &loose), Some(&Value::Int(3)));
    }

    #[test]
    fn test_settings_from_json() {
        let s = Settings::from_json_str(r#"{"case_insensitive_members": true}"#).unwrap();
        assert!(s.case_insensitive_members);
        assert_eq!(s.implicit_parameter, "it");
    }
}
