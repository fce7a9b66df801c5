use std::fmt;

use eval::{ComplexFormatParseError, ParameterBinding, Value};
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{MapAccess, Visitor},
    ser::SerializeMap,
};

/// A real number, or a complex number in the `(a+bj)` encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericResult {
    Real(f64),
    Complex(String),
}

impl From<Value> for NumericResult {
    fn from(value: Value) -> Self {
        match value {
            Value::Real(x) => NumericResult::Real(x),
            Value::Complex(_) => NumericResult::Complex(value.to_string()),
        }
    }
}

impl NumericResult {
    pub fn to_value(&self) -> Result<Value, ComplexFormatParseError> {
        match self {
            NumericResult::Real(x) => Ok(Value::Real(*x)),
            NumericResult::Complex(text) => text.parse(),
        }
    }
}

impl fmt::Display for NumericResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericResult::Real(x) => write!(f, "{x}"),
            NumericResult::Complex(text) => f.write_str(text),
        }
    }
}

/// Parameter values keyed by name; serializes as a JSON object in
/// declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterDict(pub Vec<(String, f64)>);

impl From<&ParameterBinding> for ParameterDict {
    fn from(binding: &ParameterBinding) -> Self {
        ParameterDict(
            binding
                .iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        )
    }
}

impl Serialize for ParameterDict {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ParameterDict {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DictVisitor;

        impl<'de> Visitor<'de> for DictVisitor {
            type Value = ParameterDict;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map from parameter names to numbers")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ParameterDict, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry::<String, f64>()? {
                    entries.push(entry);
                }
                Ok(ParameterDict(entries))
            }
        }

        deserializer.deserialize_map(DictVisitor)
    }
}

/// The outcome of parsing and evaluating one answer, with one slot per
/// top-level member.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParseResult {
    pub success: bool,
    pub error_message: Option<String>,
    pub extracted_solutions: Vec<String>,
    pub intermediate_expressions: Vec<Option<String>>,
    pub canonical_expressions: Vec<Option<String>>,
    pub parameter_dict: ParameterDict,
    /// Empty when no member produced a value.
    pub evaluation_results: Vec<Option<NumericResult>>,
}

impl ParseResult {
    pub fn failure(message: impl Into<String>, parameter_dict: ParameterDict) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
            parameter_dict,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EquivalenceResult {
    /// Whether a comparison was carried out.
    pub success: bool,
    pub is_equivalent: bool,
    pub error_message: Option<String>,
    pub model_result: ParseResult,
    pub solution_result: ParseResult,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn parameter_dict_keeps_declaration_order() {
        let dict = ParameterDict(vec![("x".into(), 2.0), ("b".into(), 1.5), ("a".into(), 1.25)]);
        let text = serde_json::to_string(&dict).unwrap();
        assert_eq!(text, r#"{"x":2.0,"b":1.5,"a":1.25}"#);
        assert_eq!(serde_json::from_str::<ParameterDict>(&text).unwrap(), dict);
    }

    #[test]
    fn numeric_results_serialize_untagged() {
        let results = vec![
            Some(NumericResult::from(Value::Real(0.5))),
            Some(NumericResult::from(Value::imaginary_unit())),
            None,
        ];
        assert_eq!(serde_json::to_value(&results).unwrap(), json!([0.5, "(0+1j)", null]));
    }

    #[test]
    fn complex_text_parses_back() {
        let result = NumericResult::Complex("(1.5-2j)".into());
        let value = result.to_value().unwrap();
        assert_eq!(value.as_real(), None);
        assert_eq!(NumericResult::from(value), result);
        assert!(NumericResult::Complex("oops".into()).to_value().is_err());
    }
}
