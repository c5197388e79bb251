//! truncate, escape and append

use crate::engine::{Execution, Frame, Scope};
use crate::error::{EvalResult, TransformError};
use crate::value::Item;
use octofhir_fml_ast::Parameter;
use octofhir_fml_types::PrimitiveValue;

impl Execution<'_, '_> {
    pub(super) fn truncate(
        &self,
        frame: Frame<'_>,
        scope: &Scope,
        source: &Parameter,
        length: &Parameter,
    ) -> EvalResult<Option<Item>> {
        let Some(text) = self.parameter_text(frame, scope, source)? else {
            return Ok(None);
        };
        let length = self.required_text(frame, scope, length, "truncate")?;
        let length: usize = length.trim().parse().map_err(|_| {
            TransformError::invalid_argument("truncate", format!("'{length}' is not a length"))
        })?;
        Ok(Some(Item::primitive(PrimitiveValue::String(
            text.chars().take(length).collect(),
        ))))
    }

    pub(super) fn escape(
        &self,
        frame: Frame<'_>,
        scope: &Scope,
        source: &Parameter,
        format_in: &Parameter,
        format_out: Option<&Parameter>,
    ) -> EvalResult<Option<Item>> {
        let Some(text) = self.parameter_text(frame, scope, source)? else {
            return Ok(None);
        };
        let format_in = self.required_text(frame, scope, format_in, "escape")?;
        let format_out = match format_out {
            Some(parameter) => Some(self.required_text(frame, scope, parameter, "escape")?),
            None => None,
        };
        let plain = unescape(&text, &format_in)?;
        let escaped = match format_out.as_deref() {
            Some(format) => escape_as(&plain, format)?,
            None => plain,
        };
        Ok(Some(Item::primitive(PrimitiveValue::String(escaped))))
    }

    pub(super) fn append(
        &self,
        frame: Frame<'_>,
        scope: &Scope,
        values: &[Parameter],
    ) -> EvalResult<Option<Item>> {
        let mut out = String::new();
        for value in values {
            match self.parameter_text(frame, scope, value)? {
                Some(text) => out.push_str(&text),
                None => {
                    return Err(TransformError::invalid_argument(
                        "append",
                        "only primitive values can be appended",
                    ));
                }
            }
        }
        Ok(Some(Item::primitive(PrimitiveValue::String(out))))
    }
}

/// Text encoded in `format`, decoded to plain text
fn unescape(text: &str, format: &str) -> EvalResult<String> {
    Ok(match format {
        "plain" | "text" => text.to_string(),
        "json" => serde_json::from_str::<String>(&format!("\"{text}\"")).map_err(|e| {
            TransformError::invalid_argument("escape", format!("invalid JSON string: {e}"))
        })?,
        "html" | "xml" => text
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&apos;", "'")
            .replace("&amp;", "&"),
        "csv" => match text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
            Some(inner) => inner.replace("\"\"", "\""),
            None => text.to_string(),
        },
        other => return Err(unknown_format(other)),
    })
}

fn escape_as(text: &str, format: &str) -> EvalResult<String> {
    Ok(match format {
        "plain" | "text" => text.to_string(),
        "json" => {
            let quoted = serde_json::Value::String(text.to_string()).to_string();
            quoted[1..quoted.len() - 1].to_string()
        }
        "html" | "xml" => text
            .replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&apos;"),
        "csv" if text.contains([',', '"', '\n']) => format!("\"{}\"", text.replace('"', "\"\"")),
        "csv" => text.to_string(),
        other => return Err(unknown_format(other)),
    })
}

fn unknown_format(format: &str) -> TransformError {
    TransformError::invalid_argument("escape", format!("unknown format {format}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("a<b & c", "html", "a&lt;b &amp; c")]
    #[case("say \"hi\"", "json", "say \\\"hi\\\"")]
    #[case("a,b", "csv", "\"a,b\"")]
    #[case("plain", "csv", "plain")]
    fn test_escape_as(#[case] text: &str, #[case] format: &str, #[case] expected: &str) {
        assert_eq!(escape_as(text, format).unwrap(), expected);
    }

    #[test]
    fn test_unescape_then_escape() {
        let plain = unescape("x &lt; y", "html").unwrap();
        assert_eq!(plain, "x < y");
        assert_eq!(escape_as(&plain, "json").unwrap(), "x < y");
        assert!(unescape("x", "yaml").is_err());
    }
}
