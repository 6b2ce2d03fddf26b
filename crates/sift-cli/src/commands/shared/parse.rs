use serde::de::DeserializeOwned;

/// Parse a snake_case enum value using serde-deserialization.
pub fn parse_enum<T>(raw: &str, field: &str) -> anyhow::Result<T>
where
    T: DeserializeOwned,
{
    let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
    serde_json::from_value(serde_json::Value::String(normalized))
        .map_err(|error| anyhow::anyhow!("invalid {field} '{raw}': {error}"))
}

/// Parse a JSON object argument such as a credential blob or list query.
pub fn parse_object(raw: &str, field: &str) -> anyhow::Result<serde_json::Value> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|error| anyhow::anyhow!("invalid {field} JSON: {error}"))?;
    if !value.is_object() {
        anyhow::bail!("invalid {field}: expected a JSON object");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use sift_core::enums::Provider;

    use super::{parse_enum, parse_object};

    #[test]
    fn parses_provider_case_insensitively() {
        let provider: Provider = parse_enum("GitHub", "provider").expect("provider should parse");
        assert_eq!(provider, Provider::Github);
    }

    #[test]
    fn errors_on_unknown_provider() {
        let err = parse_enum::<Provider>("gitlab", "provider").expect_err("should fail");
        assert!(err.to_string().contains("invalid provider 'gitlab'"));
    }

    #[test]
    fn objects_only() {
        assert!(parse_object(r#"{"token": "x"}"#, "credentials").is_ok());
        assert!(parse_object(r#"["x"]"#, "credentials").is_err());
        assert!(parse_object("{not json", "query").is_err());
    }
}
