//! Serde helpers for presence-aware partial updates.

use serde::{Deserialize, Deserializer};

/// Deserialize a nullable field so that a present `null` becomes `Some(None)`.
///
/// Pair with `#[serde(default)]` so an absent key stays `None`.
pub fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "super::nullable")]
        value: Option<Option<String>>,
    }

    #[test]
    fn absent_key_is_none() {
        let sample: Sample = serde_json::from_str("{}").unwrap();
        assert_eq!(sample.value, None);
    }

    #[test]
    fn explicit_null_clears() {
        let sample: Sample = serde_json::from_str(r#"{"value": null}"#).unwrap();
        assert_eq!(sample.value, Some(None));
    }

    #[test]
    fn present_value_sets() {
        let sample: Sample = serde_json::from_str(r#"{"value": "x"}"#).unwrap();
        assert_eq!(sample.value, Some(Some("x".to_string())));
    }
}
