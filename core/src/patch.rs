//! Partial update support
//!
//! Update payloads distinguish a missing key (leave the field alone) from an
//! explicit `null` (clear the field). Fields of type `Option<Option<T>>` use
//! [`double_option`] together with `#[serde(default)]`:
//!
//! * key absent → `None`
//! * key `null` → `Some(None)`
//! * key set    → `Some(Some(value))`

use serde::{Deserialize, Deserializer};

pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "double_option")]
        place: Option<Option<String>>,
    }

    #[test]
    fn test_absent_null_and_value_are_distinct() {
        let absent: Sample = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.place, None);

        let null: Sample = serde_json::from_str(r#"{"place": null}"#).unwrap();
        assert_eq!(null.place, Some(None));

        let set: Sample = serde_json::from_str(r#"{"place": "Szeged"}"#).unwrap();
        assert_eq!(set.place, Some(Some("Szeged".to_string())));
    }
}
