use std::iter::repeat;
use std::path::{Path, PathBuf};

use base64::engine::GeneralPurpose;

pub fn find_first_subpath<P: AsRef<Path>, F: Fn(&Path) -> bool>(
    root: impl AsRef<Path>,
    subpaths: &[P],
    search: F,
) -> Option<PathBuf> {
    subpaths
        .iter()
        .zip(repeat(root.as_ref()))
        .map(|(b, a)| a.join(b))
        .find(|it: &PathBuf| search(it))
}

/// Padded standard alphabet, the form Rocket accepts for `secret_key`.
pub fn base64_engine() -> GeneralPurpose {
    base64::engine::GeneralPurpose::new(
        &base64::alphabet::STANDARD,
        base64::engine::GeneralPurposeConfig::new(),
    )
}

/// Serializes `DateTime<Utc>` as a JWT "NumericDate" (RFC 7519 section 2).
pub mod date_time_as_unix_seconds {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(date.timestamp())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Utc.timestamp_opt(i64::deserialize(deserializer)?, 0)
            .single()
            .ok_or_else(|| serde::de::Error::custom("Invalid Unix timestamp value."))
    }
}

/// Like `bson::serde_helpers::uuid_1_as_binary`, for optional references.
pub mod option_uuid_as_binary {
    use serde::{Deserialize, Deserializer, Serializer};
    use uuid::Uuid;

    pub fn serialize<S>(value: &Option<Uuid>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(id) => bson::serde_helpers::uuid_1_as_binary::serialize(id, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Uuid>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<bson::Uuid>::deserialize(deserializer)?.map(Uuid::from))
    }
}

/// Trims the value and maps blank strings to `None`.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|it| !it.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_blank_drops_whitespace_only() {
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some(" Intro ")), Some("Intro".to_string()));
    }

    #[test]
    fn first_existing_subpath_is_found() {
        let found = find_first_subpath("/config", &["a.yml", "b.yml"], |p: &Path| {
            p.ends_with("b.yml")
        });
        assert_eq!(found, Some(PathBuf::from("/config/b.yml")));
    }
}
