// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Serde adapters for nested blocks, which travel as lists of at most one element.

/// A block that is always present: `T` <-> `[T]`
pub mod single {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S, T>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        std::slice::from_ref(value).serialize(serializer)
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Default,
    {
        let items: Option<Vec<T>> = Option::deserialize(deserializer)?;
        Ok(items.and_then(|v| v.into_iter().next()).unwrap_or_default())
    }
}

/// A block that may be absent: `Option<T>` <-> `[]` or `[T]`
pub mod optional {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S, T>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        value.as_slice().serialize(serializer)
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        let items: Option<Vec<T>> = Option::deserialize(deserializer)?;
        Ok(items.and_then(|v| v.into_iter().next()))
    }
}
