//! Caller identity and session identifiers.
//!
//! Both are opaque strings owned by someone else (the caller and the session
//! store). They are never validated, trimmed or normalized here: the exact
//! bytes received on a request are the bytes every downstream layer sees.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

opaque_id!(
    /// External user identity. Passed byte-for-byte through every layer.
    UserId
);

opaque_id!(
    /// Store-assigned session identifier.
    SessionId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_is_not_normalized() {
        let raw = "  Teacher.Priya+worksheet_agent@School ";
        let id = UserId::from(raw);
        assert_eq!(id.as_str(), raw);
        assert_eq!(id.to_string(), raw);
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = SessionId::new("123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"123\"");
        let back: SessionId = serde_json::from_str("\"123\"").unwrap();
        assert_eq!(back, id);
    }
}
