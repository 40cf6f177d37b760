//! Macro for strongly-typed, non-empty string identifiers.
//!
//! Remote IDs and stable resource keys are both plain strings on the wire but
//! must never be confused with one another or with free-form names.

/// Define a non-empty string newtype.
///
/// The generated type serializes transparently, rejects empty strings on
/// deserialization, and offers `try_new`, `as_str`, `Display`, `AsRef<str>`
/// and `Borrow<str>` (so it can key a `BTreeMap` looked up by `&str`).
macro_rules! define_newtype_string {
    (
        $(#[$meta:meta])*
        $vis:vis struct $Name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(try_from = "String", into = "String")]
        $vis struct $Name(String);

        impl $Name {
            /// Create a new value, returning `None` for an empty string.
            pub fn try_new(value: impl Into<String>) -> Option<Self> {
                let s = value.into();
                (!s.is_empty()).then_some(Self(s))
            }

            /// Borrow the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $Name {
            type Error = String;
            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::try_new(s)
                    .ok_or_else(|| concat!(stringify!($Name), " must not be empty").to_string())
            }
        }

        impl From<$Name> for String {
            fn from(value: $Name) -> String {
                value.0
            }
        }

        impl std::fmt::Display for $Name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $Name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $Name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $Name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $Name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

pub(crate) use define_newtype_string;
