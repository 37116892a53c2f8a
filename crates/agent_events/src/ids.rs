use std::fmt;

use serde::Serialize;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Returns `None` for an empty string; an absent id is never an empty one.
            pub fn new(raw: impl Into<String>) -> Option<Self> {
                let raw = raw.into();
                if raw.is_empty() {
                    return None;
                }
                Some(Self(raw))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
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
    /// Session (Claude Code, OpenCode) or thread (Codex) identifier used to resume an agent.
    SessionId
);

opaque_id!(
    /// Identifier correlating a tool request with its result.
    ToolCallId
);

opaque_id!(
    /// OpenCode message identifier carried on `part.messageID`.
    MessageId
);
