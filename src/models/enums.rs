use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(DocumentStatus {
    Unprocessed => "UNPROCESSED",
    Processing => "PROCESSING",
    Processed => "PROCESSED",
    Pushed => "PUSHED",
    Failed => "FAILED",
    Error => "ERROR",
});

str_enum!(TicketPriority {
    Low => "LOW",
    Medium => "MEDIUM",
    High => "HIGH",
});

str_enum!(TicketStatus {
    Pending => "PENDING",
    InProgress => "IN_PROGRESS",
    Completed => "COMPLETED",
});

str_enum!(PublishState {
    NotStarted => "NOT_STARTED",
    TrackerADone => "TRACKER_A_DONE",
    BothDone => "BOTH_DONE",
    Failed => "FAILED",
});

impl TicketPriority {
    /// Lenient mapping for model output: case-insensitive, MEDIUM otherwise.
    pub fn from_loose(raw: Option<&str>) -> Self {
        raw.map(|s| s.trim().to_uppercase())
            .and_then(|s| s.parse().ok())
            .unwrap_or(Self::Medium)
    }

    /// Label used on GitLab issues.
    pub fn label(&self) -> String {
        self.as_str().to_lowercase()
    }
}
