//! Closed vocabularies shared by every layer (DTOs, services, storage).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! closed_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!(
                        "unknown {} '{}'",
                        stringify!($name),
                        other
                    )),
                }
            }
        }
    };
}

closed_enum!(Subject {
    Verbal => "Verbal",
    Reasoning => "Reasoning",
    Technical => "Technical",
    Arithmetic => "Arithmetic",
    Communication => "Communication",
});

closed_enum!(TestType {
    Assessment => "Assessment",
    Practice => "Practice",
    Assignment => "Assignment",
    MockTest => "MockTest",
    CompanyTest => "CompanyTest",
});

closed_enum!(Difficulty {
    Easy => "Easy",
    Medium => "Medium",
    Hard => "Hard",
});

closed_enum!(
    /// Label of one of the four options every question carries.
    OptionLabel {
        A => "A",
        B => "B",
        C => "C",
        D => "D",
    }
);

closed_enum!(AssignmentStatus {
    Pending => "pending",
    Accepted => "accepted",
    Rejected => "rejected",
});

impl OptionLabel {
    /// Lenient parse used for student input: case and surrounding space are ignored.
    pub fn parse_selected(raw: &str) -> Option<Self> {
        raw.trim().to_ascii_uppercase().parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_round_trip_through_text() {
        for subject in Subject::ALL {
            assert_eq!(subject.as_str().parse::<Subject>().unwrap(), *subject);
        }
        assert_eq!("MockTest".parse::<TestType>().unwrap(), TestType::MockTest);
        assert!("mocktest".parse::<TestType>().is_err());
    }

    #[test]
    fn selected_answer_parse_is_lenient() {
        assert_eq!(OptionLabel::parse_selected(" b "), Some(OptionLabel::B));
        assert_eq!(OptionLabel::parse_selected("E"), None);
        assert_eq!(OptionLabel::parse_selected(""), None);
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&AssignmentStatus::Accepted).unwrap();
        assert_eq!(json, "\"accepted\"");
        let parsed: TestType = serde_json::from_str("\"CompanyTest\"").unwrap();
        assert_eq!(parsed, TestType::CompanyTest);
    }
}
