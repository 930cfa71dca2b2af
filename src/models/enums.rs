use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
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

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }
    };
}

str_enum!(ReportStatus {
    Pending => "pending",
    Analyzing => "analyzing",
    Analyzed => "analyzed",
    Error => "error",
});

str_enum!(TestType {
    BloodTest => "blood_test",
    UrineTest => "urine_test",
    XRay => "x_ray",
    Mri => "mri",
    CtScan => "ct_scan",
    Ultrasound => "ultrasound",
    Ecg => "ecg",
    Other => "other",
});

// `Critical` is reserved for a future severity band. The evaluator only
// emits Normal/Low/High today; queries and storage accept all four.
str_enum!(MeasurementStatus {
    Normal => "normal",
    Low => "low",
    High => "high",
    Critical => "critical",
});
