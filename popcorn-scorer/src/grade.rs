//! Member grade labels

use serde::{Serialize, Serializer};
use std::fmt;

/// Display grade derived from a member's popcorn score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Grade {
    Kernel1,
    Kernel2,
    Kernel3,
    EmptyPopcorn,
    OneThirdPopcorn,
    TwoThirdsPopcorn,
    OnePopcorn,
    PopcornMachine,
}

/// Lower bound of each grade, highest first
const THRESHOLDS: [(f64, Grade); 7] = [
    (81.0, Grade::PopcornMachine),
    (71.0, Grade::OnePopcorn),
    (61.0, Grade::TwoThirdsPopcorn),
    (51.0, Grade::OneThirdPopcorn),
    (41.0, Grade::EmptyPopcorn),
    (31.0, Grade::Kernel3),
    (21.0, Grade::Kernel2),
];

impl Grade {
    /// Step function over the fixed thresholds
    pub fn for_score(score: f64) -> Self {
        THRESHOLDS
            .iter()
            .find(|(min, _)| score >= *min)
            .map(|(_, grade)| *grade)
            .unwrap_or(Grade::Kernel1)
    }

    pub fn label(self) -> &'static str {
        match self {
            Grade::PopcornMachine => "popcorn machine",
            Grade::OnePopcorn => "1 popcorn",
            Grade::TwoThirdsPopcorn => "2/3 popcorn",
            Grade::OneThirdPopcorn => "1/3 popcorn",
            Grade::EmptyPopcorn => "empty popcorn",
            Grade::Kernel3 => "kernel 3",
            Grade::Kernel2 => "kernel 2",
            Grade::Kernel1 => "kernel 1",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Grade {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}
