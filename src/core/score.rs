use crate::Error;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// A two-level score. Hard level is compared first, soft level breaks ties.
/// Higher is better on both levels, penalties are negative.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct HardSoftScore {
    pub hard: i64,
    pub soft: i64,
}

impl HardSoftScore {
    pub const ZERO: Self = Self::new(0, 0);
    pub const ONE_HARD: Self = Self::new(1, 0);
    pub const ONE_SOFT: Self = Self::new(0, 1);

    /// Creates a new score.
    #[must_use]
    pub const fn new(hard: i64, soft: i64) -> Self {
        Self { hard, soft }
    }

    /// Creates a score with only the hard level set.
    #[must_use]
    pub const fn of_hard(hard: i64) -> Self {
        Self::new(hard, 0)
    }

    /// Creates a score with only the soft level set.
    #[must_use]
    pub const fn of_soft(soft: i64) -> Self {
        Self::new(0, soft)
    }

    /// Returns whether no hard constraint is violated.
    #[must_use]
    pub const fn is_feasible(&self) -> bool {
        self.hard == 0
    }
}

impl std::ops::Add for HardSoftScore {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(
            self.hard.saturating_add(rhs.hard),
            self.soft.saturating_add(rhs.soft),
        )
    }
}

impl std::ops::AddAssign for HardSoftScore {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for HardSoftScore {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |sum, score| sum + score)
    }
}

impl PartialOrd<Self> for HardSoftScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HardSoftScore {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.hard.cmp(&other.hard) {
            Ordering::Equal => self.soft.cmp(&other.soft),
            order => order,
        }
    }
}

impl Display for HardSoftScore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}hard/{}soft", self.hard, self.soft)
    }
}

impl FromStr for HardSoftScore {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidScore(text.into());

        let (hard, soft) = text.trim().split_once('/').ok_or_else(invalid)?;
        let hard = hard.strip_suffix("hard").ok_or_else(invalid)?;
        let soft = soft.strip_suffix("soft").ok_or_else(invalid)?;

        Ok(Self::new(
            hard.parse().map_err(|_| invalid())?,
            soft.parse().map_err(|_| invalid())?,
        ))
    }
}

impl TryFrom<String> for HardSoftScore {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HardSoftScore> for String {
    fn from(score: HardSoftScore) -> Self {
        score.to_string()
    }
}
