//! Shared data structures for the application state
//!
//! These structs represent the data model that flows between
//! the record store, the pagination controller and the UI layer.

use std::fmt;

use geo::Point;

use crate::error::PaginationError;

/// A single tree from the inventory
#[derive(Debug, Clone, PartialEq)]
pub struct TreeRecord {
    /// Source object ID
    pub id: i64,
    /// Height in metres, the sort key
    pub height: f64,
    /// x = longitude, y = latitude
    pub location: Point<f64>,
    /// Popup markup, e.g. `<b>Quercus robur</b><br>Height: 21.5m<br>...`
    pub caption: String,
}

impl TreeRecord {
    pub fn latitude(&self) -> f64 {
        self.location.y()
    }

    pub fn longitude(&self) -> f64 {
        self.location.x()
    }
}

/// How many records one "Show more" / "Show less" moves by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StepSize {
    #[default]
    Fifty,
    OneHundred,
    FiveHundred,
    OneThousand,
}

impl StepSize {
    /// All choices, in the order they are offered to the user
    pub const ALL: [StepSize; 4] = [
        StepSize::Fifty,
        StepSize::OneHundred,
        StepSize::FiveHundred,
        StepSize::OneThousand,
    ];

    pub fn get(self) -> usize {
        match self {
            StepSize::Fifty => 50,
            StepSize::OneHundred => 100,
            StepSize::FiveHundred => 500,
            StepSize::OneThousand => 1000,
        }
    }
}

impl TryFrom<usize> for StepSize {
    type Error = PaginationError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        StepSize::ALL
            .into_iter()
            .find(|step| step.get() == value)
            .ok_or(PaginationError::InvalidArgument { value })
    }
}

impl fmt::Display for StepSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}
