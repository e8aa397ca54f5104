//! Scanner manufacturers supported by Connectomist.
//!
//! The package API uses simplified names ("GE" where Connectomist says
//! "GE HealthCare" and a DICOM header says "GE Medical Systems"); this module
//! maps them to the integer IDs Connectomist expects.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A scanner manufacturer known to Connectomist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Manufacturer {
    /// Bruker BioSpin
    Bruker,
    /// GE HealthCare
    #[serde(rename = "GE")]
    Ge,
    /// Philips Healthcare
    Philips,
    /// Siemens Healthineers
    Siemens,
}

impl Manufacturer {
    /// Every supported manufacturer, in Connectomist ID order.
    pub const ALL: [Manufacturer; 4] = [
        Manufacturer::Bruker,
        Manufacturer::Ge,
        Manufacturer::Philips,
        Manufacturer::Siemens,
    ];

    /// The integer Connectomist uses for this manufacturer.
    pub fn id(self) -> i64 {
        match self {
            Manufacturer::Bruker => 0,
            Manufacturer::Ge => 1,
            Manufacturer::Philips => 2,
            Manufacturer::Siemens => 3,
        }
    }

    /// The name used by the package API.
    pub fn name(self) -> &'static str {
        match self {
            Manufacturer::Bruker => "Bruker",
            Manufacturer::Ge => "GE",
            Manufacturer::Philips => "Philips",
            Manufacturer::Siemens => "Siemens",
        }
    }

    /// All accepted names.
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|m| m.name()).collect()
    }

    /// Prefix of the manufacturer-specific keys of the susceptibility tab
    /// (`siemensDeltaTE`, `geEchoSpacing`, ...).
    pub fn parameter_prefix(self) -> &'static str {
        match self {
            Manufacturer::Bruker => "bruker",
            Manufacturer::Ge => "ge",
            Manufacturer::Philips => "philips",
            Manufacturer::Siemens => "siemens",
        }
    }

    /// Parses the label Connectomist stores in `acquisition_parameters.py`,
    /// e.g. "Siemens HealthCare": only the first word is significant.
    pub fn from_acquisition_label(label: &str) -> Result<Self> {
        let first = label.split(' ').next().unwrap_or_default();
        first.parse()
    }
}

impl fmt::Display for Manufacturer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Manufacturer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| Error::BadManufacturer {
                name: s.to_string(),
            })
    }
}
