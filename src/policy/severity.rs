// SPDX-License-Identifier: MIT
//! Field severity table — maps detected field names to display tiers.
//!
//! The built-in two-tier table mirrors the detection service's field
//! taxonomy. A deployment can override it with a JSON file shaped
//! `{"high": [...], "medium": [...], "low": [...]}`; missing or malformed
//! files emit a warning and fall back to the defaults.

use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

use super::Severity;

static HIGH_FIELDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "PASSWORD",
        "CREDENTIALS",
        "SSN",
        "DNI",
        "PASSPORTNUMBER",
        "CREDITCARDNUMBER",
        "IP",
        "IPV4",
        "IPV6",
        "MAC",
        "CREDITCARDCVV",
        "ACCOUNTNUMBER",
        "IBAN",
        "PIN",
        "GENETICDATA",
        "BIOMETRICDATA",
        "STREET",
        "VEHICLEVIN",
        "HEALTHDATA",
        "CRIMINALRECORD",
        "CONFIDENTIALDOC",
        "LITECOINADDRESS",
        "BITCOINADDRESS",
        "ETHEREUMADDRESS",
        "PHONEIMEI",
    ]
});

static MEDIUM_FIELDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "EMAIL",
        "PHONENUMBER",
        "URL",
        "CLIENTDATA",
        "EMPLOYEEDATA",
        "SALARYDETAILS",
        "COMPANYNAME",
        "JOBTITLE",
        "JOBTYPE",
        "JOBAREA",
        "ACCOUNTNAME",
        "PROJECTNAME",
        "CODENAME",
        "EDUCATIONHISTORY",
        "CV",
        "SOCIALMEDIAHANDLE",
        "SECONDARYADDRESS",
        "CITY",
        "STATE",
        "COUNTY",
        "ZIPCODE",
        "BUILDINGNUMBER",
        "USERAGENT",
        "VEHICLEVRM",
        "NEARBYGPSCOORDINATE",
        "BIC",
        "MASKEDNUMBER",
        "AMOUNT",
        "CURRENCY",
        "CURRENCYSYMBOL",
        "CURRENCYNAME",
        "CURRENCYCODE",
        "CREDITCARDISSUER",
        "USERNAME",
        "INFRASTRUCTURE",
    ]
});

/// JSON shape expected in a severity override file.
#[derive(Debug, Deserialize)]
struct SeverityConfigFile {
    #[serde(default)]
    high: Vec<String>,
    #[serde(default)]
    medium: Vec<String>,
    #[serde(default)]
    low: Vec<String>,
}

/// Field-name to severity lookup.
///
/// Unmatched names default to [`Severity::Low`], so an unknown field never
/// outranks a known sensitive one in display ordering.
#[derive(Debug, Clone, Default)]
pub struct SeverityTable {
    rules: HashMap<String, Severity>,
}

impl SeverityTable {
    /// The built-in two-tier table.
    pub fn default_rules() -> Self {
        let mut rules = HashMap::new();
        for field in HIGH_FIELDS.iter() {
            rules.insert((*field).to_string(), Severity::High);
        }
        for field in MEDIUM_FIELDS.iter() {
            rules.insert((*field).to_string(), Severity::Medium);
        }
        Self { rules }
    }

    /// Load an override table from a JSON file, layered over the defaults.
    pub fn load_from_json(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %path.display(), err = %e, "severity table not found — using defaults");
                return Self::default_rules();
            }
        };

        let config: SeverityConfigFile = match serde_json::from_str(&content) {
            Ok(c) => c,
            Err(e) => {
                warn!(err = %e, "severity table parse error — using defaults");
                return Self::default_rules();
            }
        };

        let mut table = Self::default_rules();
        for field in config.high {
            table.rules.insert(field.to_ascii_uppercase(), Severity::High);
        }
        for field in config.medium {
            table
                .rules
                .insert(field.to_ascii_uppercase(), Severity::Medium);
        }
        for field in config.low {
            table.rules.insert(field.to_ascii_uppercase(), Severity::Low);
        }
        table
    }

    /// Severity for a field name. Case-insensitive; unknown names are `Low`.
    pub fn lookup(&self, field: &str) -> Severity {
        self.rules
            .get(&field.to_ascii_uppercase())
            .copied()
            .unwrap_or(Severity::Low)
    }
}
