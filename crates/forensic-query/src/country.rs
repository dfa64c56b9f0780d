//! Country code table used by the `country` operator on phone fields.
//!
//! Names follow the upper-case, underscore-separated convention of the
//! investigator-facing DSL (`UAE`, `SOUTH_KOREA`). Lookups also accept a few
//! common aliases and the dialing code itself.

use serde::Serialize;

/// A country and the international dialing prefix its numbers start with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountryCode {
    pub name: &'static str,
    pub prefix: &'static str,
}

/// Raised when a country cannot be resolved to a dialing prefix.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown country '{0}'")]
pub struct UnknownCountry(pub String);

const fn cc(name: &'static str, prefix: &'static str) -> CountryCode {
    CountryCode { name, prefix }
}

static COUNTRY_CODES: &[CountryCode] = &[
    cc("UAE", "+971"),
    cc("USA", "+1"),
    cc("UK", "+44"),
    cc("INDIA", "+91"),
    cc("CHINA", "+86"),
    cc("GERMANY", "+49"),
    cc("FRANCE", "+33"),
    cc("JAPAN", "+81"),
    cc("BRAZIL", "+55"),
    cc("RUSSIA", "+7"),
    cc("CANADA", "+1"),
    cc("AUSTRALIA", "+61"),
    cc("SOUTH_KOREA", "+82"),
    cc("ITALY", "+39"),
    cc("SPAIN", "+34"),
    cc("NETHERLANDS", "+31"),
    cc("SWEDEN", "+46"),
    cc("NORWAY", "+47"),
    cc("DENMARK", "+45"),
    cc("FINLAND", "+358"),
    cc("POLAND", "+48"),
    cc("TURKEY", "+90"),
    cc("SAUDI_ARABIA", "+966"),
    cc("EGYPT", "+20"),
    cc("SOUTH_AFRICA", "+27"),
    cc("NIGERIA", "+234"),
    cc("KENYA", "+254"),
    cc("MOROCCO", "+212"),
    cc("ALGERIA", "+213"),
    cc("TUNISIA", "+216"),
    cc("LIBYA", "+218"),
    cc("SUDAN", "+249"),
    cc("ETHIOPIA", "+251"),
    cc("UGANDA", "+256"),
    cc("TANZANIA", "+255"),
    cc("GHANA", "+233"),
    cc("IVORY_COAST", "+225"),
    cc("SENEGAL", "+221"),
    cc("MALI", "+223"),
    cc("BURKINA_FASO", "+226"),
    cc("NIGER", "+227"),
    cc("CHAD", "+235"),
    cc("CAMEROON", "+237"),
    cc("CENTRAL_AFRICAN_REPUBLIC", "+236"),
    cc("CONGO", "+242"),
    cc("DEMOCRATIC_REPUBLIC_OF_CONGO", "+243"),
    cc("GABON", "+241"),
    cc("EQUATORIAL_GUINEA", "+240"),
    cc("SAO_TOME_AND_PRINCIPE", "+239"),
    cc("CAPE_VERDE", "+238"),
    cc("GUINEA", "+224"),
    cc("GUINEA_BISSAU", "+245"),
    cc("SIERRA_LEONE", "+232"),
    cc("LIBERIA", "+231"),
    cc("GAMBIA", "+220"),
    cc("MAURITANIA", "+222"),
];

/// Alternate spellings → canonical table name.
static ALIASES: &[(&str, &str)] = &[
    ("UNITED_ARAB_EMIRATES", "UAE"),
    ("EMIRATES", "UAE"),
    ("US", "USA"),
    ("UNITED_STATES", "USA"),
    ("UNITED_STATES_OF_AMERICA", "USA"),
    ("GB", "UK"),
    ("GREAT_BRITAIN", "UK"),
    ("UNITED_KINGDOM", "UK"),
    ("KOREA", "SOUTH_KOREA"),
    ("COTE_D'IVOIRE", "IVORY_COAST"),
    ("DRC", "DEMOCRATIC_REPUBLIC_OF_CONGO"),
];

/// Every entry of the table, in table order.
pub fn countries() -> &'static [CountryCode] {
    COUNTRY_CODES
}

fn normalize(input: &str) -> String {
    input
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

/// Resolve a country name, alias or dialing code to its table entry.
///
/// Shared dialing codes resolve to the first country listed with that code
/// (`+1` → `USA`); the prefix is the same either way.
pub fn lookup(country: &str) -> Option<&'static CountryCode> {
    let key = normalize(country);
    if key.is_empty() {
        return None;
    }

    if key.chars().all(|c| c.is_ascii_digit() || c == '+') {
        let digits = key.trim_start_matches('+');
        if digits.is_empty() || key.matches('+').count() > 1 {
            return None;
        }
        return COUNTRY_CODES.iter().find(|c| &c.prefix[1..] == digits);
    }

    let canonical = ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, name)| *name)
        .unwrap_or(key.as_str());

    COUNTRY_CODES.iter().find(|c| c.name == canonical)
}

/// Dialing prefix for `country`, e.g. `"+971"` for `"UAE"`.
pub fn prefix_for(country: &str) -> Result<&'static str, UnknownCountry> {
    lookup(country)
        .map(|c| c.prefix)
        .ok_or_else(|| UnknownCountry(country.to_string()))
}

/// `LIKE` pattern matching every number that starts with `prefix`.
pub fn like_pattern(prefix: &str) -> String {
    format!("{prefix}%")
}
