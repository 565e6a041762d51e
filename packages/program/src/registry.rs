//! Compile-time registry of embedded program rule sets.
//!
//! Each entry is a `(id, toml_content)` pair embedded via `include_str!`.
//! Adding a program requires creating a TOML file in `programs/` and
//! adding a corresponding entry here.

use parcel_scout_scoring_models::ProgramConfig;

/// Number of registered programs. Updated when new programs are added.
/// Enforced by a test.
#[cfg(test)]
const EXPECTED_PROGRAM_COUNT: usize = 2;

/// Embedded TOML program definitions.
const PROGRAM_TOMLS: &[(&str, &str)] = &[
    ("ca_ctcac_9pct", include_str!("../programs/ca_ctcac_9pct.toml")),
    ("tx_tdhca_4pct", include_str!("../programs/tx_tdhca_4pct.toml")),
];

/// Returns all registered programs, parsed and validated.
///
/// # Panics
///
/// Panics if any embedded TOML fails to parse or validate. Since these
/// are compile-time constants, failures indicate a development error and
/// are caught during CI.
#[must_use]
pub fn all_programs() -> Vec<ProgramConfig> {
    PROGRAM_TOMLS
        .iter()
        .map(|(id, toml_text)| {
            crate::load_program_str(toml_text)
                .unwrap_or_else(|e| panic!("Failed to load embedded program '{id}': {e}"))
        })
        .collect()
}

/// Finds a registered program by id.
#[must_use]
pub fn find_program(id: &str) -> Option<ProgramConfig> {
    all_programs().into_iter().find(|program| program.id == id)
}
