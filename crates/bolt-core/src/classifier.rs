use crate::types::PhaseType;

/// Environment short-codes and the lifecycle phase each belongs to.
///
/// Keys are upper-case; lookups upper-case the token first.
pub const ENVIRONMENT_PHASES: &[(&str, PhaseType)] = &[
    ("DEV", PhaseType::Dev),
    ("DIF", PhaseType::Dev),
    ("SE", PhaseType::Lle),
    ("PL1", PhaseType::Lle),
    ("PL2", PhaseType::Lle),
    ("QA", PhaseType::Lle),
    ("SAPE", PhaseType::Lle),
    ("UAT", PhaseType::Lle),
    ("PODA", PhaseType::Prod),
    ("PODB", PhaseType::Prod),
    ("PODC", PhaseType::Prod),
    ("PODD", PhaseType::Prod),
    ("PODE", PhaseType::Prod),
    ("PODF", PhaseType::Prod),
    ("DARKPROD", PhaseType::Prod),
    ("DARKPOD", PhaseType::Prod),
    ("DP", PhaseType::Prod),
    ("DPROD", PhaseType::Prod),
    ("PROD", PhaseType::Prod),
    ("POD", PhaseType::Prod),
    ("PRODUCTION", PhaseType::Prod),
];

/// Classify an environment token. Total: unrecognized tokens are `Unknown`.
pub fn classify(token: &str) -> PhaseType {
    let key = token.trim().to_ascii_uppercase();
    ENVIRONMENT_PHASES
        .iter()
        .find(|(code, _)| *code == key)
        .map(|(_, phase)| *phase)
        .unwrap_or(PhaseType::Unknown)
}
