//! One-shot proverb oracle

use crate::oracle::Oracle;
use crate::persona::Persona;
use crate::Result;

/// Ask a generation persona for a proverb; no user input involved
///
/// # Errors
///
/// Returns error if the call fails
pub async fn proverb(oracle: &Oracle, persona: &Persona) -> Result<String> {
    oracle.ask(persona, "", &[]).await
}
