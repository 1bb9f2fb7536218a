//! Seam for the external text generator.

use anyhow::Result;

/// Turns a system preamble + prompt into plain text.
///
/// Failures are never fatal: callers fall back to the engine's own strings.
pub trait Enricher {
    fn is_enabled(&self) -> bool;
    fn generate(&self, system: &str, prompt: &str) -> Result<String>;
}

/// Enrichment switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct Disabled;

impl Enricher for Disabled {
    fn is_enabled(&self) -> bool {
        false
    }

    fn generate(&self, _system: &str, _prompt: &str) -> Result<String> {
        anyhow::bail!("text generation is disabled")
    }
}

impl<E: Enricher + ?Sized> Enricher for Box<E> {
    fn is_enabled(&self) -> bool {
        (**self).is_enabled()
    }

    fn generate(&self, system: &str, prompt: &str) -> Result<String> {
        (**self).generate(system, prompt)
    }
}
