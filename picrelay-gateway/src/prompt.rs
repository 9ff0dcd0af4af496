//! Prompt enrichment before the provider call.

use picrelay_core::Job;

/// Wraps user prompts with configured instructions.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    preamble: Option<String>,
}

impl PromptBuilder {
    pub fn new(preamble: Option<String>) -> Self {
        let preamble = preamble
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        Self { preamble }
    }

    /// Final text sent to the provider for `job`.
    pub fn build(&self, job: &Job, template_count: usize) -> String {
        let mut sections = Vec::with_capacity(3);

        if let Some(preamble) = &self.preamble {
            sections.push(preamble.clone());
        }

        let attached = job.reference_images.len();
        if attached > 0 || template_count > 0 {
            let total = attached + template_count;
            sections.push(format!(
                "Use the {} attached image{} as visual reference.",
                total,
                if total == 1 { "" } else { "s" }
            ));
        }

        sections.push(job.prompt.clone());
        sections.join("\n\n")
    }
}
