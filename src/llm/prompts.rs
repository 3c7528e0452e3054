//! Prompt contract for newsletter digests.

/// System prompt for every digest request.
pub const SYSTEM_PROMPT: &str = "You are a concise newsletter summarizer like Inshorts.\n\
Extract the most important stories from TLDR newsletter emails.\n\
Format strictly for WhatsApp with bold headings and plain summaries.";

/// User prompt for one newsletter body.
pub fn summary_prompt(body: &str) -> String {
    format!(
        "Summarize this TLDR newsletter into Inshorts style.\n\n\
         Format each card EXACTLY like this (no deviations):\n\n\
         *NEWS HEADLINE IN BOLD CAPS*\n\
         One crisp paragraph. Max 60 words. Who, what, why it matters. No fluff.\n\n\
         Newsletter:\n\
         {body}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_prompt_embeds_body_last() {
        let prompt = summary_prompt("OpenAI ships a thing.");
        assert!(prompt.contains("*NEWS HEADLINE IN BOLD CAPS*"));
        assert!(prompt.ends_with("Newsletter:\nOpenAI ships a thing."));
    }

    #[test]
    fn system_prompt_targets_whatsapp() {
        assert!(SYSTEM_PROMPT.contains("WhatsApp"));
    }
}
