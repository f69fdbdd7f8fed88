//! Prompt construction for element and summary requests.

use notecheck_core::{Checklist, ElementResult, Element};

/// Prompt asking for one element's assessment in the labelled reply format.
pub fn element_prompt(note_text: &str, element: &Element, custom_instruction: Option<&str>) -> String {
    let mut prompt = String::new();
    let requirement = if element.required {
        "REQUIRED"
    } else {
        "RECOMMENDED"
    };

    prompt.push_str(&format!(
        "System: You are a regulatory compliance reviewer assessing whether a financial \
         advice note meets a specific requirement under {} severity. Be precise and \
         conservative: only mark an element as 'present' if it is clearly and adequately \
         documented. Partial credit ('partial') applies when the topic is raised but \
         insufficiently documented; 'missing' means there is no meaningful mention \
         whatsoever.\n\n",
        element.severity.as_str().to_uppercase()
    ));
    prompt.push_str(&format!("Requirement ({}): {}\n", requirement, element.description.trim()));

    if let Some(guidance) = element.guidance.as_deref().filter(|g| !g.trim().is_empty()) {
        prompt.push_str(&format!("\nEvaluation guidance:\n{}\n", guidance.trim()));
    }

    if !element.examples.is_empty() {
        prompt.push_str("\nEXAMPLES (phrases that would count as evidence):\n");
        for example in &element.examples {
            prompt.push_str(&format!("- \"{}\"\n", example));
        }
    }

    if !element.anti_patterns.is_empty() {
        prompt.push_str("\nANTI-PATTERNS (these do NOT constitute compliant evidence):\n");
        for anti_pattern in &element.anti_patterns {
            prompt.push_str(&format!("- \"{}\"\n", anti_pattern));
        }
    }

    if let Some(instruction) = custom_instruction.filter(|i| !i.trim().is_empty()) {
        prompt.push_str(&format!("\nAdditional instructions:\n{}\n", instruction.trim()));
    }

    prompt.push_str(&format!("\nNote text:\n---\n{}\n---\n\n", note_text));

    prompt.push_str(
        "Assess this requirement and respond using ONLY this exact format (no other text):\n\
         STATUS: present|partial|missing\n\
         SCORE: <float 0.0-1.0>\n\
         EVIDENCE: <direct quote or paraphrase from the note, or \"None found\">\n\
         NOTES: <brief explanation of your assessment>\n\
         SUGGESTIONS: <if partial or missing, up to 3 specific remediation actions separated by \" | \", otherwise \"None\">",
    );

    prompt
}

/// Prompt asking for a short narrative over the finished results.
pub fn summary_prompt(checklist: &Checklist, results: &[ElementResult]) -> String {
    let gaps: Vec<String> = results
        .iter()
        .filter(|r| r.is_gap())
        .map(|r| format!("  - [{}] {}: {}", r.severity.as_str().to_uppercase(), r.element_id, r.status))
        .collect();
    let gaps_text = if gaps.is_empty() {
        "  (none)".to_string()
    } else {
        gaps.join("\n")
    };

    let total = results.len();
    let present = results.iter().filter(|r| !r.is_gap()).count();

    format!(
        "System: You are a regulatory compliance analyst. Write a concise (3-5 sentence) \
         plain-English summary of the following compliance note evaluation.\n\n\
         Framework: {} (v{})\n\
         Elements assessed: {}\n\
         Elements present: {}/{}\n\
         Gaps identified:\n{}\n\n\
         Write a professional, factual summary suitable for an audit trail. \
         Do not invent information beyond what is provided above.",
        checklist.name, checklist.version, total, present, total, gaps_text
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use notecheck_core::{ElementStatus, Severity};

    fn element() -> Element {
        Element {
            id: "risk_attitude".to_string(),
            name: None,
            description: "  Attitude to risk assessed  ".to_string(),
            required: false,
            severity: Severity::High,
            guidance: Some("Look for a risk profile score".to_string()),
            examples: vec!["balanced".to_string()],
            anti_patterns: vec!["client is happy".to_string()],
        }
    }

    #[test]
    fn test_element_prompt_sections() {
        let prompt = element_prompt("Client wants growth.", &element(), Some("Be strict."));
        assert!(prompt.contains("under HIGH severity"));
        assert!(prompt.contains("Requirement (RECOMMENDED): Attitude to risk assessed\n"));
        assert!(prompt.contains("Evaluation guidance:\nLook for a risk profile score"));
        assert!(prompt.contains("- \"balanced\""));
        assert!(prompt.contains("ANTI-PATTERNS"));
        assert!(prompt.contains("Additional instructions:\nBe strict."));
        assert!(prompt.contains("---\nClient wants growth.\n---"));
        for label in ["STATUS:", "SCORE:", "EVIDENCE:", "NOTES:", "SUGGESTIONS:"] {
            assert!(prompt.contains(label), "{label}");
        }
    }

    #[test]
    fn test_element_prompt_block_layout() {
        let prompt = element_prompt("Client wants growth.", &element(), None);
        assert!(prompt.contains("- \"balanced\"\n\nANTI-PATTERNS"));
        assert!(prompt.contains("- \"client is happy\"\n\nNote text:\n---\n"));
        assert!(prompt.ends_with("otherwise \"None\">"));
    }

    #[test]
    fn test_element_prompt_omits_empty_blocks() {
        let mut bare = element();
        bare.guidance = None;
        bare.examples.clear();
        bare.anti_patterns.clear();
        bare.required = true;

        let prompt = element_prompt("note", &bare, None);
        assert!(prompt.contains("Requirement (REQUIRED)"));
        assert!(!prompt.contains("Evaluation guidance"));
        assert!(!prompt.contains("EXAMPLES"));
        assert!(!prompt.contains("Additional instructions"));
    }

    #[test]
    fn test_summary_prompt_lists_gaps() {
        let checklist = notecheck_core::resolve_checklist("fca_suitability_v1").unwrap();
        let results = vec![ElementResult {
            element_id: "risk_attitude".to_string(),
            name: "Risk Attitude".to_string(),
            status: ElementStatus::Missing,
            score: 0.0,
            evidence: None,
            severity: Severity::Critical,
            required: true,
            notes: None,
            suggestions: Vec::new(),
        }];

        let prompt = summary_prompt(&checklist, &results);
        assert!(prompt.contains("Elements present: 0/1"));
        assert!(prompt.contains("  - [CRITICAL] risk_attitude: missing"));
        assert!(prompt.contains(&format!("(v{})", checklist.version)));
    }
}
