//! Prompt templates for the generation endpoint.

use super::handlers::GenerationKind;

const RESUME_SYSTEM: &str = "You are an expert resume writer. You produce concise, \
achievement-oriented resume content tailored to a specific job description. \
Use strong action verbs, quantify impact where the candidate's background \
supports it, and never invent experience the candidate does not have.";

const COVER_LETTER_SYSTEM: &str = "You are an expert cover-letter writer. You produce a \
focused one-page cover letter tailored to a specific job description, in a \
professional but warm tone. Never invent experience the candidate does not have.";

pub fn system_prompt(kind: GenerationKind) -> &'static str {
    match kind {
        GenerationKind::Resume => RESUME_SYSTEM,
        GenerationKind::CoverLetter => COVER_LETTER_SYSTEM,
    }
}

pub fn build_prompt(kind: GenerationKind, job_description: &str, context: Option<&str>) -> String {
    let deliverable = match kind {
        GenerationKind::Resume => "a tailored resume",
        GenerationKind::CoverLetter => "a tailored cover letter",
    };

    let mut prompt = format!(
        "Write {deliverable} for the following job description.\n\n\
         ## Job Description\n\n{job_description}\n"
    );

    if let Some(context) = context {
        prompt.push_str(&format!(
            "\n## Candidate Background\n\n{context}\n"
        ));
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_includes_jd_and_context() {
        let p = build_prompt(
            GenerationKind::CoverLetter,
            "Senior Rust Engineer",
            Some("6 years of backend work"),
        );
        assert!(p.contains("Senior Rust Engineer"));
        assert!(p.contains("6 years of backend work"));
        assert!(p.contains("cover letter"));
    }

    #[test]
    fn test_prompt_without_context() {
        let p = build_prompt(GenerationKind::Resume, "Staff Engineer", None);
        assert!(!p.contains("Candidate Background"));
    }
}
