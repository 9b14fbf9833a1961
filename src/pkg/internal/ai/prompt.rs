// Prompt assembly for the structured resume extraction call. The schema is
// embedded verbatim in the instruction text; the model is told to reply with
// that JSON object and nothing else.

const RESUME_SCHEMA: &str = r#"{
  "name": "candidate full name or null",
  "email": "email address or null",
  "phone": "phone number as written or null",
  "location": "city/region or null",
  "summary": "two to three sentence professional summary or null",
  "skills": ["skill"],
  "experience": [
    {"title": "job title", "company": "employer", "duration": "e.g. Jan 2020 - Mar 2023", "description": "one line"}
  ],
  "education": [
    {"degree": "degree name", "institution": "school", "year": "graduation year"}
  ]
}"#;

const OUTPUT_RULES: &str = r#"you will output only valid JSON, never markdown, never text explanations.
Always ensure the output is syntactically valid JSON.
All strings must be on a single line; replace internal newlines with \n.
Do not add comments, trailing commas, or extra whitespace.

CRITICAL REQUIREMENTS:
- use null for any field the resume does not provide; never invent facts
- skills: combine the explicit skills section with technologies named in the
  experience descriptions, and infer soft skills (leadership, mentoring,
  communication) from the verbs used in job descriptions (led, mentored,
  presented, coordinated)
- email and phone exactly as written in the resume
- experience ordered most recent first
- Return valid JSON only, no markdown code blocks or explanations"#;

pub fn for_resume_text(resume_text: &str) -> String {
    format!(
        r#"You are an expert technical recruiter. Extract structured data from the resume below.

RESUME:
{}

Return ONLY valid JSON in this exact format (no additional text):

{}

{}
"#,
        resume_text, RESUME_SCHEMA, OUTPUT_RULES
    )
}

pub fn for_inline_document() -> String {
    format!(
        r#"You are an expert technical recruiter. The attached document is a candidate's resume. Read it and extract structured data.

Return ONLY valid JSON in this exact format (no additional text):

{}

{}
"#,
        RESUME_SCHEMA, OUTPUT_RULES
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_prompt_embeds_the_resume_and_the_schema() {
        let prompt = for_resume_text("Jane Doe, staff engineer at Initech");
        assert!(prompt.contains("Jane Doe, staff engineer at Initech"));
        assert!(prompt.contains("\"skills\": [\"skill\"]"));
        assert!(prompt.contains("never markdown"));
    }

    #[test]
    fn inline_prompt_references_the_attachment_instead_of_embedding_text() {
        let prompt = for_inline_document();
        assert!(prompt.contains("attached document"));
        assert!(prompt.contains("\"education\""));
    }
}
