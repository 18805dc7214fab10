//! Prompt templates.

/// Placeholder replaced by [`PromptTemplate::render`].
pub const CONTEXT_PLACEHOLDER: &str = "{context}";

/// Feasibility-study question prompt. Asks the model for `Q<n>:` questions
/// about the project described in `{context}`.
pub const QUESTIONS_TEMPLATE: &str = r#" 
### Request a feasibility study for the financial assistant
**[introduction]**
You are considered an expert financial assistant with specialized skills in conducting feasibility studies for various projects. I am currently exploring a new venture initiative and need your expertise to evaluate its potential for success.

### Example of the initial questions required
Below is an outline of the type of questions that would guide our feasibility study. These questions are designed to delve into various important aspects of the project:
- **Q1:** Who are the target customer segments?
- **Q2:** What is the target market?
- **Q3:** What is the specific problem that the project aims to solve?
- **Q4:** What is the proposed solution to this problem?
- **Q5:** What is the evidence that supports the compatibility of the problem with the solution?

**[Ask initial questions]**
Based on these questions and to ensure a comprehensive and accurate feasibility study is conducted, please provide a list of preliminary questions based on the project details that I will provide. These questions should serve as a guide to our discussions and help gather all the necessary information needed to conduct a comprehensive assessment.

**[Input instructions]**
- **[INST] Query project: {context}**
- **Answer:**
1. Based on the submitted project,
2. We state in bullet points the main questions that must be addressed to develop the feasibility study.
3. No side conversations or assertions, just give me questions in the format mentioned.
**[End of instructions]**"#;

/// A text template with a single `{context}` slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Substitute `context` for every `{context}` occurrence.
    pub fn render(&self, context: &str) -> String {
        self.template.replace(CONTEXT_PLACEHOLDER, context)
    }
}

/// The templates the server renders.
///
/// Retrieval answering renders `questions` as well, with the retrieved
/// chunks as context.
#[derive(Debug, Clone)]
pub struct Prompts {
    pub questions: PromptTemplate,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            questions: PromptTemplate::new(QUESTIONS_TEMPLATE),
        }
    }
}
