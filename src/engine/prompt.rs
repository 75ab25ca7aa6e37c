/// Instructions given to the chat model for every question
pub const BOOK_AGENT_TEMPLATE: &str = "You are an expert AI Book Agent. A reader has uploaded a book and you \
answer their questions using ONLY the passages from that book shown below.

Context:
{context}

Question: {question}

Rules:
1. Reply in a clear, friendly and conversational way, as a patient tutor would.
2. Be concise unless the reader asks for detail.
3. When a relevant passage refers to a figure, table or diagram, describe it briefly first.
4. Do not rely on outside knowledge. If the passages do not contain the answer, say \"Based on the uploaded book, I cannot find the answer to that.\"
5. Never break character.

Answer:";

const CONTEXT_PLACEHOLDER: &str = "{context}";
const QUESTION_PLACEHOLDER: &str = "{question}";

/// Prompt with `{context}` and `{question}` slots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    #[inline]
    fn default() -> Self {
        Self::new(BOOK_AGENT_TEMPLATE)
    }
}

impl PromptTemplate {
    #[inline]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Fill both slots in a single left-to-right pass. Braces inside the
    /// substituted values are copied through untouched.
    #[inline]
    pub fn render(&self, context: &str, question: &str) -> String {
        let mut rendered =
            String::with_capacity(self.template.len() + context.len() + question.len());
        let mut rest = self.template.as_str();

        while let Some(position) = rest.find('{') {
            rendered.push_str(rest.get(..position).unwrap_or_default());
            let tail = rest.get(position..).unwrap_or_default();

            if let Some(after) = tail.strip_prefix(CONTEXT_PLACEHOLDER) {
                rendered.push_str(context);
                rest = after;
            } else if let Some(after) = tail.strip_prefix(QUESTION_PLACEHOLDER) {
                rendered.push_str(question);
                rest = after;
            } else {
                rendered.push('{');
                rest = tail.get(1..).unwrap_or_default();
            }
        }

        rendered.push_str(rest);
        rendered
    }
}
