//! The extraction task handed to a structured-answer provider.
//!
//! A `TaskSpec` is built once per process from the category mapping and is
//! immutable afterwards. The provider only transports it; prompt text and the
//! answer layout are owned here.

use crate::bill::CategorySchema;

/// Section markers of the answer layout: reasoning first, then the bill object.
pub const REASONING_MARKER: &str = "[[ ## reasoning ## ]]";
pub const ANSWER_MARKER: &str = "[[ ## bill_info ## ]]";
pub const COMPLETED_MARKER: &str = "[[ ## completed ## ]]";

const SUBJECT_MARKER: &str = "[[ ## email_subject ## ]]";
const BODY_MARKER: &str = "[[ ## email_body ## ]]";

/// Immutable extraction instructions
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
    schema: CategorySchema,
    instructions: String,
}

impl TaskSpec {
    pub fn new(schema: CategorySchema, instructions: impl Into<String>) -> Self {
        Self {
            schema,
            instructions: instructions.into(),
        }
    }

    pub fn schema(&self) -> CategorySchema {
        self.schema
    }

    /// System-level instructions, identical for every email in a run
    pub fn system_prompt(&self) -> &str {
        &self.instructions
    }

    /// Per-email input block
    pub fn user_prompt(&self, subject: &str, body: &str) -> String {
        let mut prompt = String::new();
        prompt.push_str(SUBJECT_MARKER);
        prompt.push('\n');
        prompt.push_str(subject.trim());
        prompt.push_str("\n\n");
        prompt.push_str(BODY_MARKER);
        prompt.push('\n');
        prompt.push_str(body);
        prompt.push_str("\n\n");
        prompt.push_str(&format!(
            "Respond with the output fields, starting with `{REASONING_MARKER}`, \
then `{ANSWER_MARKER}`, and ending with `{COMPLETED_MARKER}`."
        ));
        prompt
    }
}
