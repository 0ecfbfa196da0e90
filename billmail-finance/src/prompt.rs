//! Extraction instructions handed to the model

use billmail_core::{ANSWER_MARKER, COMPLETED_MARKER, CategorySchema, REASONING_MARKER, TaskSpec};

use crate::category_rules::CategoryMapping;

const TASK_INSTRUCTIONS: &str = "\
You read bank notification emails (payment sent, card charged, bill paid) and \
extract the single bill the email describes. You are given the email subject and \
a cleaned plain-text body.";

const FIELD_RULES: &str = "\
Fields:
- merchant: the payee or recipient exactly as written (for example \"BARCLAY VILLAGE\"), or null.
- amount: the amount as a plain number without currency symbols or thousands separators \
(\"$1,635.00\" becomes 1635.00), or null.
- category: one label from the list below, or null.
- date: the transaction date as YYYY-MM-DD, dropping any time and timezone \
(\"Sep 4, 2025 at 4:29 PM ET\" becomes \"2025-09-04\"), or null.

Use null for anything the email does not state. If the email describes no payment, \
every field is null.";

/// Builds the immutable task description for one deployment
pub struct TaskSpecBuilder<'a> {
    mapping: &'a CategoryMapping,
    schema: CategorySchema,
}

impl<'a> TaskSpecBuilder<'a> {
    pub fn new(mapping: &'a CategoryMapping, schema: CategorySchema) -> Self {
        Self { mapping, schema }
    }

    pub fn build(&self) -> TaskSpec {
        let mut prompt = String::new();

        prompt.push_str(TASK_INSTRUCTIONS);
        prompt.push_str("\n\n");
        prompt.push_str(FIELD_RULES);
        prompt.push_str("\n\n");

        prompt.push_str("Categories:\n");
        for category in self.schema.categories() {
            prompt.push_str(&format!("- {}: {}\n", category.label(), category.description()));
        }

        if !self.mapping.is_empty() {
            prompt.push_str("\nMerchant rules (these take precedence over your own judgement):\n");
            prompt.push_str(&self.mapping.guidance());
            prompt.push('\n');
        }

        prompt.push('\n');
        prompt.push_str(&output_contract());

        TaskSpec::new(self.schema, prompt)
    }
}

fn output_contract() -> String {
    format!(
        "Answer in exactly this layout:\n\
{REASONING_MARKER}\n\
One or two sentences on where each value comes from.\n\
{ANSWER_MARKER}\n\
{{\"merchant\": string or null, \"amount\": number or null, \"category\": string or null, \"date\": \"YYYY-MM-DD\" or null}}\n\
{COMPLETED_MARKER}"
    )
}

/// Build the task description once per process
pub fn build_task_spec(mapping: &CategoryMapping, schema: CategorySchema) -> TaskSpec {
    TaskSpecBuilder::new(mapping, schema).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use billmail_core::Category;

    #[test]
    fn test_embeds_mapping_guidance() {
        let mapping = CategoryMapping::from_pairs([("VILLAGE", Category::Dining)]);
        let spec = build_task_spec(&mapping, CategorySchema::Extended);
        assert!(spec.system_prompt().contains("If merchant contains \"VILLAGE\", category is dining"));
        assert!(spec.system_prompt().contains("Merchant rules"));
    }

    #[test]
    fn test_lists_only_active_scheme() {
        let spec = build_task_spec(&CategoryMapping::new(), CategorySchema::Legacy);
        let prompt = spec.system_prompt();
        assert!(prompt.contains("- checking:"));
        assert!(prompt.contains("- credit:"));
        assert!(!prompt.contains("- utilities:"));
        assert!(!prompt.contains("Merchant rules"));
        assert_eq!(spec.schema(), CategorySchema::Legacy);
    }

    #[test]
    fn test_asks_for_reasoning_before_answer() {
        let spec = build_task_spec(&CategoryMapping::new(), CategorySchema::Extended);
        let prompt = spec.system_prompt();
        let reasoning = prompt.find(REASONING_MARKER).unwrap();
        let answer = prompt.find(ANSWER_MARKER).unwrap();
        let completed = prompt.find(COMPLETED_MARKER).unwrap();
        assert!(reasoning < answer && answer < completed);
    }
}
