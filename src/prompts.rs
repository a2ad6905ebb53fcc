//! Extraction prompt for the completion model.
//!
//! The prompt is a pure function of the extracted text and the schema: no
//! timestamps, no sampling, no per-request ids. Two calls with the same
//! inputs produce byte-identical strings, so tests can assert on the exact
//! payload without a model in the loop.

use crate::schema::Schema;

/// Role declaration placed at the top of every extraction prompt.
pub const ROLE_DECLARATION: &str = "You are a data extraction assistant for shipping and invoice documents.
Don't justify your answers. Don't give information not mentioned in the CONTEXT INFORMATION.
Answer the QUESTION from the CONTEXT below only and follow the INSTRUCTIONS.";

/// Formatting rules appended after the question.
pub const FORMAT_INSTRUCTIONS: &str = "INSTRUCTIONS :
1. Always provide response only from the CONTEXT.
2. Provide the response in csv format.
3. Separate the values using '|' pipe separator symbol.
4. Don't provide the columns, provide only values.";

/// Build the system prompt that asks the model for one pipe-delimited row.
///
/// Layout: role declaration, the full extracted text as context, the schema
/// field names as the question, then the formatting instructions.
pub fn build_extraction_prompt(extracted_text: &str, schema: &Schema) -> String {
    format!(
        "{ROLE_DECLARATION}\n\n\
CONTEXT :\n\
**************\n\n\
1. Here is the search context {extracted_text}.\n\n\
QUESTION : {question} from the context\n\n\
{FORMAT_INSTRUCTIONS}\n",
        question = schema.fields().join(",")
    )
}
