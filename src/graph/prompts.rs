// Prompt templates
// Message builders for the analysis, explanation and quick-help calls

use crate::execution::{ExecutionResult, Language};
use crate::llm::ChatMessage;
use crate::rag::Document;

const ANALYSIS_SYSTEM_PROMPT: &str = "You are a code analysis expert. Analyze the provided code and execution result.

Focus on:
1. Code structure and logic
2. Potential issues or improvements
3. Key concepts demonstrated
4. Error analysis (if any)

Provide a concise analysis that will help with generating educational explanations.";

const TUTOR_SYSTEM_PROMPT: &str = "You are an expert programming tutor. Provide a clear, educational explanation of the code and its execution.

Your explanation should:
1. Explain what the code does step-by-step
2. Highlight key programming concepts
3. Explain any errors and how to fix them
4. Suggest improvements or best practices
5. Use the provided reference materials when relevant

Structure your response with clear sections and be educational but concise.";

const QUICK_HELP_SYSTEM_PROMPT: &str =
    "You are a helpful programming assistant. Provide quick help for the given code.";

fn code_block(language: Language, code: &str) -> String {
    format!("Language: {language}\nCode:\n```{language}\n{code}\n```")
}

fn execution_block(result: &ExecutionResult) -> String {
    format!(
        "Execution Result:\n- Status: {}\n- Output: {}\n- Errors: {}\n- Execution Time: {}s",
        result.status, result.stdout, result.stderr, result.execution_time
    )
}

pub fn analysis_messages(language: Language, code: &str, result: &ExecutionResult) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(ANALYSIS_SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "{}\n\n{}",
            code_block(language, code),
            execution_block(result)
        )),
    ]
}

/// Renders documents as numbered references; empty when there are none.
pub fn reference_block(documents: &[Document]) -> String {
    documents
        .iter()
        .enumerate()
        .map(|(i, doc)| format!("Reference {}:\n{}", i + 1, doc.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn tutor_messages(
    language: Language,
    code: &str,
    result: &ExecutionResult,
    references: &str,
) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(TUTOR_SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "{}\n\n{}\n\nReference Materials:\n{}\n\nPlease provide a comprehensive explanation suitable for learning.",
            code_block(language, code),
            execution_block(result),
            references
        )),
    ]
}

pub fn quick_help_messages(language: Language, code: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(QUICK_HELP_SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "{}\n\nProvide quick help or suggestions.",
            code_block(language, code)
        )),
    ]
}
