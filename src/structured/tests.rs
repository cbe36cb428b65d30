use std::cell::RefCell;
use std::collections::VecDeque;

use super::*;
use crate::providers::Role;

const VALID: &str = r#"{"title":"T","summary":"S","keywords":["a","b"]}"#;

/// Replays canned responses and records every conversation it was sent
struct ScriptedGenerator {
    responses: RefCell<VecDeque<Result<String>>>,
    conversations: RefCell<Vec<Vec<ChatMessage>>>,
}

impl ScriptedGenerator {
    fn new(responses: &[&str]) -> Self {
        Self {
            responses: RefCell::new(responses.iter().map(|r| Ok((*r).to_string())).collect()),
            conversations: RefCell::new(Vec::new()),
        }
    }

    fn with_results(responses: Vec<Result<String>>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            conversations: RefCell::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.conversations.borrow().len()
    }
}

impl Generator for ScriptedGenerator {
    fn generate(&self, _prompt: &str) -> Result<String> {
        unreachable!("structured output uses chat generation")
    }

    fn generate_chat(&self, messages: &[ChatMessage]) -> Result<String> {
        self.conversations.borrow_mut().push(messages.to_vec());
        self.responses
            .borrow_mut()
            .pop_front()
            .expect("test scripted too few responses")
    }
}

fn expected_output() -> StructuredOutput {
    StructuredOutput {
        title: "T".to_string(),
        summary: "S".to_string(),
        keywords: vec!["a".to_string(), "b".to_string()],
    }
}

#[test]
fn strip_code_fence_variants() {
    assert_eq!(strip_code_fence(VALID), VALID);
    assert_eq!(strip_code_fence(&format!("  {VALID}\n")), VALID);
    assert_eq!(strip_code_fence(&format!("```json\n{VALID}\n```")), VALID);
    assert_eq!(strip_code_fence(&format!("```JSON {VALID}```")), VALID);
    assert_eq!(strip_code_fence(&format!("```\n{VALID}\n```")), VALID);
}

#[test]
fn parse_accepts_exact_schema() {
    assert_eq!(
        StructuredOutput::parse(VALID).expect("valid"),
        expected_output()
    );
}

#[test]
fn parse_rejects_non_json_as_malformed() {
    assert!(matches!(
        StructuredOutput::parse("not json at all"),
        Err(RagError::MalformedData(_))
    ));
    assert!(matches!(
        StructuredOutput::parse(&format!("{VALID} trailing")),
        Err(RagError::MalformedData(_))
    ));
}

#[test]
fn parse_rejects_wrong_shapes_as_schema_violations() {
    let cases = [
        r#"{"title":"T","summary":"S"}"#,
        r#"{"title":"T","summary":"S","keywords":["a"],"extra":1}"#,
        r#"{"title":"T","summary":"S","keywords":"a,b"}"#,
        r#"{"title":1,"summary":"S","keywords":[]}"#,
        r#"{"title":"T","summary":"S","keywords":[1,2]}"#,
        r#"{"title":"  ","summary":"S","keywords":[]}"#,
        r#"{"title":"T","summary":"","keywords":[]}"#,
        r#"["T","S",["a"]]"#,
        r#""just a string""#,
    ];

    for case in cases {
        assert!(
            matches!(
                StructuredOutput::parse(case),
                Err(RagError::SchemaViolation(_))
            ),
            "expected schema violation for {case}"
        );
    }
}

#[test]
fn first_attempt_success_makes_one_call() {
    let generator = ScriptedGenerator::new(&[VALID]);

    let output = StructuredValidator::default()
        .run(&generator, "Summarize Rust")
        .expect("should succeed");

    assert_eq!(output, expected_output());
    assert_eq!(generator.calls(), 1);

    let conversations = generator.conversations.borrow();
    assert_eq!(conversations[0].len(), 2);
    assert_eq!(conversations[0][0], ChatMessage::system(SYSTEM_PROMPT));
    assert_eq!(conversations[0][1], ChatMessage::user("Summarize Rust"));
}

#[test]
fn recovers_on_second_attempt() {
    let generator = ScriptedGenerator::new(&["not json at all", VALID]);

    let output = structured_output(&generator, "Summarize Rust", 2).expect("should recover");

    assert_eq!(output, expected_output());
    assert_eq!(generator.calls(), 2);

    let conversations = generator.conversations.borrow();
    let retry = &conversations[1];
    assert_eq!(retry.len(), 4);
    assert_eq!(retry[2], ChatMessage::assistant("not json at all"));
    assert_eq!(retry[3].role, Role::User);
    assert!(retry[3].content.starts_with(
        "The previous response was invalid JSON or did not match the schema. Error: "
    ));
    assert!(
        retry[3]
            .content
            .ends_with("Return ONLY valid JSON with keys: title, summary, keywords.")
    );
}

#[test]
fn fenced_response_is_accepted() {
    let generator = ScriptedGenerator::new(&["```json\n{\"title\":\"T\",\"summary\":\"S\",\"keywords\":[\"a\",\"b\"]}\n```"]);

    let output = StructuredValidator::default()
        .run(&generator, "p")
        .expect("fence should be stripped");
    assert_eq!(output, expected_output());
}

#[test]
fn exhausts_after_max_retries_plus_one_calls() {
    let generator = ScriptedGenerator::new(&["nope", "still nope", "{\"title\": \"T\"}"]);

    let result = structured_output(&generator, "p", 2);

    assert_eq!(generator.calls(), 3);
    match result {
        Err(RagError::RetryExhausted { attempts, last }) => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, RagError::SchemaViolation(_)));
        }
        other => panic!("expected RetryExhausted, got {other:?}"),
    }
}

#[test]
fn three_malformed_responses_exhaust_retries() {
    let generator = ScriptedGenerator::new(&["a", "b", "c"]);

    let error = structured_output(&generator, "p", 2).expect_err("should fail");

    assert_eq!(generator.calls(), 3);
    assert!(
        error
            .to_string()
            .starts_with("structured output validation failed after 3 attempts")
    );
    assert!(matches!(
        error,
        RagError::RetryExhausted { last, .. } if matches!(*last, RagError::MalformedData(_))
    ));
}

#[test]
fn conversation_accumulates_every_failed_attempt() {
    let generator = ScriptedGenerator::new(&["first bad", "second bad", VALID]);

    structured_output(&generator, "p", 2).expect("third attempt succeeds");

    let conversations = generator.conversations.borrow();
    let lengths: Vec<usize> = conversations.iter().map(Vec::len).collect();
    assert_eq!(lengths, vec![2, 4, 6]);

    let last = &conversations[2];
    assert_eq!(last[2], ChatMessage::assistant("first bad"));
    assert_eq!(last[4], ChatMessage::assistant("second bad"));
    assert_eq!(&last[..4], conversations[1].as_slice());
}

#[test]
fn zero_retries_allows_a_single_call() {
    let generator = ScriptedGenerator::new(&["bad"]);

    let result = structured_output(&generator, "p", 0);

    assert_eq!(generator.calls(), 1);
    assert!(matches!(
        result,
        Err(RagError::RetryExhausted { attempts: 1, .. })
    ));
}

#[test]
fn provider_errors_are_not_retried() {
    let generator = ScriptedGenerator::with_results(vec![
        Err(RagError::Provider("timed out".to_string())),
        Ok(VALID.to_string()),
    ]);

    let result = structured_output(&generator, "p", 2);

    assert_eq!(generator.calls(), 1);
    assert!(matches!(result, Err(RagError::Provider(_))));
}

#[test]
fn correctable_errors_are_parse_and_schema_failures() {
    assert!(RagError::MalformedData(String::new()).is_correctable());
    assert!(RagError::SchemaViolation(String::new()).is_correctable());
    assert!(!RagError::Provider(String::new()).is_correctable());
}

#[test]
fn correctable_generator_errors_are_retried() {
    let generator = ScriptedGenerator::with_results(vec![
        Err(RagError::MalformedData("truncated response body".to_string())),
        Ok(VALID.to_string()),
    ]);

    let output = structured_output(&generator, "p", 1).expect("second attempt succeeds");

    assert_eq!(output, expected_output());
    assert_eq!(generator.calls(), 2);
    let conversations = generator.conversations.borrow();
    assert!(conversations[1][3].content.contains("truncated response body"));
}
