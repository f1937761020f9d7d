use super::*;
use crate::config::LlmConfig;
use crate::ingest::fingerprint_bytes;
use tempfile::TempDir;

fn test_config(temp_dir: &TempDir) -> Config {
    Config {
        base_dir: temp_dir.path().to_path_buf(),
        llm: LlmConfig {
            base_url: "http://127.0.0.1:9/v1".to_string(),
            api_key: Some("sk-test".to_string()),
            embedding_dimension: 4,
            timeout_seconds: 1,
            ..LlmConfig::default()
        },
        retry: RetryPolicy::new(1, std::time::Duration::ZERO),
        ..Config::default()
    }
}

async fn create_pipeline() -> (DocumentPipeline, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let pipeline = DocumentPipeline::new(&test_config(&temp_dir))
        .await
        .expect("should build pipeline");
    (pipeline, temp_dir)
}

#[test]
fn upload_result_json_shape() {
    let ok = UploadResult::success(Path::new("/data/report.pdf"));
    let json = serde_json::to_value(&ok).expect("can serialize json");
    assert_eq!(json["code"], 200);
    assert!(json["msg"].is_null());
    assert_eq!(json["data"]["uploaded_file_path"], "/data/report.pdf");
    assert!(ok.is_success());

    let bad = UploadResult::bad_request("No file uploaded");
    let json = serde_json::to_value(&bad).expect("can serialize json");
    assert_eq!(json["code"], 400);
    assert_eq!(json["msg"], "No file uploaded");
    assert!(json["data"].is_null());

    assert_eq!(UploadResult::server_error("boom").code, 500);
    assert!(!UploadResult::server_error("boom").is_success());
}

#[tokio::test]
async fn empty_path_is_bad_request() {
    let (pipeline, _temp_dir) = create_pipeline().await;
    let result = pipeline.upload(Path::new("")).await;
    assert_eq!(result.code, CODE_BAD_REQUEST);
    assert_eq!(result.msg.as_deref(), Some("No file uploaded"));
}

#[tokio::test]
async fn disallowed_extension_is_bad_request() {
    let (pipeline, temp_dir) = create_pipeline().await;
    let path = temp_dir.path().join("slides.pptx");
    std::fs::write(&path, "content").expect("should write file");

    let result = pipeline.upload(&path).await;
    assert_eq!(result.code, CODE_BAD_REQUEST);
    assert!(result.msg.unwrap_or_default().contains(".pptx"));
    assert!(
        pipeline
            .store()
            .list_collections()
            .await
            .expect("should list")
            .is_empty(),
        "rejected files must not create collections"
    );
}

#[tokio::test]
async fn empty_text_file_is_server_error() {
    let (pipeline, temp_dir) = create_pipeline().await;
    let path = temp_dir.path().join("empty.txt");
    std::fs::write(&path, "").expect("should write file");

    let result = pipeline.upload(&path).await;
    assert_eq!(result.code, CODE_SERVER_ERROR);
    assert!(result.msg.unwrap_or_default().contains("No extractable text"));

    let collection = fingerprint_bytes(b"");
    assert!(
        pipeline
            .store()
            .collection_exists(&collection)
            .await
            .expect("should check collection")
    );
}

#[tokio::test]
async fn unreachable_embedding_endpoint_is_server_error() {
    let (pipeline, temp_dir) = create_pipeline().await;
    let path = temp_dir.path().join("notes.txt");
    std::fs::write(&path, "Some text worth embedding.").expect("should write file");

    let result = pipeline.upload(&path).await;
    assert_eq!(result.code, CODE_SERVER_ERROR);
    assert!(result.data.is_none());
}

#[tokio::test]
async fn completion_request_defaults_and_clamping() {
    let (pipeline, _temp_dir) = create_pipeline().await;
    let messages = vec![ChatMessage::user("hi")];

    let request = pipeline
        .completion_request(messages.clone(), &AnswerOptions::default())
        .expect("should build request");
    assert_eq!(request.model, "gpt-4o-mini");
    assert_eq!(request.max_tokens, 4096);
    assert!((request.temperature - 0.7).abs() < f32::EPSILON);

    let request = pipeline
        .completion_request(
            messages.clone(),
            &AnswerOptions {
                model: Some("qwen2.5-32b-agi".to_string()),
                max_tokens: Some(6000),
                temperature: Some(0.1),
                stream: None,
            },
        )
        .expect("should build request");
    assert_eq!(request.model, "qwen2.5-32b-agi");
    assert_eq!(request.max_tokens, 4096);

    let unknown = pipeline.completion_request(
        messages,
        &AnswerOptions {
            model: Some("no-such-model".to_string()),
            ..AnswerOptions::default()
        },
    );
    assert!(matches!(unknown, Err(DocQaError::Validation(_))));
}

#[tokio::test]
async fn document_prompt_requires_files_and_question() {
    let (pipeline, temp_dir) = create_pipeline().await;
    let mut conversation = Conversation::new();
    conversation.push_user("What changed?");

    let no_files = pipeline.document_prompt(&[], &conversation, 3).await;
    assert!(matches!(no_files, Err(DocQaError::Validation(_))));

    let path = temp_dir.path().join("notes.txt");
    std::fs::write(&path, "text").expect("should write file");
    let empty = Conversation::new();
    let no_question = pipeline.document_prompt(&[path], &empty, 3).await;
    assert!(matches!(no_question, Err(DocQaError::Validation(_))));
}

#[tokio::test]
async fn plain_messages_without_files() {
    let (pipeline, _temp_dir) = create_pipeline().await;
    let mut conversation = Conversation::new();
    conversation.push_user("Hello");

    let messages = pipeline
        .messages(&[], &conversation, 3)
        .await
        .expect("plain chat needs no retrieval");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, "Hello");
}
