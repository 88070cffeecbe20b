use std::time::Duration;

use serde_json::json;
use voxstream::audio::{
    OpenAiSpeechSynthesizer, OpenAiTranscriber, SpeechRequest, SpeechSynthesizer, Transcriber,
};
use voxstream::error::VoiceError;
use voxstream::util::retry::RetryPolicy;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_retry_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(1),
        multiplier: 1.0,
    }
}

fn speech_request() -> SpeechRequest {
    SpeechRequest::new("hello world", "alloy")
}

#[tokio::test]
async fn whisper_transcription_happy_path() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/audio/transcriptions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_string_contains("name=\"model\""))
        .and(body_string_contains("whisper-1"))
        .and(body_string_contains("name=\"response_format\""))
        .and(body_string_contains("filename=\"audio.webm\""))
        .respond_with(ResponseTemplate::new(200).set_body_string("  what is the refund policy?\n"))
        .expect(1)
        .mount(&server)
        .await;

    let transcriber = OpenAiTranscriber::new_with_base_url(server.uri())
        .with_retry_policy(test_retry_policy(1));

    let text = transcriber
        .transcribe(b"webm-bytes", "audio/webm;codecs=opus", "test-key")
        .await;

    assert_eq!(text.as_deref(), Some("what is the refund policy?"));
}

#[tokio::test]
async fn whisper_transcription_rejects_invalid_mime() {
    let transcriber = OpenAiTranscriber::new().with_retry_policy(test_retry_policy(1));

    let err = transcriber
        .try_transcribe(b"audio", "text/plain", "test-key")
        .await
        .expect_err("invalid mime should fail");

    assert!(
        matches!(err, VoiceError::InvalidArgument(message) if message.contains("Unsupported transcription MIME type"))
    );
}

#[tokio::test]
async fn whisper_transcription_without_key_is_credential_missing() {
    let transcriber = OpenAiTranscriber::new().with_retry_policy(test_retry_policy(1));

    let err = transcriber
        .try_transcribe(b"audio", "audio/webm", "  ")
        .await
        .expect_err("blank key should fail");

    assert!(matches!(err, VoiceError::CredentialMissing(_)));
}

#[tokio::test]
async fn whisper_transcription_retries_server_errors_then_yields_none() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/audio/transcriptions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .expect(3)
        .mount(&server)
        .await;

    let transcriber = OpenAiTranscriber::new_with_base_url(server.uri())
        .with_retry_policy(test_retry_policy(3));

    let err = transcriber
        .try_transcribe(b"fake", "audio/mpeg", "test-key")
        .await
        .expect_err("server error should bubble up after retries");
    assert!(matches!(err, VoiceError::Api { status: 500, .. }));
}

#[tokio::test]
async fn whisper_transcription_failure_is_absent_transcript() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/audio/transcriptions"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"error": {"message": "Incorrect API key"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let transcriber = OpenAiTranscriber::new_with_base_url(server.uri())
        .with_retry_policy(test_retry_policy(3));

    assert_eq!(
        transcriber.transcribe(b"fake", "audio/wav", "bad-key").await,
        None
    );
}

#[tokio::test]
async fn tts_happy_path_sends_model_voice_format_and_speed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/audio/speech"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_string_contains("\"model\":\"tts-1\""))
        .and(body_string_contains("\"voice\":\"alloy\""))
        .and(body_string_contains("\"response_format\":\"mp3\""))
        .and(body_string_contains("\"speed\":1.0"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "audio/mpeg")
                .set_body_bytes(vec![1_u8, 2, 3, 4]),
        )
        .expect(1)
        .mount(&server)
        .await;

    let synthesizer = OpenAiSpeechSynthesizer::new_with_base_url(server.uri())
        .with_retry_policy(test_retry_policy(1));

    let audio = synthesizer
        .synthesize(&speech_request(), "test-key")
        .await
        .expect("tts should succeed");

    assert_eq!(audio, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn tts_rejects_invalid_speed() {
    let synthesizer = OpenAiSpeechSynthesizer::new().with_retry_policy(test_retry_policy(1));

    let mut request = speech_request();
    request.speed = 10.0;

    let err = synthesizer
        .synthesize(&request, "test-key")
        .await
        .expect_err("invalid speed should fail");

    assert!(
        matches!(err, VoiceError::InvalidArgument(message) if message.contains("between 0.25 and 4.0"))
    );
}

#[tokio::test]
async fn tts_rejects_mismatched_content_type() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/audio/speech"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain")
                .set_body_string("not-audio"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let synthesizer = OpenAiSpeechSynthesizer::new_with_base_url(server.uri())
        .with_retry_policy(test_retry_policy(1));

    let err = synthesizer
        .synthesize(&speech_request(), "test-key")
        .await
        .expect_err("invalid mime should fail");

    assert!(
        matches!(err, VoiceError::SynthesisFailed(message) if message.contains("Unexpected speech response MIME type"))
    );
}

#[tokio::test]
async fn tts_handles_json_error_payload() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/audio/speech"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .set_body_json(json!({"error": {"message": "bad voice"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let synthesizer = OpenAiSpeechSynthesizer::new_with_base_url(server.uri())
        .with_retry_policy(test_retry_policy(1));

    let err = synthesizer
        .synthesize(&speech_request(), "test-key")
        .await
        .expect_err("json error payload should fail");

    assert!(
        matches!(err, VoiceError::Provider { provider, message } if provider == "openai" && message.contains("bad voice"))
    );
}

#[tokio::test]
async fn tts_empty_audio_is_synthesis_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/audio/speech"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "audio/mpeg"))
        .expect(1)
        .mount(&server)
        .await;

    let synthesizer = OpenAiSpeechSynthesizer::new_with_base_url(server.uri())
        .with_retry_policy(test_retry_policy(1));

    let err = synthesizer
        .synthesize(&speech_request(), "test-key")
        .await
        .expect_err("empty audio should fail");

    assert!(matches!(err, VoiceError::SynthesisFailed(_)));
}

#[tokio::test]
async fn tts_timeout_maps_to_timeout_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/audio/speech"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(80))
                .insert_header("content-type", "audio/mpeg")
                .set_body_bytes(vec![1_u8]),
        )
        .expect(1)
        .mount(&server)
        .await;

    let synthesizer = OpenAiSpeechSynthesizer::new_with_base_url(server.uri())
        .with_timeout(Duration::from_millis(10))
        .with_retry_policy(test_retry_policy(1));

    let err = synthesizer
        .synthesize(&speech_request(), "test-key")
        .await
        .expect_err("request should time out");

    assert!(matches!(err, VoiceError::Timeout(ms) if ms == 10));
}
