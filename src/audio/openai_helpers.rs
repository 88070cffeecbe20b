use super::types::AudioFormat;

/// Strip codec parameters (`audio/webm;codecs=opus` -> `audio/webm`) and lowercase.
pub(super) fn normalize_mime_type(mime_type: &str) -> Option<String> {
    let normalized = mime_type
        .split(';')
        .next()
        .map(str::trim)
        .unwrap_or_default();
    if normalized.is_empty() {
        return None;
    }
    Some(normalized.to_ascii_lowercase())
}

/// Multipart body for `/audio/transcriptions`, asking for a plain-text reply.
pub(super) fn build_transcription_multipart(
    boundary: &str,
    model: &str,
    audio: &[u8],
    mime_type: &str,
    extension: &str,
) -> Vec<u8> {
    let mut body = Vec::with_capacity(audio.len() + 512);

    append_field(&mut body, boundary, "model", model);
    append_field(&mut body, boundary, "response_format", "text");

    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"audio.{extension}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {mime_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(audio);
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    body
}

fn append_field(body: &mut Vec<u8>, boundary: &str, name: &str, value: &str) {
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
    );
    body.extend_from_slice(value.as_bytes());
    body.extend_from_slice(b"\r\n");
}

/// File extension for a browser-recorded clip, `None` when unsupported.
pub(super) fn transcription_extension_for_mime(mime_type: &str) -> Option<&'static str> {
    match mime_type {
        "audio/webm" | "video/webm" => Some("webm"),
        "audio/ogg" | "application/ogg" => Some("ogg"),
        "audio/mp4" | "video/mp4" | "audio/x-m4a" | "audio/m4a" => Some("m4a"),
        "audio/mpeg" | "audio/mp3" | "audio/mpga" => Some("mp3"),
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        _ => None,
    }
}

pub(super) fn content_type_matches_expected_audio(content_type: &str, format: AudioFormat) -> bool {
    let Some(mime) = normalize_mime_type(content_type) else {
        return false;
    };

    match format {
        AudioFormat::Mp3 => matches!(mime.as_str(), "audio/mpeg" | "audio/mp3"),
    }
}
