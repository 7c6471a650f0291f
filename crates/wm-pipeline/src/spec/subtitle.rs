//! WebVTT soft-subtitle directives.

use super::BuildInput;

pub(super) fn selection(input: &BuildInput<'_>) -> wm_core::Result<Vec<String>> {
    Ok(vec!["-map".into(), format!("0:s:{}", input.stream_index)])
}

pub(super) fn encode(_: &BuildInput<'_>) -> wm_core::Result<Vec<String>> {
    Ok(vec!["-c:s".into(), "webvtt".into()])
}

pub(super) fn metadata(_: &BuildInput<'_>) -> wm_core::Result<Vec<String>> {
    Ok(vec!["-metadata:s:s".into(), "title=English Subtitles".into()])
}
