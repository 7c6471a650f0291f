//! Audio directive tables.
//!
//! Lossy encodes are keyed by [`ChannelBucket`]. Buckets of six channels or
//! more go through a `-filter_complex` graph whose output pad `[ss]` is the
//! selection target; the rest are selected by relative track index.

use wm_core::{language_name, language_tag, ChannelBucket};

use super::{BuildInput, Variant};

/// Output pad of the channel-layout filter graph.
const LAYOUT_PAD: &str = "[ss]";
/// Output pad of the stereo fold-down graph.
const DOWNMIX_PAD: &str = "[dm]";

const DOWNMIX_PAN: &str =
    "pan=stereo|c0=.9*FL+1.10*FC+.4*BL+.4*SL|c1=.9*FR+1.10*FC+.4*BR+.4*SR";

fn bucket(input: &BuildInput<'_>) -> wm_core::Result<ChannelBucket> {
    let channels = input.props.channels.ok_or_else(|| {
        wm_core::Error::unsupported(input.variant, "channel count was not probed")
    })?;
    ChannelBucket::from_count(channels).ok_or_else(|| {
        wm_core::Error::unsupported(
            input.variant,
            format!("no directive table for {channels} channels"),
        )
    })
}

fn strings<const N: usize>(tokens: [&str; N]) -> Vec<String> {
    tokens.iter().map(|t| t.to_string()).collect()
}

fn track_map(input: &BuildInput<'_>) -> String {
    format!("0:a:{}", input.stream_index)
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

pub(super) fn index_selection(input: &BuildInput<'_>) -> wm_core::Result<Vec<String>> {
    Ok(vec!["-map".into(), track_map(input)])
}

pub(super) fn bucket_selection(input: &BuildInput<'_>) -> wm_core::Result<Vec<String>> {
    if bucket(input)?.uses_filter_pad() {
        Ok(strings(["-map", LAYOUT_PAD]))
    } else {
        index_selection(input)
    }
}

pub(super) fn downmix_selection(_: &BuildInput<'_>) -> wm_core::Result<Vec<String>> {
    Ok(strings(["-map", DOWNMIX_PAD]))
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

pub(super) fn bucket_filter(input: &BuildInput<'_>) -> wm_core::Result<Vec<String>> {
    let layout_graph = |layout: &str| {
        vec![
            "-filter_complex".to_string(),
            format!(
                "[{}]channelmap=channel_layout={layout}{LAYOUT_PAD}",
                track_map(input)
            ),
        ]
    };
    Ok(match bucket(input)? {
        ChannelBucket::Mono => strings(["-af", "channelmap=channel_layout=mono"]),
        ChannelBucket::Stereo => strings(["-af", "channelmap=channel_layout=stereo"]),
        ChannelBucket::Quad => strings(["-ac", "2"]),
        ChannelBucket::Surround51 => layout_graph("5.1"),
        ChannelBucket::Surround71 => layout_graph("7.1"),
    })
}

pub(super) fn downmix_filter(input: &BuildInput<'_>) -> wm_core::Result<Vec<String>> {
    Ok(vec![
        "-filter_complex".into(),
        format!("[{}]{DOWNMIX_PAN}{DOWNMIX_PAD}", track_map(input)),
    ])
}

fn loudnorm_targets(input: &BuildInput<'_>) -> String {
    let l = &input.settings.loudness;
    format!("loudnorm=I={}:LRA={}:tp={}", l.integrated, l.range, l.true_peak)
}

pub(super) fn pass1_filter(input: &BuildInput<'_>) -> wm_core::Result<Vec<String>> {
    Ok(vec![
        "-af".into(),
        format!("{}:print_format=json", loudnorm_targets(input)),
    ])
}

pub(super) fn pass2_filter(input: &BuildInput<'_>) -> wm_core::Result<Vec<String>> {
    let Variant::NormalizePass2(m) = input.variant else {
        return Err(wm_core::Error::Internal(format!(
            "pass-2 filter requested for {}",
            input.variant
        )));
    };
    Ok(vec![
        "-af".into(),
        format!(
            "{}:measured_I={}:measured_LRA={}:measured_tp={}:measured_thresh={}:offset={}:print_format=json",
            loudnorm_targets(input),
            m.input_i,
            m.input_lra,
            m.input_tp,
            m.input_thresh,
            m.target_offset,
        ),
    ])
}

// ---------------------------------------------------------------------------
// Encoders
// ---------------------------------------------------------------------------

pub(super) fn pcm_encode(_: &BuildInput<'_>) -> wm_core::Result<Vec<String>> {
    Ok(strings(["-c:a", "pcm_s16le", "-ar", "48k"]))
}

/// Lossless PCM that is always stereo; a mono input is upmixed.
pub(super) fn pass2_encode(input: &BuildInput<'_>) -> wm_core::Result<Vec<String>> {
    let mut tokens = pcm_encode(input)?;
    if input.props.channels.is_some_and(|c| c < 2) {
        tokens.extend(strings(["-ac", "2"]));
    }
    Ok(tokens)
}

pub(super) fn opus_encode(input: &BuildInput<'_>) -> wm_core::Result<Vec<String>> {
    let rate = match bucket(input)? {
        ChannelBucket::Mono => "96k",
        ChannelBucket::Stereo | ChannelBucket::Quad => "128k",
        ChannelBucket::Surround51 => "256k",
        ChannelBucket::Surround71 => "450k",
    };
    Ok(strings(["-c:a", "libopus", "-b:a", rate]))
}

pub(super) fn aac_encode(input: &BuildInput<'_>) -> wm_core::Result<Vec<String>> {
    let rate = match bucket(input)? {
        ChannelBucket::Mono => "96k",
        ChannelBucket::Stereo | ChannelBucket::Quad => "192k",
        ChannelBucket::Surround51 => "480k",
        ChannelBucket::Surround71 => "672k",
    };
    Ok(strings(["-c:a", "libfdk_aac", "-b:a", rate, "-cutoff", "18000"]))
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

fn titled(input: &BuildInput<'_>, label: &str) -> Vec<String> {
    let lang = &input.props.language;
    let name = language_name(lang);
    let title = if name.is_empty() {
        label.to_string()
    } else {
        format!("{name} - {label}")
    };
    vec![
        "-metadata:s:a".into(),
        format!("title={title}"),
        "-metadata:s:a".into(),
        format!("language={}", language_tag(lang)),
    ]
}

pub(super) fn downmix_metadata(input: &BuildInput<'_>) -> wm_core::Result<Vec<String>> {
    Ok(titled(input, "Stereo Downmix"))
}

pub(super) fn normalized_metadata(input: &BuildInput<'_>) -> wm_core::Result<Vec<String>> {
    Ok(titled(input, "Normalized Stereo"))
}

pub(super) fn lossy_metadata(input: &BuildInput<'_>) -> wm_core::Result<Vec<String>> {
    let codec = match input.variant {
        Variant::Opus | Variant::OpusDownmix => "Opus",
        _ => "AAC",
    };
    if matches!(input.variant, Variant::OpusDownmix | Variant::AacDownmix) {
        return Ok(titled(
            input,
            &format!("{codec} Dialogue Enhanced Downmix - 2.0"),
        ));
    }
    let layout = match bucket(input)? {
        ChannelBucket::Mono => "Mono",
        ChannelBucket::Stereo | ChannelBucket::Quad => "Stereo",
        ChannelBucket::Surround51 => "Surround Sound - 5.1",
        ChannelBucket::Surround71 => "Surround Sound - 7.1",
    };
    Ok(titled(input, &format!("{codec} {layout}")))
}
