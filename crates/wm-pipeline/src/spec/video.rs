//! Video directives: the `-vf` chain and the H.264 / VP9 encoder tables.

use super::{BuildInput, Variant};

const TONEMAP: &str = "zscale=t=linear,format=gbrpf32le,zscale=p=bt709,\
                       tonemap=tonemap=hable:desat=0.0,zscale=t=bt709:m=bt709:r=tv,format=yuv420p";
const DENOISE: &str = "fftdnoiz=10:1:5:0.5:1:1";
/// Downscale target for H.264 when none is configured.
const H264_MAX_HEIGHT: u32 = 1080;

/// Wide-gamut color spaces that are tone-mapped to BT.709 for SDR output.
pub fn is_hdr(color_space: &str) -> bool {
    matches!(color_space, "bt2020nc" | "bt2020c")
}

/// VP9 tile columns (log2) for an output height.
pub fn tile_columns(height: u32) -> u32 {
    match height {
        0..=240 => 0,
        241..=480 => 1,
        481..=1080 => 2,
        1081..=1440 => 3,
        _ => 4,
    }
}

fn source_height(input: &BuildInput<'_>) -> wm_core::Result<u32> {
    input.props.height.ok_or_else(|| {
        wm_core::Error::unsupported(input.variant, "video height was not probed")
    })
}

fn target_height(input: &BuildInput<'_>) -> Option<u32> {
    match input.variant {
        Variant::H264 => input.settings.max_height.or(Some(H264_MAX_HEIGHT)),
        _ => input.settings.max_height,
    }
}

/// Height after any downscale.
fn output_height(input: &BuildInput<'_>) -> wm_core::Result<u32> {
    let height = source_height(input)?;
    Ok(match target_height(input) {
        Some(target) if height > target => target,
        _ => height,
    })
}

/// 16:9 width for a target height, rounded down to an even number.
fn scale_width(height: u32) -> u32 {
    (height * 16 / 9) & !1
}

/// Escape a path for use as a filter option value inside a filter graph.
fn escape_filter_path(path: &std::path::Path) -> String {
    let raw = path.to_string_lossy();
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '\'' | ':' | ',' | ';' | '[' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn burn_in_filter(input: &BuildInput<'_>) -> wm_core::Result<Option<String>> {
    let Some(burn) = &input.props.burn_in else {
        return Ok(None);
    };
    let mut filter = format!("subtitles={}", escape_filter_path(&burn.file));
    if let Some(si) = burn.stream {
        filter.push_str(&format!(":si={si}"));
    }
    match burn.codec.as_str() {
        "subrip" | "srt" => {
            let style = &input.settings.subtitle_style;
            filter.push_str(&format!(
                ":force_style='FontName={},Fontsize={},PrimaryColour={}'",
                style.font_name, style.font_size, style.primary_colour
            ));
        }
        "ass" | "ssa" => {}
        other => {
            return Err(wm_core::Error::UnsupportedSubtitle {
                codec: other.to_string(),
            })
        }
    }
    Ok(Some(filter))
}

pub(super) fn filter(input: &BuildInput<'_>) -> wm_core::Result<Vec<String>> {
    let height = source_height(input)?;
    let mut chain: Vec<String> = Vec::new();

    if let Some(rect) = &input.props.crop {
        chain.push(format!("crop={rect}"));
    }
    if let Some(target) = target_height(input) {
        if height > target {
            chain.push(format!("scale={}:-2", scale_width(target)));
        }
    }
    // VP9 profile 2 keeps the 10-bit wide-gamut picture.
    if matches!(input.variant, Variant::H264) && is_hdr(&input.props.color_space) {
        chain.push(TONEMAP.to_string());
    }
    if input.settings.denoise {
        chain.push(DENOISE.to_string());
    }
    if let Some(burn) = burn_in_filter(input)? {
        chain.push(burn);
    }

    if chain.is_empty() {
        Ok(Vec::new())
    } else {
        Ok(vec!["-vf".into(), chain.join(",")])
    }
}

pub(super) fn selection(input: &BuildInput<'_>) -> wm_core::Result<Vec<String>> {
    Ok(vec!["-map".into(), format!("0:v:{}", input.stream_index)])
}

pub(super) fn h264_encode(input: &BuildInput<'_>) -> wm_core::Result<Vec<String>> {
    let crf = input.settings.crf.to_string();
    Ok([
        "-c:v", "libx264", "-preset", "veryslow", "-tune", "film", "-crf", crf.as_str(), "-profile:v",
        "high", "-level", "4.1", "-maxrate", "5M", "-bufsize", "2M",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect())
}

pub(super) fn vp9_encode(input: &BuildInput<'_>) -> wm_core::Result<Vec<String>> {
    let crf = input.settings.crf.to_string();
    let tiles = tile_columns(output_height(input)?).to_string();
    let threads = input.settings.threads.to_string();
    Ok([
        "-c:v",
        "libvpx-vp9",
        "-crf",
        crf.as_str(),
        "-b:v",
        "0",
        "-g",
        "240",
        "-deadline",
        "good",
        "-cpu-used",
        "2",
        "-tile-columns",
        tiles.as_str(),
        "-row-mt",
        "1",
        "-threads",
        threads.as_str(),
        "-profile:v",
        "2",
        "-pix_fmt",
        "yuv420p10le",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect())
}

pub(super) fn h264_metadata(_: &BuildInput<'_>) -> wm_core::Result<Vec<String>> {
    Ok(vec!["-metadata:s:v".into(), "title=h264 (avc1) 4.1 High".into()])
}

pub(super) fn vp9_metadata(_: &BuildInput<'_>) -> wm_core::Result<Vec<String>> {
    Ok(vec!["-metadata:s:v".into(), "title=VP9 - Profile 2 - 10-bit".into()])
}
