// Hardware H.264 encoder selection (§4.2). Pure functions over a list of
// friendly names, kept separate from the Media Foundation enumeration call
// so the priority logic can be unit tested without a real media framework.

use anyhow::Context;
use windows::core::PWSTR;
use windows::Win32::Media::MediaFoundation::{
    IMFActivate, MFTEnumEx, MFMediaType_Video, MFT_CATEGORY_VIDEO_ENCODER, MFT_ENUM_FLAG_ALL,
    MFT_ENUM_FLAG_HARDWARE, MFT_ENUM_FLAG_SORTANDFILTER, MFT_FRIENDLY_NAME_Attribute,
    MFT_REGISTER_TYPE_INFO, MFVideoFormat_H264,
};

const H264_MARKERS: [&str; 4] = ["H264", "H.264", "AVC", "x264"];
const SOFTWARE_MARKERS: [&str; 2] = ["software", "microsoft"];

fn is_h264_named(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    H264_MARKERS.iter().any(|m| upper.contains(&m.to_ascii_uppercase()))
}

fn is_software_named(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SOFTWARE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Picks the highest-priority H.264-named encoder from `names`: NVIDIA,
/// Intel, AMD, any other H.264-named hardware encoder, then (only if
/// `allow_software`) a software fallback.
fn pick(names: &[String], allow_software: bool) -> Option<String> {
    let h264_named: Vec<&String> = names.iter().filter(|n| is_h264_named(n)).collect();

    let by_vendor = |marker: &str| -> Option<String> {
        h264_named
            .iter()
            .find(|n| n.to_ascii_lowercase().contains(marker))
            .map(|n| n.to_string())
    };

    if let Some(n) = by_vendor("nvidia") {
        return Some(n);
    }
    if let Some(n) = by_vendor("intel") {
        return Some(n);
    }
    if let Some(n) = by_vendor("amd") {
        return Some(n);
    }
    if let Some(n) = h264_named
        .iter()
        .find(|n| !is_software_named(n))
        .map(|n| n.to_string())
    {
        return Some(n);
    }
    if allow_software {
        return h264_named.first().map(|n| n.to_string());
    }
    None
}

/// Enumeration + priority selection per §4.2: try hardware-only first, and
/// if that enumeration yields nothing, retry allowing software encoders.
/// The result is informational (logging/behavior only) — the media
/// pipeline itself does not hard-bind to the chosen encoder.
pub fn select_best(names: &[String]) -> Option<String> {
    pick(names, false).or_else(|| pick(names, true))
}

/// Queries `MFTEnumEx` for H.264 output encoders, hardware-only first, then
/// (only if that comes back empty) allowing software MFTs — the enumeration
/// half of §4.2's "Encoder selection".
fn enumerate_names(hardware_only: bool) -> anyhow::Result<Vec<String>> {
    let mut output_type = MFT_REGISTER_TYPE_INFO {
        guidMajorType: MFMediaType_Video,
        guidSubtype: MFVideoFormat_H264,
    };
    let flags = MFT_ENUM_FLAG_SORTANDFILTER.0 as u32
        | if hardware_only {
            MFT_ENUM_FLAG_HARDWARE.0 as u32
        } else {
            MFT_ENUM_FLAG_ALL.0 as u32
        };

    let activates: Vec<Option<IMFActivate>> =
        unsafe { MFTEnumEx(MFT_CATEGORY_VIDEO_ENCODER, flags, None, Some(&mut output_type)) }
            .context("MFTEnumEx failed")?;

    Ok(activates
        .into_iter()
        .flatten()
        .filter_map(|activate| friendly_name(&activate))
        .collect())
}

fn friendly_name(activate: &IMFActivate) -> Option<String> {
    unsafe {
        let len = activate.GetStringLength(&MFT_FRIENDLY_NAME_Attribute).ok()?;
        if len == 0 {
            return None;
        }
        let mut buf = vec![0u16; len as usize + 1];
        let mut written = 0u32;
        activate
            .GetString(
                &MFT_FRIENDLY_NAME_Attribute,
                PWSTR(buf.as_mut_ptr()),
                buf.len() as u32,
                Some(&mut written),
            )
            .ok()?;
        Some(String::from_utf16_lossy(&buf[..written as usize]))
    }
}

/// Runs the full §4.2 "Encoder selection" procedure at startup: enumerate,
/// pick, and log the winner. The sink writer never hard-binds to this name
/// — calling this is purely diagnostic, as the spec requires.
pub fn select_and_log() -> Option<String> {
    let names = match enumerate_names(true) {
        Ok(names) if !names.is_empty() => names,
        Ok(_) => enumerate_names(false).unwrap_or_default(),
        Err(e) => {
            eprintln!("encoder: hardware encoder enumeration failed: {e:#}");
            enumerate_names(false).unwrap_or_default()
        }
    };

    match select_best(&names) {
        Some(name) => {
            println!("encoder: selected H.264 encoder '{name}'");
            Some(name)
        }
        None => {
            eprintln!("encoder: no H.264-named encoder found via MFTEnumEx enumeration");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn prefers_nvidia_over_intel_and_amd() {
        let list = names(&[
            "Intel Quick Sync H.264 Encoder MFT",
            "NVIDIA NVENC H.264 Encoder MFT",
            "AMD AMF H.264 Encoder MFT",
        ]);
        assert_eq!(
            select_best(&list).as_deref(),
            Some("NVIDIA NVENC H.264 Encoder MFT")
        );
    }

    #[test]
    fn falls_back_to_any_h264_named_hardware_encoder() {
        let list = names(&["Generic H264 Encoder MFT", "AAC Encoder MFT"]);
        assert_eq!(select_best(&list).as_deref(), Some("Generic H264 Encoder MFT"));
    }

    #[test]
    fn falls_back_to_software_only_when_nothing_else_matches() {
        let list = names(&["Microsoft H.264 Video Encoder MFT"]);
        assert_eq!(
            select_best(&list).as_deref(),
            Some("Microsoft H.264 Video Encoder MFT")
        );
    }

    #[test]
    fn returns_none_when_nothing_is_h264_named() {
        let list = names(&["AAC Encoder MFT", "MPEG-2 Decoder MFT"]);
        assert_eq!(select_best(&list), None);
    }

    #[test]
    fn filter_is_case_insensitive() {
        let list = names(&["nvidia nvenc avc encoder"]);
        assert!(select_best(&list).is_some());
    }
}
