// Production SegmentSink backed by Media Foundation's IMFSinkWriter
// (§4.2, §6, §9 — COM vtable dispatch in the source becomes a direct native
// interface call here).

use std::path::Path;

use anyhow::{Context, Result};
use windows::core::HSTRING;
use windows::Win32::Media::MediaFoundation::*;

use super::sink::SegmentSink;

pub struct MfSinkWriter {
    writer: Option<IMFSinkWriter>,
    stream_index: u32,
}

impl MfSinkWriter {
    /// Starts up the Media Foundation platform for this process. Must run
    /// once before any `MfSinkWriter` is constructed; idempotent per MF's
    /// own reference-counted startup/shutdown semantics.
    pub fn startup() -> Result<()> {
        unsafe { MFStartup(MF_VERSION, MFSTARTUP_FULL) }.context("MFStartup failed")
    }

    pub fn shutdown() -> Result<()> {
        unsafe { MFShutdown() }.context("MFShutdown failed")
    }

    pub fn new() -> Self {
        Self {
            writer: None,
            stream_index: 0,
        }
    }
}

impl Default for MfSinkWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentSink for MfSinkWriter {
    fn begin_segment(
        &mut self,
        path: &Path,
        width: u32,
        height: u32,
        fps: u32,
        average_bitrate_bps: u32,
    ) -> Result<()> {
        let url = HSTRING::from(path.as_os_str());
        let writer = unsafe { MFCreateSinkWriterFromURL(&url, None, None) }
            .context("MFCreateSinkWriterFromURL failed")?;

        let output_type = unsafe { MFCreateMediaType() }.context("creating output media type")?;
        unsafe {
            output_type.SetGUID(&MF_MT_MAJOR_TYPE, &MFMediaType_Video)?;
            output_type.SetGUID(&MF_MT_SUBTYPE, &MFVideoFormat_H264)?;
            output_type.SetUINT32(&MF_MT_AVG_BITRATE, average_bitrate_bps)?;
            output_type.SetUINT32(&MF_MT_INTERLACE_MODE, MFVideoInterlace_Progressive.0 as u32)?;
            MFSetAttributeSize(&output_type, &MF_MT_FRAME_SIZE, width, height)?;
            MFSetAttributeRatio(&output_type, &MF_MT_FRAME_RATE, fps, 1)?;
            MFSetAttributeRatio(&output_type, &MF_MT_PIXEL_ASPECT_RATIO, 1, 1)?;
        }

        let stream_index = unsafe { writer.AddStream(&output_type) }
            .context("adding H.264 output stream")?;

        let input_type = unsafe { MFCreateMediaType() }.context("creating input media type")?;
        unsafe {
            input_type.SetGUID(&MF_MT_MAJOR_TYPE, &MFMediaType_Video)?;
            input_type.SetGUID(&MF_MT_SUBTYPE, &MFVideoFormat_NV12)?;
            input_type.SetUINT32(&MF_MT_INTERLACE_MODE, MFVideoInterlace_Progressive.0 as u32)?;
            MFSetAttributeSize(&input_type, &MF_MT_FRAME_SIZE, width, height)?;
            MFSetAttributeRatio(&input_type, &MF_MT_FRAME_RATE, fps, 1)?;
            MFSetAttributeRatio(&input_type, &MF_MT_PIXEL_ASPECT_RATIO, 1, 1)?;

            writer
                .SetInputMediaType(stream_index, &input_type, None)
                .context("configuring NV12 input media type")?;
            writer.BeginWriting().context("BeginWriting failed")?;
        }

        self.writer = Some(writer);
        self.stream_index = stream_index;
        Ok(())
    }

    fn write_sample(
        &mut self,
        nv12: &[u8],
        sample_time_hns: i64,
        sample_duration_hns: i64,
    ) -> Result<()> {
        let writer = self
            .writer
            .as_ref()
            .context("write_sample called with no open segment")?;

        unsafe {
            let buffer = MFCreateMemoryBuffer(nv12.len() as u32).context("allocating sample buffer")?;
            {
                let mut ptr = std::ptr::null_mut();
                buffer.Lock(&mut ptr, None, None)?;
                std::ptr::copy_nonoverlapping(nv12.as_ptr(), ptr, nv12.len());
                buffer.Unlock()?;
                buffer.SetCurrentLength(nv12.len() as u32)?;
            }

            let sample = MFCreateSample().context("creating media sample")?;
            sample.AddBuffer(&buffer)?;
            sample.SetSampleTime(sample_time_hns)?;
            sample.SetSampleDuration(sample_duration_hns)?;

            writer
                .WriteSample(self.stream_index, &sample)
                .context("WriteSample failed")?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            unsafe { writer.Finalize() }.context("Finalize failed")?;
        }
        Ok(())
    }
}
