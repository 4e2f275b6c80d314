// Desktop-duplication session (§4.1): the classic IDXGIOutputDuplication
// API. Chosen over the newer WinRT capture surface because its
// acquire/release/"access lost" vocabulary is exactly the dispatch the
// Capture Worker needs (§7, §9) — see DESIGN.md for the tradeoff.

use windows::core::Interface;
use windows::Win32::Graphics::Direct3D11::*;
use windows::Win32::Graphics::Dxgi::Common::*;
use windows::Win32::Graphics::Dxgi::*;

use crate::d3d11::texture::TextureReader;
use crate::d3d11::{create_d3d11_device, D3D11Context};
use crate::error::AcquisitionError;
use crate::frame::{MonotonicClock, RawFrame};

use super::tonemap;

/// Hardware abstraction seam (§9: "any [session] that honors the contract
/// conforms") — lets the Capture Worker be driven by a fake session in
/// tests instead of a real desktop-duplication session.
pub trait DisplayDuplicator: Send {
    /// Attempts one frame acquisition, waiting up to `timeout_ms`.
    fn acquire_frame(&mut self, timeout_ms: u32) -> Result<RawFrame, AcquisitionError>;
}

pub struct DxgiDuplicator {
    #[allow(dead_code)]
    ctx: D3D11Context,
    duplication: IDXGIOutputDuplication,
    reader: TextureReader,
    hdr: bool,
    clock: MonotonicClock,
}

impl DxgiDuplicator {
    /// Initializes a duplication session against the primary output of the
    /// first adapter. Called again on every re-init per §4.1's session
    /// lifecycle state machine.
    pub fn initialize() -> anyhow::Result<Self> {
        let ctx = create_d3d11_device()?;
        let adapter: IDXGIAdapter = unsafe { ctx.dxgi_device.GetAdapter()?.cast()? };
        let output = unsafe { adapter.EnumOutputs(0)? };
        let output1: IDXGIOutput1 = output.cast()?;
        let duplication = unsafe { output1.DuplicateOutput(&ctx.device)? };

        let desc = unsafe { duplication.GetDesc() };
        let hdr = desc.ModeDesc.Format == DXGI_FORMAT_R16G16B16A16_FLOAT;

        let reader = TextureReader::new(ctx.device.clone(), ctx.context.clone());

        Ok(Self {
            ctx,
            duplication,
            reader,
            hdr,
            clock: MonotonicClock::new(),
        })
    }
}

impl DisplayDuplicator for DxgiDuplicator {
    fn acquire_frame(&mut self, timeout_ms: u32) -> Result<RawFrame, AcquisitionError> {
        let mut frame_info = DXGI_OUTDUPL_FRAME_INFO::default();
        let mut resource: Option<IDXGIResource> = None;

        if let Err(e) =
            unsafe { self.duplication.AcquireNextFrame(timeout_ms, &mut frame_info, &mut resource) }
        {
            return Err(classify(e));
        }

        let resource = match resource {
            Some(r) => r,
            None => {
                let _ = unsafe { self.duplication.ReleaseFrame() };
                return Err(AcquisitionError::Other(anyhow::anyhow!(
                    "AcquireNextFrame returned no resource"
                )));
            }
        };

        let outcome = self.read_resource(&resource);
        let _ = unsafe { self.duplication.ReleaseFrame() };
        outcome.map_err(AcquisitionError::Other)
    }
}

impl DxgiDuplicator {
    fn read_resource(&mut self, resource: &windows::Win32::Graphics::Dxgi::IDXGIResource) -> anyhow::Result<RawFrame> {
        let texture: ID3D11Texture2D = resource.cast()?;
        let raw = self.reader.read_texture(&texture)?;

        let mut desc = D3D11_TEXTURE2D_DESC::default();
        unsafe {
            texture.GetDesc(&mut desc);
        }

        let data = if self.hdr {
            // SAFETY: `raw` was read from an R16G16B16A16_FLOAT texture, so
            // its length is a multiple of 2 and this reinterprets byte pairs
            // as the u16 halves they already are.
            let halves =
                unsafe { std::slice::from_raw_parts(raw.as_ptr() as *const u16, raw.len() / 2) };
            tonemap::hdr_to_bgra8(halves, desc.Width, desc.Height)
        } else {
            raw
        };

        Ok(RawFrame::new(data, desc.Width, desc.Height, self.clock.now_hns()))
    }
}

fn classify(e: windows::core::Error) -> AcquisitionError {
    if e.code() == DXGI_ERROR_WAIT_TIMEOUT {
        AcquisitionError::Timeout
    } else if e.code() == DXGI_ERROR_ACCESS_LOST {
        AcquisitionError::AccessLost
    } else {
        AcquisitionError::Other(anyhow::anyhow!(e))
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::collections::VecDeque;

    /// A scripted [`DisplayDuplicator`] for testing the Capture Worker's
    /// pacing, repeat-frame, and re-init logic without real hardware.
    pub struct FakeDuplicator {
        pub scripted: VecDeque<Result<RawFrame, AcquisitionError>>,
        pub acquire_count: usize,
    }

    impl FakeDuplicator {
        pub fn new(scripted: Vec<Result<RawFrame, AcquisitionError>>) -> Self {
            Self {
                scripted: scripted.into(),
                acquire_count: 0,
            }
        }
    }

    impl DisplayDuplicator for FakeDuplicator {
        fn acquire_frame(&mut self, _timeout_ms: u32) -> Result<RawFrame, AcquisitionError> {
            self.acquire_count += 1;
            self.scripted
                .pop_front()
                .unwrap_or(Err(AcquisitionError::Timeout))
        }
    }
}
