// D3D11 device creation and management.

pub mod texture;

use anyhow::Context;
use windows::core::Interface;
use windows::Win32::Foundation::HMODULE;
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D11::*;
use windows::Win32::Graphics::Dxgi::*;

/// A D3D11 device and its immediate context, plus the DXGI device used to
/// reach the adapter that owns the duplication session.
pub struct D3D11Context {
    pub device: ID3D11Device,
    pub context: ID3D11DeviceContext,
    pub dxgi_device: IDXGIDevice,
}

pub fn create_d3d11_device() -> anyhow::Result<D3D11Context> {
    let (device, context) = unsafe {
        let mut device = None;
        let mut context = None;

        D3D11CreateDevice(
            None,
            D3D_DRIVER_TYPE_HARDWARE,
            HMODULE::default(),
            D3D11_CREATE_DEVICE_BGRA_SUPPORT,
            Some(&[D3D_FEATURE_LEVEL_11_0]),
            D3D11_SDK_VERSION,
            Some(&mut device),
            None,
            Some(&mut context),
        )
        .context("D3D11CreateDevice failed")?;

        (device.unwrap(), context.unwrap())
    };

    let dxgi_device: IDXGIDevice = device.cast().unwrap();
    let _ = print_device_info(&dxgi_device);

    Ok(D3D11Context {
        device,
        context,
        dxgi_device,
    })
}

fn print_device_info(dxgi_device: &IDXGIDevice) -> anyhow::Result<()> {
    unsafe {
        let adapter = dxgi_device.GetAdapter()?;
        let desc = adapter.GetDesc()?;
        let name = String::from_utf16_lossy(&desc.Description);

        println!("d3d11: device created on {}", name.trim_end_matches('\0'));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore = "requires a real GPU adapter"]
    fn test_device_creation() {
        let _ctx = create_d3d11_device().expect("device creation failed");
    }

    #[test]
    #[ignore = "requires a real GPU adapter"]
    fn test_dxgi_adapter() {
        let ctx = create_d3d11_device().unwrap();
        unsafe {
            let adapter = ctx.dxgi_device.GetAdapter();
            assert!(adapter.is_ok());
            let desc = adapter.unwrap().GetDesc();
            assert!(desc.is_ok());
        }
    }
}
