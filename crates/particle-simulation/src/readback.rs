//! Blocking texture readback
//!
//! `copy_texture_to_buffer` requires `bytes_per_row` to be a multiple of
//! `wgpu::COPY_BYTES_PER_ROW_ALIGNMENT` (256), so rows land padded in the staging
//! buffer and are stripped again on decode.

use crate::{Result, SimulationError};
use glam::UVec2;
use particle_physics::Texel;
use std::sync::mpsc;

const TEXEL_SIZE: u32 = std::mem::size_of::<Texel>() as u32;

fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * TEXEL_SIZE;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (unpadded + align - 1) / align * align
}

/// Copy a `size.x`×`size.y` region starting at `origin` out of an RGBA32F texture.
///
/// Texels come back row-major. Blocks until the GPU has finished the copy.
pub(crate) fn read_texels(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    origin: UVec2,
    size: UVec2,
) -> Result<Vec<Texel>> {
    let bytes_per_row = padded_bytes_per_row(size.x);
    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("State Readback Buffer"),
        size: (bytes_per_row * size.y) as u64,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("State Readback Encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d {
                x: origin.x,
                y: origin.y,
                z: 0,
            },
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(size.y),
            },
        },
        wgpu::Extent3d {
            width: size.x,
            height: size.y,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device.poll(wgpu::PollType::Wait {
        submission_index: None,
        timeout: None,
    })?;
    rx.recv().map_err(|_| SimulationError::ReadbackAborted)??;

    let mut texels = Vec::with_capacity((size.x * size.y) as usize);
    {
        let data = slice.get_mapped_range();
        let row_len = (size.x * TEXEL_SIZE) as usize;
        for row in data.chunks(bytes_per_row as usize) {
            texels.extend_from_slice(bytemuck::cast_slice::<u8, Texel>(&row[..row_len]));
        }
    }
    staging.unmap();

    Ok(texels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_padding() {
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(16), 256);
        assert_eq!(padded_bytes_per_row(17), 512);
        assert_eq!(padded_bytes_per_row(250), 4096);
    }
}
