// Vertex buffer in host-visible memory
//
// Memory comes from the device's gpu-allocator. The triangle is tiny and
// never changes, so it is written once through the persistent mapping and
// read by the GPU straight from there.

use anyhow::{Context, Result};
use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use std::sync::Arc;

use super::Device;
use crate::vertex::Vertex;

pub struct VertexBuffer {
    pub buffer: vk::Buffer,
    pub vertex_count: u32,
    allocation: Option<Allocation>,
    device: Arc<Device>,
}

impl VertexBuffer {
    pub fn new(device: Arc<Device>, vertices: &[Vertex]) -> Result<Self> {
        let bytes: &[u8] = bytemuck::cast_slice(vertices);

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(bytes.len() as vk::DeviceSize)
            .usage(vk::BufferUsageFlags::VERTEX_BUFFER)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.device.create_buffer(&buffer_info, None) }
            .context("Failed to create vertex buffer")?;

        // Owned from here on, so an allocation failure still destroys the buffer
        let mut this = Self {
            buffer,
            vertex_count: vertices.len() as u32,
            allocation: None,
            device,
        };

        let requirements = unsafe { this.device.device.get_buffer_memory_requirements(buffer) };
        let mut allocation = this
            .device
            .allocator()
            .allocate(&AllocationCreateDesc {
                name: "triangle vertices",
                requirements,
                location: MemoryLocation::CpuToGpu,
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .context("Failed to allocate vertex buffer memory")?;

        let mapped = allocation
            .mapped_slice_mut()
            .context("Vertex buffer memory is not host visible")?;
        mapped[..bytes.len()].copy_from_slice(bytes);

        let bind = unsafe {
            this.device
                .device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        };
        this.allocation = Some(allocation);
        bind.context("Failed to bind vertex buffer memory")?;

        log::debug!("Uploaded {} vertices ({} bytes)", vertices.len(), bytes.len());

        Ok(this)
    }
}

impl Drop for VertexBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_buffer(self.buffer, None);
        }

        if let Some(allocation) = self.allocation.take() {
            if let Err(e) = self.device.allocator().free(allocation) {
                log::error!("Failed to free vertex buffer memory: {}", e);
            }
        }
    }
}
