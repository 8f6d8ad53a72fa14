// Command pool and the prerecorded draw commands
//
// The scene never changes, so every swapchain image gets its command buffer
// recorded once and resubmitted each frame.

use anyhow::{Context, Result};
use ash::vk;
use std::sync::Arc;

use super::buffer::VertexBuffer;
use super::pipeline::{Framebuffers, GraphicsPipeline, RenderPass};
use super::Device;

pub struct CommandPool {
    pub pool: vk::CommandPool,
    device: Arc<Device>,
}

impl CommandPool {
    pub fn new(device: Arc<Device>) -> Result<Arc<Self>> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(device.queue_families.graphics);

        let pool = unsafe { device.device.create_command_pool(&pool_info, None) }
            .context("Failed to create command pool")?;

        Ok(Arc::new(Self { pool, device }))
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_command_pool(self.pool, None);
        }
    }
}

/// Everything recorded into the per-image command buffers
pub struct DrawParams<'a> {
    pub render_pass: &'a RenderPass,
    pub framebuffers: &'a Framebuffers,
    pub pipeline: &'a GraphicsPipeline,
    pub vertex_buffer: &'a VertexBuffer,
    pub extent: vk::Extent2D,
    pub clear_color: [f32; 4],
}

/// Primary command buffers, one per framebuffer, freed back to their pool
pub struct CommandBuffers {
    pub buffers: Vec<vk::CommandBuffer>,
    pool: Arc<CommandPool>,
}

impl CommandBuffers {
    pub fn record(pool: Arc<CommandPool>, params: &DrawParams<'_>) -> Result<Self> {
        let device = &pool.device.device;
        let framebuffers = &params.framebuffers.framebuffers;

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(framebuffers.len() as u32);

        let buffers = unsafe { device.allocate_command_buffers(&alloc_info) }
            .context("Failed to allocate command buffers")?;
        let this = Self { buffers, pool: pool.clone() };

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::SIMULTANEOUS_USE);

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: params.clear_color,
            },
        }];

        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: params.extent,
        };

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: params.extent.width as f32,
            height: params.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };

        for (&cmd, &framebuffer) in this.buffers.iter().zip(framebuffers) {
            let render_pass_info = vk::RenderPassBeginInfo::builder()
                .render_pass(params.render_pass.render_pass)
                .framebuffer(framebuffer)
                .render_area(render_area)
                .clear_values(&clear_values);

            unsafe {
                device
                    .begin_command_buffer(cmd, &begin_info)
                    .context("Failed to begin recording to a command buffer")?;

                device.cmd_begin_render_pass(cmd, &render_pass_info, vk::SubpassContents::INLINE);
                device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, params.pipeline.pipeline);
                device.cmd_set_viewport(cmd, 0, &[viewport]);
                device.cmd_set_scissor(cmd, 0, &[render_area]);
                device.cmd_bind_vertex_buffers(cmd, 0, &[params.vertex_buffer.buffer], &[0]);
                device.cmd_draw(cmd, params.vertex_buffer.vertex_count, 1, 0, 0);
                device.cmd_end_render_pass(cmd);

                device
                    .end_command_buffer(cmd)
                    .context("Failed to record a command buffer")?;
            }
        }

        log::info!("Recorded {} command buffers", this.buffers.len());

        Ok(this)
    }
}

impl Drop for CommandBuffers {
    fn drop(&mut self) {
        unsafe {
            self.pool
                .device
                .device
                .free_command_buffers(self.pool.pool, &self.buffers);
        }
    }
}
