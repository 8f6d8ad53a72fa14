// =============================================================================
// RENDERER - every Vulkan object the triangle needs, in one place
// =============================================================================
//
// FRAME FLOW:
// 1. Wait for the fence of this frame slot
// 2. Acquire the next swapchain image
// 3. Submit that image's prerecorded command buffer
// 4. Present
// 5. Advance to the next slot
//
// Field order is teardown order. Rust drops fields top to bottom, and each
// wrapper also holds Arcs to its parents, so nothing outlives what it was
// created from.

use anyhow::{Context, Result};
use ash::vk;
use raw_window_handle::HasRawDisplayHandle;
use std::sync::Arc;
use winit::window::Window;

use crate::backend::buffer::VertexBuffer;
use crate::backend::commands::{CommandBuffers, CommandPool, DrawParams};
use crate::backend::pipeline::{Framebuffers, GraphicsPipeline, RenderPass};
use crate::backend::shader::ShaderModule;
use crate::backend::swapchain::choose_surface_format;
use crate::backend::sync::{FrameCounter, FrameSync};
use crate::backend::{Device, Instance, Surface, Swapchain};
use crate::config::Config;
use crate::vertex::TRIANGLE;

/// Everything that has to be rebuilt when the swapchain changes
struct RenderTargets {
    command_buffers: CommandBuffers,
    framebuffers: Framebuffers,
    swapchain: Swapchain,
}

pub struct Renderer {
    // ─────────────────────────────────────────────────────────────────────────
    // SYNCHRONIZATION
    // ─────────────────────────────────────────────────────────────────────────
    frames: Vec<FrameSync>,
    frame_counter: FrameCounter,
    wait_stages: [vk::PipelineStageFlags; 1],

    // ─────────────────────────────────────────────────────────────────────────
    // SWAPCHAIN BOUND (None while the window has no area)
    // ─────────────────────────────────────────────────────────────────────────
    targets: Option<RenderTargets>,

    // ─────────────────────────────────────────────────────────────────────────
    // PIPELINE & GEOMETRY
    // ─────────────────────────────────────────────────────────────────────────
    pipeline: GraphicsPipeline,
    render_pass: RenderPass,
    vertex_buffer: VertexBuffer,
    command_pool: Arc<CommandPool>,

    // ─────────────────────────────────────────────────────────────────────────
    // VULKAN CORE
    // ─────────────────────────────────────────────────────────────────────────
    device: Arc<Device>,
    surface: Arc<Surface>,
    _instance: Arc<Instance>,
    window: Arc<Window>,

    format: vk::Format,
    clear_color: [f32; 4],
    needs_recreate: bool,
}

impl Renderer {
    /// Run the whole setup sequence against `window`.
    ///
    /// Any failure along the way is fatal; whatever was already created is
    /// released as the partially built wrappers drop.
    pub fn new(window: Arc<Window>, config: &Config) -> Result<Self> {
        log::info!("Initializing Vulkan...");

        let instance = Instance::new(
            &config.window.title,
            window.raw_display_handle(),
            config.debug.validation,
        )?;
        let surface = Surface::new(instance.clone(), window.as_ref())?;
        let device = Device::new(instance.clone(), &surface)?;

        let support = surface.query_support(device.physical_device)?;
        let format = choose_surface_format(&support.formats)
            .context("Surface reports no formats")?
            .format;

        let render_pass = RenderPass::new(device.clone(), format)?;

        // Shader modules are only needed until the pipeline exists
        let pipeline = {
            let vert = ShaderModule::from_file(device.clone(), &config.shaders.vertex)
                .context("Failed to load the vertex shader")?;
            let frag = ShaderModule::from_file(device.clone(), &config.shaders.fragment)
                .context("Failed to load the fragment shader")?;
            GraphicsPipeline::new(device.clone(), &render_pass, &vert, &frag)?
        };

        let vertex_buffer = VertexBuffer::new(device.clone(), &TRIANGLE)?;
        let command_pool = CommandPool::new(device.clone())?;

        let frame_counter = FrameCounter::new(config.graphics.max_frames_in_flight);
        let frames = (0..frame_counter.frames_in_flight())
            .map(|_| FrameSync::new(device.clone()))
            .collect::<Result<Vec<_>>>()?;

        let mut renderer = Self {
            frames,
            frame_counter,
            wait_stages: [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT],
            targets: None,
            pipeline,
            render_pass,
            vertex_buffer,
            command_pool,
            device,
            surface,
            _instance: instance,
            window,
            format,
            clear_color: config.graphics.clear_color,
            needs_recreate: false,
        };
        renderer.targets = renderer.build_targets()?;

        log::info!("Vulkan initialized successfully!");
        Ok(renderer)
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// The window changed size; rebuild the swapchain before the next frame
    pub fn resized(&mut self) {
        self.needs_recreate = true;
    }

    /// Swapchain, framebuffers and command buffers for the current window size
    fn build_targets(&self) -> Result<Option<RenderTargets>> {
        let size = self.window.inner_size();

        // Minimized: no swapchain can be made with a zero extent
        if size.width == 0 || size.height == 0 {
            log::debug!("Window has no area, skipping swapchain creation");
            return Ok(None);
        }

        let swapchain = Swapchain::new(
            self.device.clone(),
            self.surface.clone(),
            vk::Extent2D {
                width: size.width,
                height: size.height,
            },
        )?;

        if swapchain.format != self.format {
            anyhow::bail!(
                "Swapchain format changed from {:?} to {:?}",
                self.format,
                swapchain.format
            );
        }

        let framebuffers = Framebuffers::new(
            self.device.clone(),
            &self.render_pass,
            &swapchain.image_views,
            swapchain.extent,
        )?;

        let command_buffers = CommandBuffers::record(
            self.command_pool.clone(),
            &DrawParams {
                render_pass: &self.render_pass,
                framebuffers: &framebuffers,
                pipeline: &self.pipeline,
                vertex_buffer: &self.vertex_buffer,
                extent: swapchain.extent,
                clear_color: self.clear_color,
            },
        )?;

        Ok(Some(RenderTargets {
            command_buffers,
            framebuffers,
            swapchain,
        }))
    }

    fn recreate_swapchain(&mut self) -> Result<()> {
        // Nothing may still be using the old images
        self.device.wait_idle()?;

        // The surface can only have one swapchain at a time
        self.targets = None;
        self.targets = self.build_targets()?;
        self.needs_recreate = false;

        Ok(())
    }

    /// Render a single frame. Returns false when nothing was presented.
    pub fn draw_frame(&mut self) -> Result<bool> {
        if self.needs_recreate {
            self.recreate_swapchain()?;
        }

        let Some(targets) = self.targets.as_ref() else {
            return Ok(false);
        };
        let sync = &self.frames[self.frame_counter.current()];

        // ─────────────────────────────────────────────────────────────────────
        // STEP 1: Wait until this slot's previous submission finished
        // ─────────────────────────────────────────────────────────────────────
        sync.wait()?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 2: Acquire the next image
        // ─────────────────────────────────────────────────────────────────────
        let Some((image_index, suboptimal)) = targets.swapchain.acquire_next_image(sync.image_available)?
        else {
            // Fence left signaled, so the retry doesn't deadlock on it
            self.needs_recreate = true;
            return Ok(false);
        };

        sync.reset()?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 3: Submit the prerecorded commands for that image
        // ─────────────────────────────────────────────────────────────────────
        let command_buffers = [targets.command_buffers.buffers[image_index as usize]];
        let wait_semaphores = [sync.image_available];
        let signal_semaphores = [sync.render_finished];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&self.wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        unsafe {
            self.device
                .device
                .queue_submit(self.device.graphics_queue, &[submit_info], sync.in_flight_fence)
        }
        .context("Failed to submit draw command buffer")?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 4: Present once rendering finished
        // ─────────────────────────────────────────────────────────────────────
        let out_of_date =
            targets
                .swapchain
                .present(self.device.present_queue, image_index, &signal_semaphores)?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 5: Advance to next frame slot
        // ─────────────────────────────────────────────────────────────────────
        self.frame_counter.advance();

        if suboptimal || out_of_date {
            self.needs_recreate = true;
        }

        Ok(true)
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        log::info!("Cleaning up Vulkan resources...");

        // Wait for GPU to finish before the fields start dropping
        if let Err(e) = self.device.wait_idle() {
            log::error!("Failed to wait for device idle: {:#}", e);
        }
    }
}
