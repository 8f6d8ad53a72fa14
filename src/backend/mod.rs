// Backend module - Vulkan abstraction layer
//
// Design: thin wrappers around ash. Each wrapper owns one Vulkan object,
// holds an Arc to whatever it was created from, and releases itself on
// drop, so teardown runs in reverse creation order without a cleanup list.

pub mod buffer;
pub mod capabilities;
pub mod commands;
pub mod debug;
pub mod device;
pub mod instance;
pub mod pipeline;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use device::Device;
pub use instance::Instance;
pub use surface::Surface;
pub use swapchain::Swapchain;
