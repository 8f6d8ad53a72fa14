// Vulkan Device - Core GPU interface
//
// Responsibilities:
// - Physical device listing and selection (first compatible device)
// - Graphics + present queue family selection
// - Logical device + queue creation
// - Memory allocator setup

use anyhow::{Context, Result};
use ash::extensions::khr;
use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use parking_lot::{Mutex, MutexGuard};
use std::ffi::CStr;
use std::mem::ManuallyDrop;
use std::sync::Arc;

use super::capabilities;
use super::{Instance, Surface};

/// Queue families the renderer submits to and presents from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Distinct family indices, one queue is created for each
    pub fn unique(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// Linear scan over a device's queue families.
///
/// A single family doing both graphics and present wins; otherwise the first
/// graphics family is paired with the first present family.
pub fn find_queue_families<F>(families: &[vk::QueueFamilyProperties], mut supports_present: F) -> Result<Option<QueueFamilies>>
where
    F: FnMut(u32) -> Result<bool>,
{
    let mut graphics = None;
    let mut present = None;

    for (index, family) in families.iter().enumerate() {
        if family.queue_count == 0 {
            continue;
        }
        let index = index as u32;

        let has_graphics = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        let has_present = supports_present(index)?;

        if has_graphics && has_present {
            return Ok(Some(QueueFamilies {
                graphics: index,
                present: index,
            }));
        }
        if has_graphics && graphics.is_none() {
            graphics = Some(index);
        }
        if has_present && present.is_none() {
            present = Some(index);
        }
    }

    Ok(graphics.zip(present).map(|(graphics, present)| QueueFamilies { graphics, present }))
}

/// Vulkan device wrapper with automatic cleanup
pub struct Device {
    // Dropped by hand before the device is destroyed
    allocator: ManuallyDrop<Mutex<Allocator>>,
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,

    // Queue handles
    pub queue_families: QueueFamilies,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,

    pub properties: vk::PhysicalDeviceProperties,
    pub instance: Arc<Instance>,
}

impl Device {
    /// Pick the first device able to render to `surface` and open it
    pub fn new(instance: Arc<Instance>, surface: &Surface) -> Result<Arc<Self>> {
        let (physical_device, queue_families) = pick_physical_device(&instance.instance, surface)?;

        let properties = unsafe { instance.instance.get_physical_device_properties(physical_device) };
        log::info!(
            "Selected GPU: {}",
            unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy()
        );
        log::info!("Queue families: {:?}", queue_families);

        let device = create_logical_device(&instance, physical_device, queue_families)?;

        let graphics_queue = unsafe { device.get_device_queue(queue_families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(queue_families.present, 0) };

        let allocator = match Allocator::new(&AllocatorCreateDesc {
            instance: instance.instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        }) {
            Ok(allocator) => allocator,
            Err(e) => {
                unsafe { device.destroy_device(None) };
                return Err(e).context("Failed to create memory allocator");
            }
        };

        Ok(Arc::new(Self {
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            device,
            physical_device,
            queue_families,
            graphics_queue,
            present_queue,
            properties,
            instance,
        }))
    }

    pub fn allocator(&self) -> MutexGuard<'_, Allocator> {
        self.allocator.lock()
    }

    /// Wait for device to be idle (e.g., before cleanup)
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }?;
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan device...");

        let _ = self.wait_idle();

        unsafe {
            // The allocator frees its memory blocks through the device
            ManuallyDrop::drop(&mut self.allocator);
            self.device.destroy_device(None);
        }
    }
}

fn pick_physical_device(
    instance: &ash::Instance,
    surface: &Surface,
) -> Result<(vk::PhysicalDevice, QueueFamilies)> {
    let devices = unsafe { instance.enumerate_physical_devices() }?;

    if devices.is_empty() {
        anyhow::bail!("No physical device found that supports Vulkan");
    }

    log::info!("{} physical devices:", devices.len());

    let mut selected = None;
    for device in devices {
        log_physical_device(instance, device)?;

        if selected.is_none() {
            if let Some(families) = check_compatibility(instance, surface, device)? {
                selected = Some((device, families));
            }
        }
    }

    selected.context("No compatible physical device detected")
}

fn check_compatibility(
    instance: &ash::Instance,
    surface: &Surface,
    device: vk::PhysicalDevice,
) -> Result<Option<QueueFamilies>> {
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
    let Some(queue_families) =
        find_queue_families(&families, |index| surface.supports_present(device, index))?
    else {
        return Ok(None);
    };

    let available = unsafe { instance.enumerate_device_extension_properties(device) }?;
    let available = capabilities::extension_names(&available);
    let required = [khr::Swapchain::name().to_str()?];
    let missing = capabilities::missing_names(&required, &available);
    if !missing.is_empty() {
        log::warn!("Missing device extensions: {:?}", missing);
        return Ok(None);
    }

    if !surface.query_support(device)?.is_adequate() {
        return Ok(None);
    }

    Ok(Some(queue_families))
}

fn log_physical_device(instance: &ash::Instance, device: vk::PhysicalDevice) -> Result<()> {
    let props = unsafe { instance.get_physical_device_properties(device) };
    log::info!(
        "\t{} - API: {} & DRIVER: {}",
        unsafe { CStr::from_ptr(props.device_name.as_ptr()) }.to_string_lossy(),
        capabilities::format_version(props.api_version),
        capabilities::format_version(props.driver_version)
    );

    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
    log::info!("\t{} queue families:", families.len());
    for family in &families {
        log::info!(
            "\t\tCount: {}, Flags: {:?}",
            family.queue_count,
            capabilities::queue_flag_names(family.queue_flags)
        );
    }

    let extensions = unsafe { instance.enumerate_device_extension_properties(device) }?;
    capabilities::log_extensions("device extensions", &extensions);

    Ok(())
}

fn create_logical_device(
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
    queue_families: QueueFamilies,
) -> Result<ash::Device> {
    let queue_priorities = [1.0];
    let queue_create_infos: Vec<_> = queue_families
        .unique()
        .into_iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(family)
                .queue_priorities(&queue_priorities)
                .build()
        })
        .collect();

    let extensions = [khr::Swapchain::name().as_ptr()];
    let features = vk::PhysicalDeviceFeatures::default();

    // Device layers are ignored by current loaders, older ones still need them
    let layers: Vec<_> = instance.layer_names().iter().map(|name| name.as_ptr()).collect();

    let create_info = vk::DeviceCreateInfo::builder()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extensions)
        .enabled_layer_names(&layers)
        .enabled_features(&features);

    let device = unsafe { instance.instance.create_device(physical_device, &create_info, None) }
        .context("Failed to create the logical device")?;

    Ok(device)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags, count: u32) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: count,
            ..Default::default()
        }
    }

    #[test]
    fn first_family_with_both_wins() {
        let families = [
            family(vk::QueueFlags::TRANSFER, 1),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, 16),
            family(vk::QueueFlags::GRAPHICS, 1),
        ];

        let found = find_queue_families(&families, |_| Ok(true)).unwrap();
        assert_eq!(found, Some(QueueFamilies { graphics: 1, present: 1 }));
        assert!(found.unwrap().is_shared());
        assert_eq!(found.unwrap().unique(), vec![1]);
    }

    #[test]
    fn split_families_when_no_single_family_does_both() {
        let families = [
            family(vk::QueueFlags::GRAPHICS, 1),
            family(vk::QueueFlags::COMPUTE, 1),
            family(vk::QueueFlags::TRANSFER, 1),
        ];

        let found = find_queue_families(&families, |index| Ok(index >= 1)).unwrap();
        let found = found.unwrap();
        assert_eq!(found, QueueFamilies { graphics: 0, present: 1 });
        assert!(!found.is_shared());
        assert_eq!(found.unique(), vec![0, 1]);
    }

    #[test]
    fn empty_families_are_skipped() {
        let families = [
            family(vk::QueueFlags::GRAPHICS, 0),
            family(vk::QueueFlags::GRAPHICS, 2),
        ];

        let found = find_queue_families(&families, |_| Ok(true)).unwrap();
        assert_eq!(found, Some(QueueFamilies { graphics: 1, present: 1 }));
    }

    #[test]
    fn incomplete_when_nothing_presents() {
        let families = [family(vk::QueueFlags::GRAPHICS, 1)];
        assert_eq!(find_queue_families(&families, |_| Ok(false)).unwrap(), None);
    }

    #[test]
    fn incomplete_without_graphics() {
        let families = [family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER, 4)];
        assert_eq!(find_queue_families(&families, |_| Ok(true)).unwrap(), None);
    }

    #[test]
    fn present_query_errors_propagate() {
        let families = [family(vk::QueueFlags::GRAPHICS, 1)];
        let result = find_queue_families(&families, |_| Err(anyhow::anyhow!("surface lost")));
        assert!(result.is_err());
    }
}
