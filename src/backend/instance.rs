// Vulkan instance - loader entry, instance, optional debug messenger
//
// Responsibilities:
// - Verify required instance extensions and layers are available
// - Instance creation, with validation layers when enabled
// - Debug messenger registration (also chained into instance creation)

use anyhow::{Context, Result};
use ash::extensions::ext::DebugUtils;
use ash::{vk, Entry};
use raw_window_handle::RawDisplayHandle;
use std::ffi::{CStr, CString};
use std::sync::Arc;

use super::capabilities;
use super::debug;

pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Vulkan instance wrapper with automatic cleanup
pub struct Instance {
    debug_utils: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
    pub instance: ash::Instance,
    pub entry: Entry,
    pub validation: bool,
}

impl Instance {
    /// Create the instance for a window living on `display_handle`
    pub fn new(app_name: &str, display_handle: RawDisplayHandle, validation: bool) -> Result<Arc<Self>> {
        log::info!("Creating Vulkan instance (validation: {})", validation);

        let entry = unsafe { Entry::load() }
            .context("Failed to load Vulkan library. Is Vulkan installed?")?;

        let extensions = required_extensions(display_handle, validation)?;
        check_extensions(&entry, &extensions)?;

        let layers: Vec<&CStr> = if validation { vec![VALIDATION_LAYER] } else { vec![] };
        if validation {
            check_layers(&entry, &layers)?;
        }

        let instance = create_instance(&entry, app_name, &extensions, &layers, validation)?;

        let debug_utils = if validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            let create_info = debug::messenger_create_info();
            match unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) } {
                Ok(messenger) => Some((debug_utils, messenger)),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e).context("Failed to create debug messenger");
                }
            }
        } else {
            None
        };

        Ok(Arc::new(Self {
            debug_utils,
            instance,
            entry,
            validation,
        }))
    }

    /// Layers to repeat on device creation, for loaders that still read them
    pub fn layer_names(&self) -> Vec<&'static CStr> {
        if self.validation {
            vec![VALIDATION_LAYER]
        } else {
            vec![]
        }
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan instance...");

        unsafe {
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Surface extensions for this window system, plus debug utils when validating
fn required_extensions(display_handle: RawDisplayHandle, validation: bool) -> Result<Vec<&'static CStr>> {
    let surface_extensions = ash_window::enumerate_required_extensions(display_handle)
        .context("Failed to find the Vulkan extensions required by the window system")?;

    let mut extensions: Vec<&'static CStr> = surface_extensions
        .iter()
        .map(|&name| unsafe { CStr::from_ptr(name) })
        .collect();

    if validation {
        extensions.push(DebugUtils::name());
    }

    Ok(extensions)
}

fn check_extensions(entry: &Entry, required: &[&CStr]) -> Result<()> {
    let required = to_strs(required)?;
    log::info!("Required extensions: {:?}", required);

    let available = entry.enumerate_instance_extension_properties(None)?;
    capabilities::log_extensions("instance extensions", &available);

    capabilities::ensure_available("extensions", &required, &capabilities::extension_names(&available))
}

fn check_layers(entry: &Entry, required: &[&CStr]) -> Result<()> {
    let required = to_strs(required)?;
    log::info!("Required layers: {:?}", required);

    let available = entry.enumerate_instance_layer_properties()?;
    capabilities::log_layers(&available);

    capabilities::ensure_available("layers", &required, &capabilities::layer_names(&available))
}

fn to_strs<'a>(names: &[&'a CStr]) -> Result<Vec<&'a str>> {
    names
        .iter()
        .map(|name| name.to_str().context("Non UTF-8 Vulkan name"))
        .collect()
}

fn create_instance(
    entry: &Entry,
    app_name: &str,
    extensions: &[&CStr],
    layers: &[&CStr],
    validation: bool,
) -> Result<ash::Instance> {
    let app_name = CString::new(app_name)?;
    let engine_name = c"No Engine";

    let app_info = vk::ApplicationInfo::builder()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 1, 0, 0))
        .engine_name(engine_name)
        .engine_version(vk::make_api_version(0, 1, 0, 0))
        .api_version(vk::API_VERSION_1_0);

    let extension_ptrs: Vec<_> = extensions.iter().map(|name| name.as_ptr()).collect();
    let layer_ptrs: Vec<_> = layers.iter().map(|name| name.as_ptr()).collect();

    // Covers vkCreateInstance/vkDestroyInstance, which the messenger can't
    let mut instance_debug_info = debug::messenger_create_info();

    let mut create_info = vk::InstanceCreateInfo::builder()
        .application_info(&app_info)
        .enabled_extension_names(&extension_ptrs)
        .enabled_layer_names(&layer_ptrs);
    if validation {
        create_info = create_info.push_next(&mut instance_debug_info);
    }

    let instance = unsafe { entry.create_instance(&create_info, None) }
        .context("Failed to create Vulkan instance")?;

    Ok(instance)
}
