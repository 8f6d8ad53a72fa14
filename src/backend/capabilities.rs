// Capability checks - extensions, layers, versions
//
// The driver reports what it has; we compare that against what we need and
// fail with the full list of anything missing.

use anyhow::Result;
use ash::vk;
use std::ffi::CStr;

/// Required names that are not in the available list, in required order
pub fn missing_names<'a, S: AsRef<str>>(required: &[&'a str], available: &[S]) -> Vec<&'a str> {
    required
        .iter()
        .copied()
        .filter(|name| !available.iter().any(|a| a.as_ref() == *name))
        .collect()
}

/// Bail with every missing name if `required` is not a subset of `available`
pub fn ensure_available<S: AsRef<str>>(kind: &str, required: &[&str], available: &[S]) -> Result<()> {
    let missing = missing_names(required, available);
    if !missing.is_empty() {
        anyhow::bail!("Missing required {}: {:?}", kind, missing);
    }
    Ok(())
}

/// Render a packed Vulkan version as major.minor.patch
pub fn format_version(version: u32) -> String {
    format!(
        "{}.{}.{}",
        vk::api_version_major(version),
        vk::api_version_minor(version),
        vk::api_version_patch(version)
    )
}

/// Human-readable queue capabilities for diagnostics
pub fn queue_flag_names(flags: vk::QueueFlags) -> Vec<&'static str> {
    const NAMES: [(vk::QueueFlags, &str); 4] = [
        (vk::QueueFlags::GRAPHICS, "GRAPHICS"),
        (vk::QueueFlags::COMPUTE, "COMPUTE"),
        (vk::QueueFlags::TRANSFER, "TRANSFER"),
        (vk::QueueFlags::SPARSE_BINDING, "SPARSE_BINDING"),
    ];

    NAMES
        .iter()
        .filter(|(flag, _)| flags.contains(*flag))
        .map(|&(_, name)| name)
        .collect()
}

/// Extract the names from driver-reported extension properties
pub fn extension_names(properties: &[vk::ExtensionProperties]) -> Vec<String> {
    properties
        .iter()
        .map(|p| unsafe { CStr::from_ptr(p.extension_name.as_ptr()) }.to_string_lossy().into_owned())
        .collect()
}

/// Extract the names from driver-reported layer properties
pub fn layer_names(properties: &[vk::LayerProperties]) -> Vec<String> {
    properties
        .iter()
        .map(|p| unsafe { CStr::from_ptr(p.layer_name.as_ptr()) }.to_string_lossy().into_owned())
        .collect()
}

/// Log every extension with its spec version
pub fn log_extensions(label: &str, properties: &[vk::ExtensionProperties]) {
    log::info!("{} {} found:", properties.len(), label);
    for (name, props) in extension_names(properties).iter().zip(properties) {
        log::info!("\t{} v{}", name, props.spec_version);
    }
}

/// Log every layer with its spec and implementation versions
pub fn log_layers(properties: &[vk::LayerProperties]) {
    log::info!("{} layers found:", properties.len());
    for (name, props) in layer_names(properties).iter().zip(properties) {
        log::info!(
            "\t{} v{} (impl {})",
            name,
            format_version(props.spec_version),
            props.implementation_version
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_is_required_minus_available() {
        let required = ["VK_KHR_surface", "VK_KHR_xcb_surface", "VK_EXT_debug_utils"];
        let available = ["VK_KHR_surface", "VK_KHR_display"];

        assert_eq!(
            missing_names(&required, &available),
            vec!["VK_KHR_xcb_surface", "VK_EXT_debug_utils"]
        );
    }

    #[test]
    fn subset_reports_nothing() {
        let required = ["VK_KHR_surface", "VK_KHR_win32_surface"];
        let available = vec![
            "VK_KHR_win32_surface".to_string(),
            "VK_KHR_get_surface_capabilities2".to_string(),
            "VK_KHR_surface".to_string(),
        ];

        assert!(missing_names(&required, &available).is_empty());
        assert!(ensure_available("extensions", &required, &available).is_ok());
    }

    #[test]
    fn empty_required_is_always_satisfied() {
        let available: [&str; 0] = [];
        assert!(ensure_available("layers", &[], &available).is_ok());
    }

    #[test]
    fn error_lists_every_missing_name() {
        let err = ensure_available(
            "layers",
            &["VK_LAYER_KHRONOS_validation", "VK_LAYER_MESA_overlay"],
            &["VK_LAYER_MESA_overlay"],
        )
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("layers"));
        assert!(message.contains("VK_LAYER_KHRONOS_validation"));
        assert!(!message.contains("VK_LAYER_MESA_overlay"));
    }

    #[test]
    fn versions_are_dotted() {
        assert_eq!(format_version(vk::make_api_version(0, 1, 3, 275)), "1.3.275");
        assert_eq!(format_version(vk::API_VERSION_1_0), "1.0.0");
    }

    #[test]
    fn queue_flags_in_fixed_order() {
        let flags = vk::QueueFlags::TRANSFER | vk::QueueFlags::GRAPHICS;
        assert_eq!(queue_flag_names(flags), vec!["GRAPHICS", "TRANSFER"]);
        assert!(queue_flag_names(vk::QueueFlags::empty()).is_empty());
    }
}
