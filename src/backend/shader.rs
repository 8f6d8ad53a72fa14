// Shader module loading
//
// Vulkan consumes SPIR-V as 32-bit words. The compiled blob is read whole
// into memory, converted to words, and wrapped in a module that is
// destroyed as soon as the pipeline no longer needs it.

use anyhow::{Context, Result};
use ash::vk;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use super::Device;

/// Read an entire SPIR-V file and return its words
pub fn load_spirv(path: impl AsRef<Path>) -> Result<Vec<u32>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read shader {:?}", path))?;

    // Handles alignment and endianness, rejects lengths that aren't whole words
    ash::util::read_spv(&mut Cursor::new(bytes.as_slice()))
        .with_context(|| format!("Invalid SPIR-V in {:?}", path))
}

pub struct ShaderModule {
    pub module: vk::ShaderModule,
    device: Arc<Device>,
}

impl ShaderModule {
    pub fn new(device: Arc<Device>, code: &[u32]) -> Result<Self> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(code);

        let module = unsafe { device.device.create_shader_module(&create_info, None) }
            .context("Failed to create shader module")?;

        Ok(Self { module, device })
    }

    pub fn from_file(device: Arc<Device>, path: impl AsRef<Path>) -> Result<Self> {
        let code = load_spirv(path)?;
        Self::new(device, &code)
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_shader_module(self.module, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SPIRV_MAGIC: u32 = 0x0723_0203;

    fn temp_file(name: &str, bytes: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("hello-triangle-{}-{}", std::process::id(), name));
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn reads_whole_file_as_words() {
        let words = [SPIRV_MAGIC, 0x0001_0000, 0, 42, 7];
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        let path = temp_file("valid.spv", &bytes);

        let loaded = load_spirv(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded, words);
    }

    #[test]
    fn partial_word_is_rejected() {
        let mut bytes = SPIRV_MAGIC.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[1, 2, 3]);
        let path = temp_file("truncated.spv", &bytes);

        let result = load_spirv(&path);
        std::fs::remove_file(&path).unwrap();

        assert!(result.is_err());
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = load_spirv("no/such/shader.spv").unwrap_err();
        assert!(format!("{:#}", err).contains("shader.spv"));
    }
}
