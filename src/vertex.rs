// Vertex layout for the triangle
//
// The GPU reads vertices by byte offset, so the struct layout and the
// attribute descriptions below must agree. Both are derived from the same
// field offsets.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use std::mem::{offset_of, size_of};

/// Interleaved position + color, 20 bytes, no padding
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: Vec2,
    pub color: Vec3,
}

/// Clockwise in Vulkan clip space (y points down)
pub const TRIANGLE: [Vertex; 3] = [
    Vertex::new(Vec2::new(0.0, -0.5), Vec3::new(1.0, 0.0, 0.0)),
    Vertex::new(Vec2::new(0.5, 0.5), Vec3::new(0.0, 1.0, 0.0)),
    Vertex::new(Vec2::new(-0.5, 0.5), Vec3::new(0.0, 0.0, 1.0)),
];

impl Vertex {
    pub const fn new(pos: Vec2, color: Vec3) -> Self {
        Self { pos, color }
    }

    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription::builder()
            .binding(0)
            .stride(size_of::<Self>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
            .build()
    }

    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
        // Position (location 0)
        let pos = vk::VertexInputAttributeDescription::builder()
            .binding(0)
            .location(0)
            .format(vk::Format::R32G32_SFLOAT)
            .offset(offset_of!(Self, pos) as u32)
            .build();

        // Color (location 1)
        let color = vk::VertexInputAttributeDescription::builder()
            .binding(0)
            .location(1)
            .format(vk::Format::R32G32B32_SFLOAT)
            .offset(offset_of!(Self, color) as u32)
            .build();

        [pos, color]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floats_at(bytes: &[u8], offset: usize, count: usize) -> Vec<f32> {
        bytes[offset..offset + count * 4]
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    #[test]
    fn record_is_five_packed_floats() {
        assert_eq!(size_of::<Vertex>(), 5 * size_of::<f32>());
        assert_eq!(Vertex::binding_description().stride, 20);
    }

    #[test]
    fn position_then_color_in_raw_bytes() {
        let vertex = Vertex::new(Vec2::new(0.25, -0.75), Vec3::new(0.1, 0.2, 0.3));
        let bytes = bytemuck::bytes_of(&vertex);

        assert_eq!(floats_at(bytes, 0, 2), vec![0.25, -0.75]);
        assert_eq!(floats_at(bytes, 8, 3), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn attribute_offsets_match_layout() {
        let [pos, color] = Vertex::attribute_descriptions();

        assert_eq!(pos.offset, 0);
        assert_eq!(pos.location, 0);
        assert_eq!(pos.format, vk::Format::R32G32_SFLOAT);

        // Color starts right after the two position floats
        assert_eq!(color.offset, 2 * size_of::<f32>() as u32);
        assert_eq!(color.location, 1);
        assert_eq!(color.format, vk::Format::R32G32B32_SFLOAT);

        let binding = Vertex::binding_description();
        assert_eq!(binding.binding, pos.binding);
        assert_eq!(binding.binding, color.binding);
    }

    #[test]
    fn every_triangle_vertex_round_trips_through_offsets() {
        let [pos_attr, color_attr] = Vertex::attribute_descriptions();
        let bytes: &[u8] = bytemuck::cast_slice(&TRIANGLE);
        let stride = Vertex::binding_description().stride as usize;

        for (i, vertex) in TRIANGLE.iter().enumerate() {
            let base = i * stride;
            assert_eq!(
                floats_at(bytes, base + pos_attr.offset as usize, 2),
                vertex.pos.to_array().to_vec()
            );
            assert_eq!(
                floats_at(bytes, base + color_attr.offset as usize, 3),
                vertex.color.to_array().to_vec()
            );
        }
    }
}
