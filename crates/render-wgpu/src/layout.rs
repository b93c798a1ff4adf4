use cubefield_render::{BufferId, VertexAttribute};

/// One wgpu vertex buffer slot: every attribute sourced from the same
/// buffer with the same stride and step rate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamLayout {
    pub stride: u32,
    pub per_instance: bool,
    /// `(location, components, offset)` in location order.
    pub attributes: Vec<(u32, u32, u32)>,
}

impl StreamLayout {
    pub fn step_mode(&self) -> wgpu::VertexStepMode {
        if self.per_instance {
            wgpu::VertexStepMode::Instance
        } else {
            wgpu::VertexStepMode::Vertex
        }
    }

    pub fn wgpu_attributes(&self) -> Vec<wgpu::VertexAttribute> {
        self.attributes
            .iter()
            .map(|&(location, components, offset)| wgpu::VertexAttribute {
                format: vertex_format(components),
                offset: offset as u64,
                shader_location: location,
            })
            .collect()
    }
}

pub(crate) fn vertex_format(components: u32) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

/// Fold a vertex array's attribute table into vertex buffer slots, in order
/// of each buffer's lowest location.
pub fn group_streams(attributes: &[(VertexAttribute, BufferId)]) -> Vec<(BufferId, StreamLayout)> {
    let mut streams: Vec<(BufferId, StreamLayout)> = Vec::new();
    for (attribute, buffer) in attributes {
        let per_instance = attribute.divisor > 0;
        let lane = (attribute.location, attribute.components, attribute.offset);
        match streams.iter_mut().find(|(id, layout)| {
            id == buffer && layout.stride == attribute.stride && layout.per_instance == per_instance
        }) {
            Some((_, layout)) => layout.attributes.push(lane),
            None => streams.push((
                *buffer,
                StreamLayout {
                    stride: attribute.stride,
                    per_instance,
                    attributes: vec![lane],
                },
            )),
        }
    }
    streams
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubefield_render::instance_attribute_lanes;

    fn per_vertex(location: u32, components: u32, stride: u32) -> VertexAttribute {
        VertexAttribute {
            location,
            components,
            stride,
            offset: 0,
            divisor: 0,
        }
    }

    #[test]
    fn matrix_lanes_share_one_slot() {
        let mut table = vec![(per_vertex(0, 3, 12), BufferId(1))];
        table.extend(
            instance_attribute_lanes(1, 3, 12)
                .into_iter()
                .map(|lane| (lane, BufferId(2))),
        );
        table.extend(
            instance_attribute_lanes(2, 16, 64)
                .into_iter()
                .map(|lane| (lane, BufferId(3))),
        );

        let streams = group_streams(&table);
        assert_eq!(streams.len(), 3);
        assert_eq!(streams[0].0, BufferId(1));
        assert!(!streams[0].1.per_instance);

        let (buffer, transform) = &streams[2];
        assert_eq!(*buffer, BufferId(3));
        assert!(transform.per_instance);
        assert_eq!(transform.stride, 64);
        assert_eq!(
            transform.attributes,
            vec![(2, 4, 0), (3, 4, 16), (4, 4, 32), (5, 4, 48)]
        );
    }

    #[test]
    fn formats_follow_component_count() {
        let layout = StreamLayout {
            stride: 12,
            per_instance: true,
            attributes: vec![(1, 3, 0)],
        };
        let attributes = layout.wgpu_attributes();
        assert_eq!(attributes[0].format, wgpu::VertexFormat::Float32x3);
        assert_eq!(attributes[0].shader_location, 1);
        assert_eq!(layout.step_mode(), wgpu::VertexStepMode::Instance);
    }
}
