// src/decoder.rs - Heat map argmax and sub-voxel offset decoding
use crate::config::GridConfig;
use crate::error::Result;
use crate::volume::{HeatmapView, OffsetView, VolumeShape, Voxel};
use nalgebra::Vector3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedJoint {
    pub voxel: Voxel,
    pub position: Vector3<f32>,
    pub confidence: f32,
}

pub struct GridDecoder {
    shape: VolumeShape,
    scale: f32,
    half_image: f32,
    depth_bias: f32,
    flip_y: bool,
}

impl GridDecoder {
    pub fn new(grid: &GridConfig) -> Self {
        Self {
            shape: VolumeShape::from_grid(grid),
            scale: grid.voxel_scale(),
            half_image: grid.image_size as f32 / 2.0,
            depth_bias: grid.depth_bias,
            flip_y: grid.flip_y,
        }
    }

    pub fn shape(&self) -> VolumeShape {
        self.shape
    }

    /// Decodes every network joint. Fails only when the volume lengths do not
    /// match the configured `J` and `R`.
    pub fn decode(&self, heatmap: &[f32], offsets: &[f32]) -> Result<Vec<DecodedJoint>> {
        let heat = HeatmapView::new(heatmap, self.shape)?;
        let offsets = OffsetView::new(offsets, self.shape)?;

        Ok((0..self.shape.joints)
            .map(|joint| {
                let (voxel, confidence) = find_peak(&heat, joint);
                DecodedJoint {
                    voxel,
                    position: self.to_position(voxel, offsets.triple(joint, voxel)),
                    confidence,
                }
            })
            .collect())
    }

    fn to_position(&self, voxel: Voxel, offset: [f32; 3]) -> Vector3<f32> {
        let cell = |o: f32, index: usize| (o + 0.5 + index as f32) * self.scale;

        let x = cell(offset[0], voxel.x) - self.half_image;
        let y = if self.flip_y {
            self.half_image - cell(offset[1], voxel.y)
        } else {
            cell(offset[1], voxel.y) - self.half_image
        };
        let z = (offset[2] + 0.5 + voxel.z as f32 - self.depth_bias) * self.scale;
        Vector3::new(x, y, z)
    }
}

/// Exhaustive scan, z outer, y middle, x inner. Only a strictly greater value
/// replaces the current peak, so ties keep the first voxel visited. The
/// running peak starts at zero.
pub fn find_peak(heat: &HeatmapView<'_>, joint: usize) -> (Voxel, f32) {
    let r = heat.shape().resolution;
    let mut best = Voxel::default();
    let mut score = 0.0f32;

    for z in 0..r {
        for y in 0..r {
            for x in 0..r {
                let voxel = Voxel::new(x, y, z);
                let v = heat.at(joint, voxel);
                if v > score {
                    score = v;
                    best = voxel;
                }
            }
        }
    }
    (best, score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VolumeLayout;
    use crate::error::PoseError;
    use crate::volume::Axis;

    fn grid(
        resolution: usize,
        joints: usize,
        image_size: usize,
        layout: VolumeLayout,
    ) -> GridConfig {
        GridConfig {
            resolution,
            joint_count: joints,
            image_size,
            depth_bias: resolution as f32 / 2.0,
            flip_y: false,
            layout,
        }
    }

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_peak_and_offset_decode() {
        for layout in [VolumeLayout::JointMajor, VolumeLayout::ChannelsLast] {
            let g = grid(4, 2, 8, layout);
            let shape = VolumeShape::from_grid(&g);
            let mut heat = vec![0.0; shape.heatmap_len()];
            let mut offsets = vec![0.0; shape.offset_len()];

            let peak = Voxel::new(3, 1, 2);
            heat[shape.heat_index(1, peak)] = 0.8;
            heat[shape.heat_index(1, Voxel::new(0, 0, 0))] = 0.3;
            offsets[shape.offset_index(1, Axis::X, peak)] = 0.25;
            offsets[shape.offset_index(1, Axis::Y, peak)] = -0.5;
            offsets[shape.offset_index(1, Axis::Z, peak)] = 0.1;

            let decoded = GridDecoder::new(&g).decode(&heat, &offsets).unwrap();
            let joint = decoded[1];
            assert_eq!(joint.voxel, peak);
            assert!(approx_eq(joint.confidence, 0.8));
            // scale = 2, half image = 4, depth bias = 2
            assert!(approx_eq(joint.position.x, (0.25 + 0.5 + 3.0) * 2.0 - 4.0));
            assert!(approx_eq(joint.position.y, (-0.5 + 0.5 + 1.0) * 2.0 - 4.0));
            assert!(approx_eq(joint.position.z, (0.1 + 0.5 + 2.0 - 2.0) * 2.0));
        }
    }

    #[test]
    fn test_ties_keep_first_in_scan_order() {
        let g = grid(3, 1, 6, VolumeLayout::JointMajor);
        let shape = VolumeShape::from_grid(&g);
        let mut heat = vec![0.0; shape.heatmap_len()];
        // (2,0,1) precedes (0,1,1) and (0,0,2) because z is outermost
        heat[shape.heat_index(0, Voxel::new(0, 0, 2))] = 0.5;
        heat[shape.heat_index(0, Voxel::new(0, 1, 1))] = 0.5;
        heat[shape.heat_index(0, Voxel::new(2, 0, 1))] = 0.5;

        let view = HeatmapView::new(&heat, shape).unwrap();
        assert_eq!(find_peak(&view, 0), (Voxel::new(2, 0, 1), 0.5));
    }

    #[test]
    fn test_indices_stay_in_range() {
        let g = grid(5, 3, 10, VolumeLayout::ChannelsLast);
        let shape = VolumeShape::from_grid(&g);
        let heat: Vec<f32> = (0..shape.heatmap_len())
            .map(|i| ((i * 7919) % 101) as f32 / 100.0)
            .collect();
        let offsets = vec![0.0; shape.offset_len()];
        for joint in GridDecoder::new(&g).decode(&heat, &offsets).unwrap() {
            assert!(joint.voxel.x < 5 && joint.voxel.y < 5 && joint.voxel.z < 5);
            assert!(joint.confidence >= 0.0);
        }
    }

    #[test]
    fn test_non_positive_volume_yields_origin_voxel() {
        let g = grid(2, 1, 4, VolumeLayout::JointMajor);
        let heat = vec![-1.0; 8];
        let offsets = vec![0.0; 24];
        let decoded = GridDecoder::new(&g).decode(&heat, &offsets).unwrap();
        assert_eq!(decoded[0].voxel, Voxel::default());
        assert_eq!(decoded[0].confidence, 0.0);
    }

    #[test]
    fn test_flip_y() {
        let mut g = grid(2, 1, 4, VolumeLayout::JointMajor);
        g.flip_y = true;
        let mut heat = vec![0.0; 8];
        heat[VolumeShape::from_grid(&g).heat_index(0, Voxel::new(0, 1, 0))] = 1.0;
        let decoded = GridDecoder::new(&g).decode(&heat, &vec![0.0; 24]).unwrap();
        // scale 2: 2 - (0.5 + 1) * 2
        assert!(approx_eq(decoded[0].position.y, -1.0));
    }

    #[test]
    fn test_shape_mismatch() {
        let g = grid(2, 1, 4, VolumeLayout::JointMajor);
        let decoder = GridDecoder::new(&g);
        assert!(matches!(
            decoder.decode(&vec![0.0; 7], &vec![0.0; 24]),
            Err(PoseError::ShapeMismatch { volume: "heat map", .. })
        ));
        assert!(matches!(
            decoder.decode(&vec![0.0; 8], &vec![0.0; 8]),
            Err(PoseError::ShapeMismatch { volume: "offset", .. })
        ));
    }
}
