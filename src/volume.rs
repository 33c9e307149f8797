// src/volume.rs - Typed views over the flat network output volumes
//
// All stride arithmetic for both supported layouts lives in `VolumeShape`.
use crate::config::{GridConfig, VolumeLayout};
use crate::error::{PoseError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Voxel {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl Voxel {
    pub fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeShape {
    pub joints: usize,
    pub resolution: usize,
    pub layout: VolumeLayout,
}

impl VolumeShape {
    pub fn new(joints: usize, resolution: usize, layout: VolumeLayout) -> Self {
        Self {
            joints,
            resolution,
            layout,
        }
    }

    pub fn from_grid(grid: &GridConfig) -> Self {
        Self::new(grid.joint_count, grid.resolution, grid.layout)
    }

    pub fn heatmap_len(&self) -> usize {
        self.joints * self.resolution.pow(3)
    }

    pub fn offset_len(&self) -> usize {
        self.heatmap_len() * 3
    }

    pub fn heat_index(&self, joint: usize, v: Voxel) -> usize {
        let r = self.resolution;
        match self.layout {
            VolumeLayout::JointMajor => ((joint * r + v.z) * r + v.y) * r + v.x,
            VolumeLayout::ChannelsLast => ((v.y * r + v.x) * self.joints + joint) * r + v.z,
        }
    }

    pub fn offset_index(&self, joint: usize, axis: Axis, v: Voxel) -> usize {
        let r = self.resolution;
        let channel = axis as usize * self.joints + joint;
        match self.layout {
            VolumeLayout::JointMajor => ((channel * r + v.z) * r + v.y) * r + v.x,
            VolumeLayout::ChannelsLast => ((v.y * r + v.x) * 3 * self.joints + channel) * r + v.z,
        }
    }
}

/// Read-only `J x R^3` heat map.
#[derive(Debug, Clone, Copy)]
pub struct HeatmapView<'a> {
    shape: VolumeShape,
    data: &'a [f32],
}

impl<'a> HeatmapView<'a> {
    pub fn new(data: &'a [f32], shape: VolumeShape) -> Result<Self> {
        check_len("heat map", shape.heatmap_len(), data.len())?;
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> VolumeShape {
        self.shape
    }

    pub fn at(&self, joint: usize, voxel: Voxel) -> f32 {
        self.data[self.shape.heat_index(joint, voxel)]
    }
}

/// Read-only `J x R^3 x 3` sub-voxel offsets.
#[derive(Debug, Clone, Copy)]
pub struct OffsetView<'a> {
    shape: VolumeShape,
    data: &'a [f32],
}

impl<'a> OffsetView<'a> {
    pub fn new(data: &'a [f32], shape: VolumeShape) -> Result<Self> {
        check_len("offset", shape.offset_len(), data.len())?;
        Ok(Self { shape, data })
    }

    pub fn at(&self, joint: usize, axis: Axis, voxel: Voxel) -> f32 {
        self.data[self.shape.offset_index(joint, axis, voxel)]
    }

    pub fn triple(&self, joint: usize, voxel: Voxel) -> [f32; 3] {
        Axis::ALL.map(|axis| self.at(joint, axis, voxel))
    }
}

fn check_len(volume: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(PoseError::ShapeMismatch {
            volume,
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_voxels(r: usize) -> impl Iterator<Item = Voxel> {
        (0..r).flat_map(move |z| (0..r).flat_map(move |y| (0..r).map(move |x| Voxel::new(x, y, z))))
    }

    #[test]
    fn test_joint_major_is_x_fastest() {
        let shape = VolumeShape::new(2, 3, VolumeLayout::JointMajor);
        assert_eq!(shape.heat_index(0, Voxel::new(1, 0, 0)), 1);
        assert_eq!(shape.heat_index(0, Voxel::new(0, 1, 0)), 3);
        assert_eq!(shape.heat_index(0, Voxel::new(0, 0, 1)), 9);
        assert_eq!(shape.heat_index(1, Voxel::new(0, 0, 0)), 27);
        assert_eq!(shape.offset_index(1, Axis::Z, Voxel::new(0, 0, 0)), (2 * 2 + 1) * 27);
    }

    #[test]
    fn test_channels_last_matches_network_order() {
        let (j, r) = (2, 3);
        let shape = VolumeShape::new(j, r, VolumeLayout::ChannelsLast);
        let v = Voxel::new(2, 1, 0);
        assert_eq!(shape.heat_index(1, v), 1 * r * r * j + 2 * r * j + 1 * r);
        assert_eq!(
            shape.offset_index(1, Axis::Y, v),
            1 * r * r * 3 * j + 2 * r * 3 * j + (1 + j) * r
        );
    }

    #[test]
    fn test_indices_are_a_permutation() {
        for layout in [VolumeLayout::JointMajor, VolumeLayout::ChannelsLast] {
            let shape = VolumeShape::new(2, 3, layout);
            let mut seen = vec![false; shape.offset_len()];
            for joint in 0..2 {
                for axis in Axis::ALL {
                    for v in all_voxels(3) {
                        let i = shape.offset_index(joint, axis, v);
                        assert!(!seen[i], "{:?} index {} reused", layout, i);
                        seen[i] = true;
                    }
                }
            }
            assert!(seen.iter().all(|s| *s));
        }
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let shape = VolumeShape::new(2, 3, VolumeLayout::JointMajor);
        let data = vec![0.0; 53];
        match HeatmapView::new(&data, shape) {
            Err(PoseError::ShapeMismatch { expected, actual, .. }) => {
                assert_eq!(expected, 54);
                assert_eq!(actual, 53);
            }
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
        assert!(OffsetView::new(&vec![0.0; 54], shape).is_err());
        assert!(OffsetView::new(&vec![0.0; 162], shape).is_ok());
    }
}
