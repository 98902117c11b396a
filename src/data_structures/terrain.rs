//! Height-mapped terrain.

use crate::{
    data_structures::model::{Geometry, Model, ModelVertex, SurfaceMaterial},
    error::{Result, SceneError},
    gpu::Device,
};

/// Grid of heights sampled at integer `(x, z)` positions, row by row along z.
#[derive(Debug, Clone, PartialEq)]
pub struct Heightmap {
    width: u32,
    depth: u32,
    heights: Vec<f32>,
}

impl Heightmap {
    pub fn new(width: u32, depth: u32, heights: Vec<f32>) -> Result<Self> {
        if width < 2 || depth < 2 {
            return Err(SceneError::geometry(
                "heightmap",
                format!("needs at least 2x2 samples, got {width}x{depth}"),
            ));
        }
        if heights.len() != (width * depth) as usize {
            return Err(SceneError::geometry(
                "heightmap",
                format!("expected {} samples, got {}", width * depth, heights.len()),
            ));
        }
        Ok(Self {
            width,
            depth,
            heights,
        })
    }

    pub fn flat(width: u32, depth: u32, height: f32) -> Result<Self> {
        Self::new(width, depth, vec![height; (width * depth) as usize])
    }

    /// Heights from the luma channel, scaled by `scale`.
    pub fn from_luma(image: &image::GrayImage, scale: f32) -> Result<Self> {
        let (width, depth) = image.dimensions();
        let mut heights = Vec::with_capacity((width * depth) as usize);
        for z in 0..depth {
            for x in 0..width {
                heights.push(image.get_pixel(x, z).0[0] as f32 * scale);
            }
        }
        Self::new(width, depth, heights)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn at(&self, x: u32, z: u32) -> f32 {
        self.heights[(z * self.width + x) as usize]
    }

    /// Height at world `(x, z)` on a grid with `cell_space` between samples,
    /// interpolated on the triangle that contains the point. `None` outside.
    pub fn triangle_height(&self, cell_space: f32, x: f32, z: f32) -> Option<f32> {
        let gx = x / cell_space;
        let gz = z / cell_space;
        let max_x = (self.width - 1) as f32;
        let max_z = (self.depth - 1) as f32;
        if !(0.0..=max_x).contains(&gx) || !(0.0..=max_z).contains(&gz) {
            return None;
        }
        let col = (gx.floor() as u32).min(self.width - 2);
        let row = (gz.floor() as u32).min(self.depth - 2);
        let dx = gx - col as f32;
        let dz = gz - row as f32;

        let h00 = self.at(col, row);
        let h10 = self.at(col + 1, row);
        let h01 = self.at(col, row + 1);
        let h11 = self.at(col + 1, row + 1);

        // cells split along the (col+1, row)-(col, row+1) diagonal
        Some(if dx + dz <= 1.0 {
            h00 + dx * (h10 - h00) + dz * (h01 - h00)
        } else {
            h11 + (1.0 - dx) * (h01 - h11) + (1.0 - dz) * (h10 - h11)
        })
    }

    /// Grid mesh with smoothed normals and one texture repeat per cell.
    pub fn to_geometry(&self, cell_space: f32) -> Geometry {
        let (w, d) = (self.width, self.depth);
        let mut vertices = Vec::with_capacity((w * d) as usize);
        for z in 0..d {
            for x in 0..w {
                vertices.push(ModelVertex::new(
                    [x as f32 * cell_space, self.at(x, z), z as f32 * cell_space],
                    [x as f32, z as f32],
                    [0.0, 0.0, 0.0],
                ));
            }
        }

        let mut indices = Vec::with_capacity(((w - 1) * (d - 1) * 6) as usize);
        for z in 0..d - 1 {
            for x in 0..w - 1 {
                let v00 = z * w + x;
                let v10 = v00 + 1;
                let v01 = v00 + w;
                let v11 = v01 + 1;
                indices.extend_from_slice(&[v00, v01, v10, v10, v01, v11]);
            }
        }

        let mut geometry = Geometry::single(vertices, indices);
        geometry.materials = vec![SurfaceMaterial::terrain()];
        geometry.fill_missing_normals();
        geometry.compute_tangents();
        geometry
    }
}

/// The terrain model together with the heights it was built from.
pub struct Terrain<D: Device> {
    model: Model<D>,
    heightmap: Heightmap,
    cell_space: f32,
}

impl<D: Device> Terrain<D> {
    pub fn create(device: &D, heightmap: Heightmap, cell_space: f32) -> Result<Self> {
        if cell_space <= 0.0 {
            return Err(SceneError::geometry("terrain", "cell spacing must be positive"));
        }
        let geometry = heightmap.to_geometry(cell_space);
        let model = Model::from_geometry(device, "terrain", &geometry)?;
        log::info!(
            "Terrain built from a {}x{} heightmap",
            heightmap.width(),
            heightmap.depth()
        );
        Ok(Self {
            model,
            heightmap,
            cell_space,
        })
    }

    pub fn triangle_height(&self, x: f32, z: f32) -> Option<f32> {
        self.heightmap.triangle_height(self.cell_space, x, z)
    }

    pub fn model(&self) -> &Model<D> {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut Model<D> {
        &mut self.model
    }

    pub fn heightmap(&self) -> &Heightmap {
        &self.heightmap
    }

    pub fn cell_space(&self) -> f32 {
        self.cell_space
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slope() -> Heightmap {
        // height = x + 2z on a 3x3 grid
        let mut heights = Vec::new();
        for z in 0..3 {
            for x in 0..3 {
                heights.push(x as f32 + 2.0 * z as f32);
            }
        }
        Heightmap::new(3, 3, heights).unwrap()
    }

    #[test]
    fn flat_terrain_is_flat_inside_and_absent_outside() {
        let map = Heightmap::flat(4, 5, 7.5).unwrap();
        for (x, z) in [(0.0, 0.0), (1.3, 2.7), (5.9, 7.9), (6.0, 8.0)] {
            assert_eq!(map.triangle_height(2.0, x, z), Some(7.5));
        }
        for (x, z) in [(-0.1, 1.0), (1.0, -0.1), (6.1, 1.0), (1.0, 8.1)] {
            assert_eq!(map.triangle_height(2.0, x, z), None);
        }
    }

    #[test]
    fn planes_are_reproduced_exactly() {
        let map = slope();
        for (x, z) in [(0.25, 0.25), (0.75, 0.75), (1.5, 0.2), (2.0, 2.0), (0.9, 1.6)] {
            let h = map.triangle_height(1.0, x, z).unwrap();
            assert!((h - (x + 2.0 * z)).abs() < 1e-5, "({x}, {z}) -> {h}");
        }
    }

    #[test]
    fn grid_has_expected_counts_and_up_normals() {
        let map = Heightmap::flat(4, 3, 0.0).unwrap();
        let g = map.to_geometry(1.0);
        assert_eq!(g.vertices.len(), 12);
        assert_eq!(g.indices.len(), 3 * 2 * 6);
        assert!(g.materials[0].is_terrain);
        for v in &g.vertices {
            assert_eq!(v.normal, [0.0, 1.0, 0.0]);
        }
    }

    #[test]
    fn degenerate_heightmaps_are_rejected() {
        assert!(Heightmap::flat(1, 5, 0.0).is_err());
        assert!(Heightmap::new(2, 2, vec![0.0; 3]).is_err());
    }
}
