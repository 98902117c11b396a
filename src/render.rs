//! Render composition and draw batching.
//!
//! Scene components describe what they draw with the [`Render`] enum. The
//! scene sorts those descriptions into a [`FramePlan`], one batch per pass,
//! and replays the batches in a fixed order every frame:
//!
//! 1. terrain
//! 2. opaque models
//! 3. skybox
//! 4. transparent models, back to front, with alpha blending enabled

use std::cmp::Ordering;

use cgmath::{EuclideanSpace, InnerSpace, Point3, Vector3};

use crate::{data_structures::model::Model, gpu::Device};

/// Specifies how a scene object should be rendered.
///
/// - `Terrain` renders with the default shader in the terrain batch
/// - `Default` renders an opaque model
/// - `Transparent` renders an alpha-blended model
/// - `Skybox` renders with the skybox shader
/// - `Composed` renders a composition of the above
pub enum Render<'a, D: Device> {
    Terrain(&'a Model<D>),
    Default(&'a Model<D>),
    Transparent(&'a Model<D>),
    Skybox(&'a Model<D>),
    Composed(Vec<Render<'a, D>>),
}

impl<'a, D: Device> Render<'a, D> {
    /// Appends this description to the matching batches of `plan`.
    pub fn set_pipelines(self, plan: &mut FramePlan<'a, D>) {
        match self {
            Render::Terrain(model) => plan.terrain.push(model),
            Render::Default(model) => plan.opaque.push(model),
            Render::Transparent(model) => plan.transparent.push(model),
            Render::Skybox(model) => plan.skybox.push(model),
            Render::Composed(renders) => renders
                .into_iter()
                .for_each(|render| render.set_pipelines(plan)),
        }
    }
}

impl<'a, D: Device> From<&'a Model<D>> for Render<'a, D> {
    fn from(model: &'a Model<D>) -> Self {
        if model.is_transparent() {
            Render::Transparent(model)
        } else {
            Render::Default(model)
        }
    }
}

/// One frame's draws, batched per pass.
pub struct FramePlan<'a, D: Device> {
    pub terrain: Vec<&'a Model<D>>,
    pub opaque: Vec<&'a Model<D>>,
    pub skybox: Vec<&'a Model<D>>,
    pub transparent: Vec<&'a Model<D>>,
}

impl<D: Device> Default for FramePlan<'_, D> {
    fn default() -> Self {
        Self {
            terrain: Vec::new(),
            opaque: Vec::new(),
            skybox: Vec::new(),
            transparent: Vec::new(),
        }
    }
}

impl<D: Device> FramePlan<'_, D> {
    /// Orders transparent models farthest from `eye` first.
    pub fn sort_transparent(&mut self, eye: Point3<f32>) {
        sort_back_to_front(&mut self.transparent, eye, |model| model.translation());
    }
}

pub fn sort_back_to_front<T, F>(items: &mut [T], eye: Point3<f32>, position: F)
where
    F: Fn(&T) -> Vector3<f32>,
{
    let eye = eye.to_vec();
    items.sort_by(|a, b| {
        let da = (position(a) - eye).magnitude2();
        let db = (position(b) - eye).magnitude2();
        db.partial_cmp(&da).unwrap_or(Ordering::Equal)
    });
}
