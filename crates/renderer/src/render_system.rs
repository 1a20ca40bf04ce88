//! Entity -> renderable registry and the per-frame draw over it.

use std::{
    cell::RefCell,
    path::{Path, PathBuf},
    rc::Rc,
};

use corelib::camera::Camera;
use corelib::config::EngineConfig;
use corelib::ecs::{ComponentMap, Entity, World};

use crate::error::RenderError;
use crate::gpu::GpuDevice;
use crate::mesh_renderer::{MeshRenderer, RenderSettings};

pub type SharedRenderer = Rc<RefCell<MeshRenderer>>;

pub struct RenderSystem {
    renderables: ComponentMap<SharedRenderer>,
    images_dir: PathBuf,
    settings: RenderSettings,
}

impl RenderSystem {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            renderables: ComponentMap::new(),
            images_dir: config.images_dir.clone(),
            settings: RenderSettings::from_config(config),
        }
    }

    /// Load a model and install it under `entity`. A renderable already
    /// registered there is released and replaced. If loading fails, or the
    /// current renderable is borrowed, nothing changes.
    pub fn add_new_renderable(
        &mut self,
        device: &mut dyn GpuDevice,
        entity: Entity,
        obj_path: &Path,
        mtl_path: &Path,
    ) -> Result<(), RenderError> {
        self.ensure_releasable(entity)?;
        let renderer = MeshRenderer::load(entity, obj_path, mtl_path, &self.images_dir, device)
            .inspect_err(|e| {
                log::error!("Entity {}: load of {} failed: {}", entity, obj_path.display(), e)
            })?;

        let renderer = Rc::new(RefCell::new(renderer));
        if let Some(previous) = self.renderables.insert(entity, renderer) {
            log::warn!("Entity {} already had a renderable; replacing it", entity);
            release_shared(device, entity, &previous)?;
        }
        Ok(())
    }

    /// Release and unregister the renderable of `entity`. Returns whether
    /// one was registered. A renderable borrowed elsewhere stays registered
    /// and untouched, and the call fails with [`RenderError::RenderableInUse`].
    pub fn remove_renderable(
        &mut self,
        device: &mut dyn GpuDevice,
        entity: Entity,
    ) -> Result<bool, RenderError> {
        self.ensure_releasable(entity)?;
        match self.renderables.remove(entity) {
            Some(renderer) => {
                release_shared(device, entity, &renderer)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn ensure_releasable(&self, entity: Entity) -> Result<(), RenderError> {
        match self.renderables.get(entity) {
            Some(renderer) if renderer.try_borrow_mut().is_err() => {
                log::error!("Entity {}: renderable is borrowed, not releasing it", entity);
                Err(RenderError::RenderableInUse { entity })
            }
            _ => Ok(()),
        }
    }

    pub fn renderable(&self, entity: Entity) -> Option<SharedRenderer> {
        self.renderables.get(entity).cloned()
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.renderables.contains(entity)
    }

    pub fn len(&self) -> usize {
        self.renderables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderables.is_empty()
    }

    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.renderables.entities()
    }

    /// Draw every renderable with its entity's transform (identity when the
    /// entity has none). A failing renderable is logged and skipped. Returns
    /// how many drew.
    pub fn render_all(&self, device: &mut dyn GpuDevice, world: &World, camera: &Camera) -> usize {
        let mut drawn = 0;
        for (entity, renderer) in self.renderables.iter() {
            let Ok(mut renderer) = renderer.try_borrow_mut() else {
                log::error!("Entity {}: renderable is borrowed elsewhere, skipped", entity);
                continue;
            };
            match renderer.render(device, camera, world.model_matrix(entity), &self.settings) {
                Ok(()) => drawn += 1,
                Err(e) => log::error!("Entity {}: draw failed: {}", entity, e),
            }
        }
        drawn
    }

    /// Release every renderable. Used at shutdown. Renderables borrowed
    /// elsewhere are kept registered; returns how many were kept.
    pub fn clear(&mut self, device: &mut dyn GpuDevice) -> usize {
        let entities: Vec<Entity> = self.renderables.entities().collect();
        let mut kept = 0;
        for entity in entities {
            match self.remove_renderable(device, entity) {
                Ok(_) => {}
                Err(RenderError::RenderableInUse { .. }) => kept += 1,
                Err(e) => log::error!("Entity {}: release failed: {}", entity, e),
            }
        }
        kept
    }
}

fn release_shared(
    device: &mut dyn GpuDevice,
    entity: Entity,
    renderer: &SharedRenderer,
) -> Result<(), RenderError> {
    let mut renderer = renderer
        .try_borrow_mut()
        .map_err(|_| RenderError::RenderableInUse { entity })?;
    Ok(renderer.release(device)?)
}
