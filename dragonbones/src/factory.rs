use crate::{
    Armature, ArmatureData, ArmatureDisplayData, Bone, DisplayKind, DragonBonesData, Error,
    FactoryConfig, IkConstraint, ObjectPool, Slot,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Runtime context: the loaded data bundles and the object pool armatures are built from.
#[derive(Debug)]
pub struct Factory {
    config: FactoryConfig,
    pool: ObjectPool,
    data: HashMap<String, Arc<DragonBonesData>>,
}

impl Default for Factory {
    fn default() -> Self {
        Self::new(FactoryConfig::default())
    }
}

impl Factory {
    pub fn new(config: FactoryConfig) -> Self {
        let mut pool = ObjectPool::new(config.default_pool_max_count);
        if let Some(max) = config.bone_pool_max_count {
            pool.set_max_count::<Bone>(max);
        }
        if let Some(max) = config.slot_pool_max_count {
            pool.set_max_count::<Slot>(max);
        }
        if let Some(max) = config.constraint_pool_max_count {
            pool.set_max_count::<IkConstraint>(max);
        }
        Self {
            config,
            pool,
            data: HashMap::new(),
        }
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    pub fn pool(&self) -> &ObjectPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut ObjectPool {
        &mut self.pool
    }

    /// Registers `data` under `name`, or under its own name. A bundle already registered under
    /// that name is replaced; armatures built from it keep their data alive.
    pub fn add_dragonbones_data(
        &mut self,
        data: DragonBonesData,
        name: Option<&str>,
    ) -> Arc<DragonBonesData> {
        let name = name.unwrap_or(&data.name).to_string();
        let data = Arc::new(data);
        if self.data.insert(name.clone(), Arc::clone(&data)).is_some() {
            log::warn!("replaced DragonBones data '{name}'");
        }
        data
    }

    pub fn remove_dragonbones_data(&mut self, name: &str) -> Option<Arc<DragonBonesData>> {
        self.data.remove(name)
    }

    pub fn dragonbones_data(&self, name: &str) -> Option<&Arc<DragonBonesData>> {
        self.data.get(name)
    }

    pub fn armature_data(&self, name: &str, bundle: Option<&str>) -> Option<&Arc<ArmatureData>> {
        self.find_armature(name, bundle).ok().map(|(_, data)| data)
    }

    /// Drops every registered bundle and empties the pool.
    pub fn clear(&mut self) {
        self.data.clear();
        self.pool.clear_all();
    }

    /// Builds a ready-to-play armature, nested armatures included.
    ///
    /// With `bundle` set, only that bundle is searched unless the factory auto-searches. An
    /// unknown `skin` falls back to the default skin.
    pub fn build_armature(
        &mut self,
        armature: &str,
        bundle: Option<&str>,
        skin: Option<&str>,
        texture_atlas: Option<&str>,
    ) -> Result<Armature, Error> {
        let (bundle, data) = self
            .find_armature(armature, bundle)
            .map(|(bundle, data)| (bundle.to_string(), Arc::clone(data)))
            .inspect_err(|err| log::warn!("cannot build armature: {err}"))?;
        let mut stack = Vec::new();
        let mut armature = self.build_with(&bundle, data, skin, texture_atlas, &mut stack);
        armature.advance_time(0.0);
        Ok(armature)
    }

    /// Returns the armature's bones, slots and constraints to the pool.
    pub fn dispose_armature(&mut self, armature: Armature) {
        armature.dispose(&mut self.pool);
    }

    /// Switches `armature` to `skin` (or the default skin) and builds the nested armatures the
    /// new displays reference.
    pub fn replace_skin(
        &mut self,
        armature: &mut Armature,
        skin: Option<&str>,
    ) -> Result<(), Error> {
        for previous in armature.swap_skin(skin)? {
            previous.dispose(&mut self.pool);
        }
        let bundle = self
            .data
            .iter()
            .find(|(_, d)| d.armatures().iter().any(|a| Arc::ptr_eq(a, armature.data())))
            .map(|(name, _)| name.clone());
        let Some(bundle) = bundle else {
            log::warn!(
                "armature '{}' does not belong to a registered bundle; nested armatures left empty",
                armature.name()
            );
            return Ok(());
        };
        let texture_atlas = armature.texture_atlas_name().map(str::to_string);
        let mut stack = vec![armature.name().to_string()];
        self.build_children(&bundle, armature, texture_atlas.as_deref(), &mut stack);
        Ok(())
    }

    fn find_armature(
        &self,
        name: &str,
        bundle: Option<&str>,
    ) -> Result<(&str, &Arc<ArmatureData>), Error> {
        if let Some(bundle) = bundle {
            match self.data.get_key_value(bundle) {
                Some((key, data)) => {
                    if let Some(armature) = data.armature(name) {
                        return Ok((key, armature));
                    }
                }
                None if !self.config.auto_search => {
                    return Err(Error::UnknownDragonBonesData {
                        name: bundle.to_string(),
                    });
                }
                None => {}
            }
            if !self.config.auto_search {
                return Err(Error::UnknownArmature {
                    name: name.to_string(),
                });
            }
        }

        let mut bundles: Vec<(&String, &Arc<DragonBonesData>)> = self.data.iter().collect();
        bundles.sort_by(|a, b| a.0.cmp(b.0));
        bundles
            .into_iter()
            .find_map(|(key, data)| Some((key.as_str(), data.armature(name)?)))
            .ok_or_else(|| Error::UnknownArmature {
                name: name.to_string(),
            })
    }

    fn build_with(
        &mut self,
        bundle: &str,
        data: Arc<ArmatureData>,
        skin: Option<&str>,
        texture_atlas: Option<&str>,
        stack: &mut Vec<String>,
    ) -> Armature {
        let skin = match skin {
            Some(name) if data.skin(name).is_some() => Some(name.to_string()),
            Some(name) => {
                log::warn!(
                    "armature '{}' has no skin '{name}'; using the default skin",
                    data.name
                );
                data.default_skin().map(|s| s.name.clone())
            }
            None => data.default_skin().map(|s| s.name.clone()),
        };

        stack.push(data.name.clone());
        let mut armature =
            Armature::with_pool(data, skin.as_deref(), texture_atlas, &mut self.pool);
        self.build_children(bundle, &mut armature, texture_atlas, stack);
        stack.pop();
        armature
    }

    /// Builds a child armature for every armature display of `armature` that lacks one.
    fn build_children(
        &mut self,
        bundle: &str,
        armature: &mut Armature,
        texture_atlas: Option<&str>,
        stack: &mut Vec<String>,
    ) {
        for slot_index in 0..armature.slots().len() {
            let requests: Vec<(usize, ArmatureDisplayData)> = armature.slots()[slot_index]
                .displays()
                .iter()
                .enumerate()
                .filter(|(_, display)| display.armature().is_none())
                .filter_map(|(index, display)| match &display.data.as_ref()?.kind {
                    DisplayKind::Armature(nested) => Some((index, nested.clone())),
                    _ => None,
                })
                .collect();

            for (display_index, nested) in requests {
                if stack.contains(&nested.armature) {
                    log::warn!(
                        "armature '{}' would nest itself through slot '{}'; display left empty",
                        nested.armature,
                        armature.slots()[slot_index].name()
                    );
                    continue;
                }
                let child_data = match self.find_armature(&nested.armature, Some(bundle)) {
                    Ok((_, data)) => Arc::clone(data),
                    Err(err) => {
                        log::warn!("cannot build nested armature: {err}");
                        continue;
                    }
                };

                let mut child = self.build_with(bundle, child_data, None, texture_atlas, stack);
                child.inherit_animation = nested.inherit_animation;
                if let Err(err) = child
                    .animation_mut()
                    .play(nested.animation.as_deref(), None)
                {
                    log::debug!("nested armature '{}' plays nothing: {err}", child.name());
                }
                if !child.inherit_animation {
                    child.advance_time(0.0);
                }
                if let Some(slot) = armature.slot_at_mut(slot_index) {
                    slot.set_display_armature(display_index, Some(Box::new(child)));
                }
            }
        }
    }
}
