use crate::{
    AnimationData, ArmatureData, Bone, BoneData, BoneFrame, DisplayData, DisplayKind,
    DragonBonesData, Error, Factory, FactoryConfig, IkConstraint, SkinData, Slot, SlotData,
    Transform, Tween,
};

fn at(x: f32, y: f32) -> Transform {
    Transform {
        x,
        y,
        ..Transform::IDENTITY
    }
}

/// Bundle "stable":
/// - `horse`: one bone, looping `gallop` as its default animation
/// - `rider`: `root (3, 4) -> seat (1, 0)`, slot `mount` showing `horse`, plus a `walking`
///   skin that shows a plain image instead
/// - `mirror`: shows itself through slot `glass`
fn stable() -> DragonBonesData {
    let mut data = DragonBonesData::new("stable", 24);

    let mut horse = ArmatureData::new("horse");
    let body = horse.add_bone(BoneData::new("body"));
    let mut gallop = AnimationData::new("gallop", 1.0);
    gallop.play_times = 0;
    let timeline = gallop
        .timeline::<BoneFrame>()
        .with_frame(0.0, at(0.0, 0.0), Tween::Linear)
        .with_frame(0.5, at(0.0, 2.0), Tween::Linear);
    gallop.add_bone_timeline(body, timeline);
    horse.add_animation(gallop);
    data.add_armature(horse).unwrap();

    let mut rider = ArmatureData::new("rider");
    let root = rider.add_bone(BoneData::new("root").with_transform(at(3.0, 4.0)));
    let seat = rider.add_bone(BoneData::new("seat").with_parent(root).with_transform(at(1.0, 0.0)));
    rider.add_slot(SlotData::new("mount", seat));
    let mut default = SkinData::new("default");
    default.add_display("mount", Some(DisplayData::armature("horse_display", "horse")));
    rider.add_skin(default);
    let mut walking = SkinData::new("walking");
    walking.add_display("mount", Some(DisplayData::image("boots")));
    rider.add_skin(walking);
    data.add_armature(rider).unwrap();

    let mut mirror = ArmatureData::new("mirror");
    let root = mirror.add_bone(BoneData::new("root"));
    mirror.add_slot(SlotData::new("glass", root));
    let mut skin = SkinData::new("default");
    skin.add_display("glass", Some(DisplayData::armature("reflection", "mirror")));
    mirror.add_skin(skin);
    data.add_armature(mirror).unwrap();

    data
}

fn single(name: &str) -> DragonBonesData {
    let mut data = DragonBonesData::new(name, 30);
    let mut armature = ArmatureData::new("lamp");
    armature.add_bone(BoneData::new("root"));
    data.add_armature(armature).unwrap();
    data
}

#[test]
fn built_armatures_are_posed() {
    let mut factory = Factory::default();
    factory.add_dragonbones_data(stable(), None);

    let rider = factory.build_armature("rider", None, None, None).unwrap();
    let seat = rider.bone("seat").unwrap();
    assert_eq!((seat.global().x, seat.global().y), (4.0, 4.0));
    assert_eq!(rider.slot("mount").unwrap().global_transform_matrix().tx, 4.0);
    assert_eq!(rider.skin_name(), Some("default"));
    assert_eq!(rider.texture_atlas_name(), None);
}

#[test]
fn unknown_names_are_errors() {
    let mut factory = Factory::default();
    factory.add_dragonbones_data(stable(), None);

    let err = factory.build_armature("dragon", None, None, None).unwrap_err();
    assert!(matches!(err, Error::UnknownArmature { ref name } if name == "dragon"));

    let err = factory
        .build_armature("rider", Some("barn"), None, None)
        .unwrap_err();
    assert!(matches!(err, Error::UnknownDragonBonesData { ref name } if name == "barn"));
}

#[test]
fn bundles_are_only_searched_on_request() {
    let mut factory = Factory::default();
    factory.add_dragonbones_data(stable(), None);
    factory.add_dragonbones_data(single("house"), None);

    assert!(factory.build_armature("lamp", Some("house"), None, None).is_ok());
    assert!(matches!(
        factory.build_armature("lamp", Some("stable"), None, None),
        Err(Error::UnknownArmature { .. })
    ));
    // Without a bundle every one is searched.
    assert!(factory.build_armature("lamp", None, None, None).is_ok());

    let mut factory = Factory::new(FactoryConfig {
        auto_search: true,
        ..Default::default()
    });
    factory.add_dragonbones_data(stable(), None);
    factory.add_dragonbones_data(single("house"), None);
    assert!(factory.build_armature("lamp", Some("stable"), None, None).is_ok());
    assert!(factory.build_armature("lamp", Some("barn"), None, None).is_ok());
    assert!(factory.armature_data("lamp", Some("stable")).is_some());
}

#[test]
fn bundles_register_under_an_alias() {
    let mut factory = Factory::default();
    factory.add_dragonbones_data(single("house"), Some("home"));
    assert!(factory.dragonbones_data("home").is_some());
    assert!(factory.dragonbones_data("house").is_none());
    assert!(factory.armature_data("lamp", Some("home")).is_some());

    let removed = factory.remove_dragonbones_data("home").unwrap();
    assert_eq!(removed.name, "house");
    assert!(factory.armature_data("lamp", None).is_none());

    factory.add_dragonbones_data(single("house"), None);
    factory.clear();
    assert!(factory.dragonbones_data("house").is_none());
}

#[test]
fn unknown_skin_falls_back_to_the_default() {
    let mut factory = Factory::default();
    factory.add_dragonbones_data(stable(), None);
    let rider = factory
        .build_armature("rider", None, Some("winter"), Some("atlas"))
        .unwrap();
    assert_eq!(rider.skin_name(), Some("default"));
    assert_eq!(rider.texture_atlas_name(), Some("atlas"));

    let rider = factory
        .build_armature("rider", None, Some("walking"), None)
        .unwrap();
    assert_eq!(rider.skin_name(), Some("walking"));
    assert!(rider.slot("mount").unwrap().child_armature().is_none());
}

#[test]
fn nested_armatures_are_built_and_play() {
    let mut factory = Factory::default();
    factory.add_dragonbones_data(stable(), None);
    let mut rider = factory.build_armature("rider", None, None, None).unwrap();

    let horse = rider.slot("mount").unwrap().child_armature().unwrap();
    assert_eq!(horse.name(), "horse");
    assert!(horse.inherit_animation);
    assert_eq!(horse.animation().last_animation_name(), Some("gallop"));
    assert!(horse.animation().is_playing());
    assert_eq!(rider.child_armatures().count(), 1);

    rider.advance_time(0.25);
    let horse = rider.slot("mount").unwrap().child_armature().unwrap();
    let state = horse.animation().state("gallop").unwrap();
    assert!((state.current_time() - 0.25).abs() < 1.0e-6);
    assert!((horse.bone("body").unwrap().global().y - 1.0).abs() < 1.0e-5);
}

#[test]
fn nested_armature_display_can_name_its_animation() {
    let mut data = stable();
    let mut cart = ArmatureData::new("cart");
    let root = cart.add_bone(BoneData::new("root"));
    cart.add_slot(SlotData::new("puller", root));
    let mut display = DisplayData::armature("puller_display", "horse");
    if let DisplayKind::Armature(nested) = &mut display.kind {
        nested.animation = Some("trot".to_string());
        nested.inherit_animation = false;
    }
    let mut skin = SkinData::new("default");
    skin.add_display("puller", Some(display));
    cart.add_skin(skin);
    data.add_armature(cart).unwrap();

    let mut factory = Factory::default();
    factory.add_dragonbones_data(data, None);
    let mut cart = factory.build_armature("cart", None, None, None).unwrap();

    // "trot" does not exist: the horse is built but idle, and runs on its own clock.
    let horse = cart.slot("puller").unwrap().child_armature().unwrap();
    assert!(!horse.inherit_animation);
    assert_eq!(horse.animation().state_count(), 0);

    cart.advance_time(0.25);
    let horse = cart.slot_mut("puller").unwrap().child_armature_mut().unwrap();
    horse.animation_mut().play(None, None).unwrap();
    cart.advance_time(0.25);
    let horse = cart.slot("puller").unwrap().child_armature().unwrap();
    assert_eq!(horse.animation().state("gallop").unwrap().current_time(), 0.0);
}

#[test]
fn self_nesting_is_refused() {
    let mut factory = Factory::default();
    factory.add_dragonbones_data(stable(), None);
    let mirror = factory.build_armature("mirror", None, None, None).unwrap();
    let glass = mirror.slot("glass").unwrap();
    assert_eq!(glass.display().map(|d| d.name.as_str()), Some("reflection"));
    assert!(glass.child_armature().is_none());
}

#[test]
fn disposed_armatures_refill_the_pool() {
    let mut factory = Factory::default();
    factory.add_dragonbones_data(stable(), None);
    let rider = factory.build_armature("rider", None, None, None).unwrap();
    assert_eq!(factory.pool().total_len(), 0);

    factory.dispose_armature(rider);
    // Two rider bones and the horse's one.
    assert_eq!(factory.pool().len::<Bone>(), 3);
    assert_eq!(factory.pool().len::<Slot>(), 1);
    assert_eq!(factory.pool().len::<IkConstraint>(), 0);

    let rider = factory.build_armature("rider", None, None, None).unwrap();
    assert_eq!(factory.pool().len::<Bone>(), 0);
    assert_eq!(rider.bone("seat").unwrap().global().x, 4.0);
}

#[test]
fn pool_limits_come_from_the_config() {
    let mut factory = Factory::new(FactoryConfig {
        bone_pool_max_count: Some(1),
        ..Default::default()
    });
    assert_eq!(factory.pool().max_count::<Bone>(), 1);
    factory.add_dragonbones_data(stable(), None);
    let rider = factory.build_armature("rider", None, None, None).unwrap();
    factory.dispose_armature(rider);
    assert_eq!(factory.pool().len::<Bone>(), 1);
    assert_eq!(factory.pool().len::<Slot>(), 1);
}

#[test]
fn replace_skin_rebuilds_nested_armatures() {
    let mut factory = Factory::default();
    factory.add_dragonbones_data(stable(), None);
    let mut rider = factory
        .build_armature("rider", None, Some("walking"), None)
        .unwrap();
    assert!(rider.slot("mount").unwrap().child_armature().is_none());

    factory.replace_skin(&mut rider, None).unwrap();
    assert_eq!(rider.skin_name(), Some("default"));
    let horse = rider.slot("mount").unwrap().child_armature().unwrap();
    assert_eq!(horse.name(), "horse");

    factory.replace_skin(&mut rider, Some("walking")).unwrap();
    assert!(rider.slot("mount").unwrap().child_armature().is_none());
    // The dropped horse went back to the pool.
    assert_eq!(factory.pool().len::<Bone>(), 1);

    assert!(matches!(
        factory.replace_skin(&mut rider, Some("summer")),
        Err(Error::UnknownSkin { .. })
    ));
}
