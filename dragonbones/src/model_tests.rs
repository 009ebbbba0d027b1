use crate::{
    AnimationData, ArmatureData, BoneData, ConstraintData, DATA_VERSION, DisplayData,
    DragonBonesData, Error, IkConstraintData, SkinData, SlotData, UserData,
    is_compatible_version,
};

fn bundle() -> DragonBonesData {
    DragonBonesData::new("bundle", 24)
}

#[test]
fn bones_sort_parents_first() {
    let mut armature = ArmatureData::new("tree");
    // Declared child-first on purpose.
    armature.add_bone(BoneData::new("hand").with_parent(1));
    armature.add_bone(BoneData::new("arm").with_parent(2));
    armature.add_bone(BoneData::new("root"));
    assert!(!armature.is_sorted());

    let armature = bundle().add_armature(armature).unwrap();
    assert!(armature.is_sorted());
    assert_eq!(armature.sorted_bones(), &[2, 1, 0]);
    assert_eq!(armature.bone_children(2), &[1]);
    assert_eq!(armature.bone_subtree(2), vec![2, 1, 0]);
    assert!(armature.bone_subtree(9).is_empty());
}

#[test]
fn constrained_bones_wait_for_their_target() {
    let mut armature = ArmatureData::new("reach");
    let root = armature.add_bone(BoneData::new("root"));
    let arm = armature.add_bone(BoneData::new("arm").with_parent(root));
    let target = armature.add_bone(BoneData::new("target").with_parent(root));
    armature.add_constraint(ConstraintData::Ik(IkConstraintData::new("aim", target, arm)));

    let armature = bundle().add_armature(armature).unwrap();
    let order = armature.sorted_bones();
    let position = |bone| order.iter().position(|&b| b == bone).unwrap();
    assert!(position(target) < position(arm));
}

#[test]
fn cyclic_parents_are_rejected() {
    let mut armature = ArmatureData::new("loop");
    armature.add_bone(BoneData::new("a").with_parent(1));
    armature.add_bone(BoneData::new("b").with_parent(0));
    armature.add_bone(BoneData::new("c"));

    let err = bundle().add_armature(armature).unwrap_err();
    match err {
        Error::CyclicBoneDependency { armature, bones } => {
            assert_eq!(armature, "loop");
            assert_eq!(bones, vec!["a".to_string(), "b".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn target_below_its_own_chain_is_a_cycle() {
    let mut armature = ArmatureData::new("knot");
    let root = armature.add_bone(BoneData::new("root"));
    let arm = armature.add_bone(BoneData::new("arm").with_parent(root));
    let target = armature.add_bone(BoneData::new("target").with_parent(arm));
    armature.add_constraint(ConstraintData::Ik(IkConstraintData::new("aim", target, arm)));

    assert!(matches!(
        bundle().add_armature(armature),
        Err(Error::CyclicBoneDependency { .. })
    ));
}

#[test]
fn missing_parent_is_rejected() {
    let mut armature = ArmatureData::new("orphan");
    armature.add_bone(BoneData::new("root"));
    armature.add_bone(BoneData::new("lost").with_parent(7));

    let err = bundle().add_armature(armature).unwrap_err();
    assert!(matches!(err, Error::InvalidBoneParent { ref bone, parent: 7 } if bone == "lost"));
    assert_eq!(err.to_string(), "bone 'lost' references missing parent index 7");
}

#[test]
fn slot_on_missing_bone_is_rejected() {
    let mut armature = ArmatureData::new("floating");
    armature.add_bone(BoneData::new("root"));
    armature.add_slot(SlotData::new("badge", 5));

    let err = bundle().add_armature(armature).unwrap_err();
    assert!(matches!(err, Error::InvalidSlotParent { ref slot, parent: 5 } if slot == "badge"));
    assert_eq!(err.to_string(), "slot 'badge' references missing bone index 5");
}

#[test]
fn invalid_constraints_are_rejected() {
    let mut armature = ArmatureData::new("bad");
    armature.add_bone(BoneData::new("root"));
    armature.add_constraint(ConstraintData::Ik(IkConstraintData::new("aim", 5, 0)));
    assert!(matches!(
        bundle().add_armature(armature),
        Err(Error::InvalidConstraint { ref constraint, .. }) if constraint == "aim"
    ));

    // The chain root has to be the direct parent of the end bone.
    let mut armature = ArmatureData::new("detached");
    let root = armature.add_bone(BoneData::new("root"));
    let upper = armature.add_bone(BoneData::new("upper").with_parent(root));
    let lower = armature.add_bone(BoneData::new("lower").with_parent(root));
    let target = armature.add_bone(BoneData::new("target").with_parent(root));
    let mut ik = IkConstraintData::new("reach", target, lower);
    ik.root = Some(upper);
    armature.add_constraint(ConstraintData::Ik(ik));
    assert!(matches!(
        bundle().add_armature(armature),
        Err(Error::InvalidConstraint { .. })
    ));
}

#[test]
fn armatures_inherit_the_bundle_frame_rate() {
    let mut armature = ArmatureData::new("walker");
    armature.add_bone(BoneData::new("root"));
    armature.add_animation(AnimationData::new("walk", 1.0));
    armature.add_animation(AnimationData::new("hop", 0.5));

    let mut data = bundle();
    let armature = data.add_armature(armature).unwrap();
    assert_eq!(armature.frame_rate, 24);
    assert_eq!(armature.animation("walk").unwrap().1.frame_count, 24);
    assert_eq!(armature.animation("hop").unwrap().1.frame_count, 12);

    let mut fast = ArmatureData::new("runner");
    fast.frame_rate = 60;
    fast.add_animation(AnimationData::new("run", 0.5));
    let fast = data.add_armature(fast).unwrap();
    assert_eq!(fast.animation("run").unwrap().1.frame_count, 30);
}

#[test]
fn defaults_come_from_declaration_order() {
    let mut armature = ArmatureData::new("dress_up");
    armature.add_bone(BoneData::new("root"));
    armature.add_skin(SkinData::new("summer"));
    assert_eq!(armature.default_skin().map(|s| s.name.as_str()), Some("summer"));
    armature.add_skin(SkinData::new("default"));
    armature.add_skin(SkinData::new("winter"));
    assert_eq!(armature.default_skin().map(|s| s.name.as_str()), Some("default"));

    assert!(armature.default_animation().is_none());
    armature.add_animation(AnimationData::new("idle", 1.0));
    armature.add_animation(AnimationData::new("walk", 1.0));
    assert_eq!(armature.default_animation().map(|a| a.name.as_str()), Some("idle"));
    assert_eq!(armature.animation("walk").map(|(i, _)| i), Some(1));
    assert!(armature.animation("run").is_none());
}

#[test]
fn lookups_by_name() {
    let mut armature = ArmatureData::new("doll");
    let root = armature.add_bone(BoneData::new("root"));
    let head = armature.add_slot(SlotData::new("head", root));
    let mut skin = SkinData::new("default");
    skin.add_display("head", Some(DisplayData::image("smile")));
    skin.add_display("head", None);
    skin.add_display("head", Some(DisplayData::image("frown")));
    armature.add_skin(skin);

    let mut data = bundle();
    let armature = data.add_armature(armature).unwrap();
    assert_eq!(armature.slot_index("head"), Some(head));
    assert_eq!(armature.slot("head").unwrap().parent, root);
    assert_eq!(armature.bone("root").unwrap().name, "root");
    assert!(armature.bone("tail").is_none());

    let skin = armature.skin("default").unwrap();
    assert_eq!(skin.displays("head").unwrap().len(), 3);
    assert_eq!(skin.display("head", "frown").unwrap().path, "frown");
    assert!(skin.display("head", "wink").is_none());
    assert!(skin.displays("body").is_none());

    assert_eq!(data.armature_names().collect::<Vec<_>>(), vec!["doll"]);
    assert!(data.armature("doll").is_some());
    assert_eq!(data.default_armature().map(|a| a.name.as_str()), Some("doll"));
}

#[test]
fn frame_cache_keeps_the_first_rate() {
    let mut armature = ArmatureData::new("cached");
    armature.add_bone(BoneData::new("root"));
    armature.add_animation(AnimationData::new("idle", 1.0));
    let armature = bundle().add_armature(armature).unwrap();

    assert!(armature.frame_cache().is_none());
    assert!(armature.cache_frames(0).is_none());
    assert_eq!(armature.cache_frames(12).unwrap().frame_rate(), 12);
    assert_eq!(armature.cache_frames(30).unwrap().frame_rate(), 12);
    assert_eq!(armature.frame_cache().unwrap().frame_count(0), 13);
}

#[test]
fn version_and_user_data() {
    assert_eq!(bundle().version, DATA_VERSION);
    assert!(is_compatible_version("5.0"));
    assert!(!is_compatible_version("4.5"));

    let user_data = UserData {
        ints: vec![3],
        floats: vec![0.5],
        strings: vec!["hat".to_string()],
    };
    assert_eq!(user_data.int(0), Some(3));
    assert_eq!(user_data.float(0), Some(0.5));
    assert_eq!(user_data.string(0), Some("hat"));
    assert_eq!(user_data.string(1), None);
}
