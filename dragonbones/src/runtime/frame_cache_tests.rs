use crate::{
    AnimationConfig, AnimationData, Armature, ArmatureData, BoneData, BoneFrame, DragonBonesData,
    FadeOutMode, Transform, Tween,
};
use std::sync::Arc;

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-5,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

fn pose(x: f32, rotation: f32) -> Transform {
    Transform {
        x,
        rotation,
        ..Transform::IDENTITY
    }
}

/// `root -> arm (10, 0) -> hand (5, 0)`; `wave` swings the arm 0 -> 1 -> 0 rad and slides the
/// root, looping once per second.
fn data() -> Arc<ArmatureData> {
    let mut armature = ArmatureData::new("waver");
    let root = armature.add_bone(BoneData::new("root"));
    let arm = armature.add_bone(
        BoneData::new("arm")
            .with_parent(root)
            .with_transform(pose(10.0, 0.0)),
    );
    armature.add_bone(
        BoneData::new("hand")
            .with_parent(arm)
            .with_transform(pose(5.0, 0.0)),
    );

    let mut wave = AnimationData::new("wave", 1.0);
    wave.play_times = 0;
    let timeline = wave
        .timeline::<BoneFrame>()
        .with_frame(0.0, pose(0.0, 0.0), Tween::Linear)
        .with_frame(0.5, pose(0.0, 1.0), Tween::Linear)
        .with_frame(1.0, pose(0.0, 0.0), Tween::Linear);
    wave.add_bone_timeline(arm, timeline);
    let timeline = wave
        .timeline::<BoneFrame>()
        .with_frame(0.0, pose(0.0, 0.0), Tween::Linear)
        .with_frame(0.5, pose(4.0, 0.0), Tween::Linear);
    wave.add_bone_timeline(root, timeline);
    armature.add_animation(wave);

    let mut data = DragonBonesData::new("waver", 24);
    data.add_armature(armature).unwrap()
}

fn assert_same_pose(cached: &Armature, live: &Armature) {
    for (a, b) in cached.bones().iter().zip(live.bones()) {
        let (a, b) = (a.global(), b.global());
        assert_approx(a.x, b.x);
        assert_approx(a.y, b.y);
        assert_approx(a.rotation, b.rotation);
        assert_approx(a.scale_x, b.scale_x);
    }
}

#[test]
fn cached_playback_matches_live_evaluation_on_the_grid() {
    let data = data();
    let mut cached = Armature::new(Arc::clone(&data));
    let mut live = Armature::new(data);
    cached.set_cache_frame_rate(8);
    assert_eq!(cached.cache_frame_rate(), 8);

    for armature in [&mut cached, &mut live] {
        armature.animation_mut().play(Some("wave"), None).unwrap();
    }
    // Two and a half loops: the second pass reads frames the first one stored.
    for _ in 0..20 {
        cached.advance_time(0.125);
        live.advance_time(0.125);
        assert_same_pose(&cached, &live);
    }

    let cache = cached.data().frame_cache().unwrap();
    assert!(!cache.is_empty());
    assert!(cache.is_cached(0, 2));
    assert!(cache.bone_offset(0, 2, 1) >= 0);
}

#[test]
fn armatures_of_one_data_share_the_cache() {
    let data = data();
    let mut first = Armature::new(Arc::clone(&data));
    first.set_cache_frame_rate(8);
    first.animation_mut().play(Some("wave"), None).unwrap();
    for _ in 0..8 {
        first.advance_time(0.125);
    }
    let stored = data.frame_cache().unwrap().len();
    assert!(stored > 0);

    let mut second = Armature::new(Arc::clone(&data));
    second.set_cache_frame_rate(8);
    second.animation_mut().play(Some("wave"), None).unwrap();
    second.advance_time(0.375);
    // Every frame on the first loop is already there.
    assert_eq!(data.frame_cache().unwrap().len(), stored);

    let hand = second.bone("hand").unwrap().global();
    let mut live = Armature::new(data);
    live.animation_mut().play(Some("wave"), None).unwrap();
    live.advance_time(0.375);
    let expected = live.bone("hand").unwrap().global();
    assert_approx(hand.x, expected.x);
    assert_approx(hand.y, expected.y);
}

#[test]
fn blended_states_bypass_the_cache() {
    let data = data();
    let mut armature = Armature::new(Arc::clone(&data));
    armature.set_cache_frame_rate(8);

    armature
        .animation_mut()
        .fade_in("wave", 1.0, None, 0, None, FadeOutMode::SameLayerAndGroup)
        .unwrap();
    armature.advance_time(0.125);
    armature.advance_time(0.125);
    assert!(data.frame_cache().unwrap().is_empty());

    let config = AnimationConfig::new("wave").with_weight(0.5);
    armature.animation_mut().play_config(&config).unwrap();
    armature.advance_time(0.125);
    assert!(data.frame_cache().unwrap().is_empty());
}

#[test]
fn masked_states_bypass_the_cache() {
    let data = data();
    let mut armature = Armature::new(Arc::clone(&data));
    armature.set_cache_frame_rate(8);
    let config = AnimationConfig::new("wave").with_bone_mask(["arm"]);
    armature.animation_mut().play_config(&config).unwrap();
    armature.advance_time(0.125);
    armature.advance_time(0.125);
    assert!(data.frame_cache().unwrap().is_empty());
}

#[test]
fn quantize_snaps_down_and_clamps() {
    let data = data();
    let cache = data.cache_frames(8).unwrap();
    assert_eq!(cache.frame_count(0), 9);
    assert_eq!(cache.quantize(0, 0.3), Some((2, 0.25)));
    assert_eq!(cache.quantize(0, -1.0), Some((0, 0.0)));
    assert_eq!(cache.quantize(0, 5.0), Some((8, 1.0)));
    assert_eq!(cache.quantize(0, f32::NAN), Some((0, 0.0)));
    assert_eq!(cache.quantize(3, 0.5), None);
    assert!(!cache.is_cached(0, 0));
    assert_eq!(cache.bone_offset(0, 0, 0), -1);
}
