use crate::{
    ActionData, ActionKind, AnimationConfig, AnimationData, Armature, ArmatureData,
    ArmatureEvent, BoneData, BoneFrame, DragonBonesData, Error, EventKind, FadeOutMode, Transform,
    Tween,
};
use std::cell::RefCell;
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};
use std::rc::Rc;
use std::sync::Arc;

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-5,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

fn rotation(value: f32) -> Transform {
    Transform {
        rotation: value,
        ..Transform::IDENTITY
    }
}

/// `root -> arm` (arm at x = 10) and `root -> leg`, plus:
/// - `swing`: arm 0 -> PI/2 over one second, played once
/// - `up` / `down`: arm held at +1 / -1 rad, looping
/// - `both`: arm and leg held at 0.5 rad, looping
fn robot_data() -> Arc<ArmatureData> {
    let mut armature = ArmatureData::new("robot");
    let root = armature.add_bone(BoneData::new("root"));
    let arm = armature.add_bone(BoneData::new("arm").with_parent(root).with_transform(
        Transform {
            x: 10.0,
            ..Transform::IDENTITY
        },
    ));
    let leg = armature.add_bone(BoneData::new("leg").with_parent(root));

    let mut swing = AnimationData::new("swing", 1.0);
    let timeline = swing
        .timeline::<BoneFrame>()
        .with_frame(0.0, rotation(0.0), Tween::Linear)
        .with_frame(1.0, rotation(FRAC_PI_2), Tween::Linear);
    swing.add_bone_timeline(arm, timeline);
    armature.add_animation(swing);

    for (name, value) in [("up", 1.0), ("down", -1.0)] {
        let mut animation = AnimationData::new(name, 1.0);
        animation.play_times = 0;
        let timeline = animation
            .timeline::<BoneFrame>()
            .with_frame(0.0, rotation(value), Tween::Linear);
        animation.add_bone_timeline(arm, timeline);
        armature.add_animation(animation);
    }

    let mut both = AnimationData::new("both", 1.0);
    both.play_times = 0;
    for bone in [arm, leg] {
        let timeline = both
            .timeline::<BoneFrame>()
            .with_frame(0.0, rotation(0.5), Tween::Linear);
        both.add_bone_timeline(bone, timeline);
    }
    armature.add_animation(both);

    let mut data = DragonBonesData::new("robot", 24);
    data.add_armature(armature).unwrap()
}

fn record_events(armature: &mut Armature) -> Rc<RefCell<Vec<EventKind>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    armature.add_listener(move |event: &ArmatureEvent| sink.borrow_mut().push(event.kind()));
    events
}

fn count(events: &Rc<RefCell<Vec<EventKind>>>, kind: EventKind) -> usize {
    events.borrow().iter().filter(|k| **k == kind).count()
}

#[test]
fn swing_reaches_quarter_then_half_turn_and_completes_once() {
    let mut armature = Armature::new(robot_data());
    let events = record_events(&mut armature);
    armature.animation_mut().play(Some("swing"), None).unwrap();

    armature.advance_time(0.5);
    let arm = armature.bone("arm").unwrap();
    assert_approx(arm.offset().rotation, FRAC_PI_4);
    assert_approx(arm.global().rotation, FRAC_PI_4);
    assert_approx(arm.global().x, 10.0);
    assert_eq!(count(&events, EventKind::Complete), 0);

    armature.advance_time(0.5);
    let arm = armature.bone("arm").unwrap();
    assert_approx(arm.offset().rotation, FRAC_PI_2);
    assert_approx(arm.global().rotation, FRAC_PI_2);
    assert_eq!(count(&events, EventKind::Complete), 1);
    assert!(armature.animation().is_completed());

    // The completed state fades out and is dropped; the last pose stays applied.
    armature.advance_time(0.5);
    assert_eq!(count(&events, EventKind::Complete), 1);
    assert_eq!(armature.animation().state_count(), 0);
    assert_approx(armature.bone("arm").unwrap().offset().rotation, FRAC_PI_2);
}

#[test]
fn fade_in_then_play_through_fires_one_complete_and_removes_the_state() {
    let mut armature = Armature::new(robot_data());
    let events = record_events(&mut armature);
    armature
        .animation_mut()
        .fade_in("swing", 1.0, Some(1), 0, None, FadeOutMode::SameLayerAndGroup)
        .unwrap();

    armature.advance_time(0.25);
    let state = armature.animation().state("swing").unwrap();
    assert!(state.is_fade_in());
    assert_approx(state.fade_progress(), 0.25);

    for _ in 0..8 {
        armature.advance_time(0.25);
    }
    assert_eq!(count(&events, EventKind::Complete), 1);
    assert_eq!(count(&events, EventKind::FadeInComplete), 1);
    assert_eq!(count(&events, EventKind::FadeOutComplete), 1);
    assert_eq!(armature.animation().state_count(), 0);
    assert!(armature.animation().state("swing").is_none());
}

#[test]
fn lifecycle_events_arrive_in_order() {
    let data = {
        let mut armature = ArmatureData::new("robot");
        armature.add_bone(BoneData::new("root"));
        let mut animation = AnimationData::new("wave", 1.0);
        animation.add_action(0.25, ActionData::new(ActionKind::Frame, "hit"));
        armature.add_animation(animation);
        let mut data = DragonBonesData::new("robot", 24);
        data.add_armature(armature).unwrap()
    };
    let mut armature = Armature::new(data);
    let events = record_events(&mut armature);
    armature.animation_mut().play(Some("wave"), None).unwrap();

    armature.advance_time(0.5);
    assert_eq!(
        *events.borrow(),
        vec![
            EventKind::FadeIn,
            EventKind::FadeInComplete,
            EventKind::Start,
            EventKind::Frame,
        ]
    );

    events.borrow_mut().clear();
    armature.advance_time(0.5);
    assert_eq!(
        *events.borrow(),
        vec![EventKind::LoopComplete, EventKind::Complete]
    );

    events.borrow_mut().clear();
    armature.advance_time(0.5);
    assert_eq!(
        *events.borrow(),
        vec![EventKind::FadeOut, EventKind::FadeOutComplete]
    );
}

#[test]
fn frame_events_fire_once_per_loop() {
    let data = {
        let mut armature = ArmatureData::new("robot");
        armature.add_bone(BoneData::new("root"));
        let mut animation = AnimationData::new("wave", 1.0);
        animation.play_times = 0;
        animation.add_action(0.25, ActionData::new(ActionKind::Frame, "hit"));
        armature.add_animation(animation);
        let mut data = DragonBonesData::new("robot", 24);
        data.add_armature(armature).unwrap()
    };
    let mut armature = Armature::new(data);
    let events = record_events(&mut armature);
    armature.animation_mut().play(Some("wave"), None).unwrap();

    for _ in 0..6 {
        armature.advance_time(0.5);
    }
    assert_eq!(count(&events, EventKind::Frame), 3);
    assert_eq!(count(&events, EventKind::LoopComplete), 3);
    assert_eq!(count(&events, EventKind::Complete), 0);
    assert_eq!(count(&events, EventKind::Start), 1);
}

#[test]
fn play_action_switches_animation_after_the_events() {
    let data = {
        let mut armature = ArmatureData::new("robot");
        armature.add_bone(BoneData::new("root"));
        let mut intro = AnimationData::new("intro", 1.0);
        intro.add_action(0.5, ActionData::new(ActionKind::Play, "idle"));
        armature.add_animation(intro);
        let mut idle = AnimationData::new("idle", 1.0);
        idle.play_times = 0;
        armature.add_animation(idle);
        let mut data = DragonBonesData::new("robot", 24);
        data.add_armature(armature).unwrap()
    };
    let mut armature = Armature::new(data);
    armature.animation_mut().play(Some("intro"), None).unwrap();

    armature.advance_time(0.25);
    assert_eq!(armature.animation().last_animation_name(), Some("intro"));
    armature.advance_time(0.5);
    assert_eq!(armature.animation().last_animation_name(), Some("idle"));
}

#[test]
fn unknown_animation_is_rejected_without_touching_states() {
    let mut armature = Armature::new(robot_data());
    armature.animation_mut().play(Some("swing"), None).unwrap();

    let err = armature
        .animation_mut()
        .play(Some("dance"), None)
        .unwrap_err();
    assert!(matches!(err, Error::UnknownAnimation { ref name } if name == "dance"));
    assert_eq!(armature.animation().state_count(), 1);
    assert_eq!(armature.animation().last_animation_name(), Some("swing"));
}

#[test]
fn play_without_name_uses_the_default_animation() {
    let mut armature = Armature::new(robot_data());
    armature.animation_mut().play(None, None).unwrap();
    assert_eq!(armature.animation().last_animation_name(), Some("swing"));
}

#[test]
fn play_without_name_resumes_a_stopped_state() {
    let mut armature = Armature::new(robot_data());
    let handle = armature.animation_mut().play(Some("swing"), None).unwrap();
    armature.advance_time(0.25);
    armature.animation_mut().stop(None);
    armature.advance_time(0.25);
    assert_approx(armature.animation().state("swing").unwrap().current_time(), 0.25);
    assert!(!armature.animation().is_playing());

    let resumed = armature.animation_mut().play(None, None).unwrap();
    assert_eq!(resumed, handle);
    armature.advance_time(0.25);
    assert_approx(armature.animation().state("swing").unwrap().current_time(), 0.5);
}

#[test]
fn replaying_reuses_the_state() {
    let mut armature = Armature::new(robot_data());
    let first = armature.animation_mut().play(Some("swing"), None).unwrap();
    armature.advance_time(0.5);
    let second = armature.animation_mut().play(Some("swing"), None).unwrap();

    assert_eq!(first, second);
    assert_eq!(armature.animation().state_count(), 1);
    let state = armature.animation().state_by_handle(second).unwrap();
    assert_approx(state.current_time(), 0.0);
    assert_eq!(state.current_play_times(), 0);
}

#[test]
fn single_mode_returns_the_active_state_untouched() {
    let mut armature = Armature::new(robot_data());
    let first = armature.animation_mut().play(Some("swing"), None).unwrap();
    armature.advance_time(0.5);

    let config = AnimationConfig::new("swing").with_fade_out_mode(FadeOutMode::Single);
    let second = armature.animation_mut().play_config(&config).unwrap();
    assert_eq!(first, second);
    assert_approx(
        armature.animation().state_by_handle(second).unwrap().current_time(),
        0.5,
    );
}

#[test]
fn same_layer_play_fades_out_the_previous_state() {
    let mut armature = Armature::new(robot_data());
    let up = armature.animation_mut().play(Some("up"), None).unwrap();
    armature.advance_time(0.1);
    armature
        .animation_mut()
        .fade_in("down", 0.5, None, 0, None, FadeOutMode::SameLayerAndGroup)
        .unwrap();

    let state = armature.animation().state_by_handle(up).unwrap();
    assert!(state.is_fade_out());

    armature.advance_time(0.25);
    // Halfway through the crossfade, the two poses cancel out.
    assert_approx(armature.bone("arm").unwrap().offset().rotation, 0.0);

    armature.advance_time(0.5);
    assert!(armature.animation().state_by_handle(up).is_none());
    assert_approx(armature.bone("arm").unwrap().offset().rotation, -1.0);
}

#[test]
fn fade_out_mode_none_keeps_other_states() {
    let mut armature = Armature::new(robot_data());
    armature.animation_mut().play(Some("up"), None).unwrap();
    let config = AnimationConfig::new("down")
        .with_fade_in_time(0.0)
        .with_fade_out_mode(FadeOutMode::None);
    armature.animation_mut().play_config(&config).unwrap();

    assert_eq!(armature.animation().state_count(), 2);
    assert!(armature.animation().states().all(|(_, s)| !s.is_fade_out()));
}

#[test]
fn higher_layers_take_weight_before_lower_layers() {
    let mut armature = Armature::new(robot_data());
    let down = AnimationConfig::new("down").with_fade_in_time(0.0);
    let up = AnimationConfig::new("up")
        .with_layer(1)
        .with_weight(0.6)
        .with_fade_in_time(0.0);
    armature.animation_mut().play_config(&down).unwrap();
    armature.animation_mut().play_config(&up).unwrap();

    let layers: Vec<i32> = armature.animation().states().map(|(_, s)| s.layer()).collect();
    assert_eq!(layers, vec![1, 0]);

    armature.advance_time(0.1);
    // 0.6 * 1.0 from layer 1, then the remaining 0.4 * -1.0 from layer 0.
    assert_approx(armature.bone("arm").unwrap().offset().rotation, 0.2);
}

#[test]
fn additive_state_adds_on_top_of_the_layer_budget() {
    let mut armature = Armature::new(robot_data());
    armature
        .animation_mut()
        .play_config(&AnimationConfig::new("up").with_fade_in_time(0.0))
        .unwrap();
    let mut additive = AnimationConfig::new("both")
        .with_fade_in_time(0.0)
        .with_fade_out_mode(FadeOutMode::None);
    additive.additive_blending = true;
    armature.animation_mut().play_config(&additive).unwrap();

    armature.advance_time(0.1);
    assert_approx(armature.bone("arm").unwrap().offset().rotation, 1.5);
    assert_approx(armature.bone("leg").unwrap().offset().rotation, 0.5);
}

#[test]
fn additive_state_blended_first_leaves_the_budget_to_others() {
    let mut armature = Armature::new(robot_data());
    let mut additive = AnimationConfig::new("both")
        .with_layer(1)
        .with_fade_in_time(0.0);
    additive.additive_blending = true;
    armature.animation_mut().play_config(&additive).unwrap();
    armature
        .animation_mut()
        .play_config(&AnimationConfig::new("up").with_fade_in_time(0.0))
        .unwrap();

    armature.advance_time(0.1);
    assert_approx(armature.bone("arm").unwrap().offset().rotation, 1.5);

    // Same layer, additive state created first.
    let mut armature = Armature::new(robot_data());
    additive.layer = 0;
    armature.animation_mut().play_config(&additive).unwrap();
    let up = AnimationConfig::new("up")
        .with_fade_in_time(0.0)
        .with_fade_out_mode(FadeOutMode::None);
    armature.animation_mut().play_config(&up).unwrap();

    armature.advance_time(0.1);
    assert_approx(armature.bone("arm").unwrap().offset().rotation, 1.5);
    assert_approx(armature.bone("leg").unwrap().offset().rotation, 0.5);
}

#[test]
fn bone_mask_keeps_other_bones_at_rest() {
    let mut armature = Armature::new(robot_data());
    let config = AnimationConfig::new("both")
        .with_fade_in_time(0.0)
        .with_bone_mask(["arm"]);
    armature.animation_mut().play_config(&config).unwrap();

    for _ in 0..3 {
        armature.advance_time(0.3);
    }
    assert_approx(armature.bone("arm").unwrap().offset().rotation, 0.5);
    assert_eq!(*armature.bone("leg").unwrap().offset(), Transform::IDENTITY);
}

#[test]
fn recursive_mask_edits_follow_the_hierarchy() {
    let mut armature = Armature::new(robot_data());
    let handle = armature.animation_mut().play(Some("both"), None).unwrap();

    armature
        .animation_mut()
        .remove_bone_mask(handle, "leg", false)
        .unwrap();
    let state = armature.animation().state_by_handle(handle).unwrap();
    assert!(state.contains_bone_mask("root"));
    assert!(state.contains_bone_mask("arm"));
    assert!(!state.contains_bone_mask("leg"));

    armature.animation_mut().remove_all_bone_mask(handle);
    armature
        .animation_mut()
        .add_bone_mask(handle, "root", true)
        .unwrap();
    let state = armature.animation().state_by_handle(handle).unwrap();
    assert_eq!(state.bone_mask().len(), 3);

    let err = armature
        .animation_mut()
        .add_bone_mask(handle, "tail", false)
        .unwrap_err();
    assert!(matches!(err, Error::UnknownBone { .. }));
}

#[test]
fn goto_and_stop_poses_without_playing() {
    let mut armature = Armature::new(robot_data());
    armature
        .animation_mut()
        .goto_and_stop_by_progress("swing", 0.5)
        .unwrap();
    armature.advance_time(0.25);

    assert!(!armature.animation().is_playing());
    assert_approx(armature.bone("arm").unwrap().offset().rotation, FRAC_PI_4);
}

#[test]
fn seeking_an_active_state_moves_its_playhead() {
    let mut armature = Armature::new(robot_data());
    let first = armature
        .animation_mut()
        .goto_and_stop_by_progress("swing", 0.5)
        .unwrap();
    armature.advance_time(0.0);
    assert_approx(armature.bone("arm").unwrap().offset().rotation, FRAC_PI_4);

    let second = armature
        .animation_mut()
        .goto_and_stop_by_progress("swing", 0.25)
        .unwrap();
    armature.advance_time(0.0);
    assert_eq!(first, second);
    let arm = armature.bone("arm").unwrap().offset().rotation;
    assert_approx(arm, FRAC_PI_4 / 2.0);

    armature
        .animation_mut()
        .goto_and_play_by_time("swing", 0.75, None)
        .unwrap();
    armature.advance_time(0.0);
    assert!(armature.animation().is_playing());
    let arm = armature.bone("arm").unwrap().offset().rotation;
    assert_approx(arm, 3.0 * FRAC_PI_4 / 2.0);
}

#[test]
fn replaying_applies_the_new_settings() {
    let mut armature = Armature::new(robot_data());
    let handle = armature
        .animation_mut()
        .play_config(&AnimationConfig::new("both").with_fade_in_time(0.0))
        .unwrap();
    armature.advance_time(0.1);
    assert_approx(armature.bone("leg").unwrap().offset().rotation, 0.5);

    let config = AnimationConfig::new("both")
        .with_fade_in_time(0.0)
        .with_weight(0.5)
        .with_bone_mask(["arm"]);
    let replayed = armature.animation_mut().play_config(&config).unwrap();
    assert_eq!(replayed, handle);
    armature.advance_time(0.1);

    let state = armature.animation().state_by_handle(handle).unwrap();
    assert_approx(state.weight, 0.5);
    assert!(state.has_bone_mask());
    assert_approx(armature.bone("arm").unwrap().offset().rotation, 0.25);
    assert_eq!(*armature.bone("leg").unwrap().offset(), Transform::IDENTITY);
}

#[test]
fn goto_and_play_by_frame_starts_mid_animation() {
    let mut armature = Armature::new(robot_data());
    let handle = armature
        .animation_mut()
        .goto_and_play_by_frame("swing", 12, None)
        .unwrap();
    armature.advance_time(0.0);

    let state = armature.animation().state_by_handle(handle).unwrap();
    assert_approx(state.position(), 0.5);
    assert_approx(state.total_time(), 0.5);
    assert_approx(armature.bone("arm").unwrap().offset().rotation, FRAC_PI_4);
}

#[test]
fn time_scale_speeds_up_every_state() {
    let mut armature = Armature::new(robot_data());
    armature.animation_mut().time_scale = 2.0;
    armature.animation_mut().play(Some("swing"), None).unwrap();
    armature.advance_time(0.25);
    assert_approx(armature.bone("arm").unwrap().offset().rotation, FRAC_PI_4);
}

#[test]
fn reset_drops_every_state() {
    let mut armature = Armature::new(robot_data());
    armature.animation_mut().play(Some("up"), None).unwrap();
    armature
        .animation_mut()
        .fade_in("both", 0.2, None, 3, Some("upper"), FadeOutMode::None)
        .unwrap();
    assert_eq!(armature.animation().state_count(), 2);

    armature.animation_mut().reset();
    assert_eq!(armature.animation().state_count(), 0);
    assert!(armature.animation().last_animation_name().is_none());
    assert!(!armature.animation().is_completed());
}

#[test]
fn same_updates_produce_identical_poses() {
    let data = robot_data();
    let mut a = Armature::new(data.clone());
    let mut b = Armature::new(data);
    for armature in [&mut a, &mut b] {
        armature.animation_mut().play(Some("up"), None).unwrap();
        armature
            .animation_mut()
            .fade_in("swing", 0.3, Some(0), 0, None, FadeOutMode::SameLayer)
            .unwrap();
    }

    for dt in [0.016, 0.033, 0.1, 0.0, 0.25, 0.017, 0.4] {
        a.advance_time(dt);
        b.advance_time(dt);
        for (x, y) in a.bones().iter().zip(b.bones()) {
            assert_eq!(x.global_transform_matrix(), y.global_transform_matrix());
            assert_eq!(x.global(), y.global());
        }
    }
}

#[test]
fn animation_names_lists_every_animation() {
    let armature = Armature::new(robot_data());
    let names: Vec<&str> = armature.animation().animation_names().collect();
    assert_eq!(names, vec!["swing", "up", "down", "both"]);
    assert!(armature.animation().has_animation("up"));
    assert!(!armature.animation().has_animation("fly"));
}
