use dragonbones::{
    ActionData, ActionKind, AnimationData, ArmatureData, ArmatureEvent, BoneData, BoneFrame,
    ColorTransform, ConstraintData, DisplayData, DragonBonesData, Factory, IkConstraintData,
    SkinData, SlotData, Transform, Tween,
};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

fn at(x: f32, y: f32) -> Transform {
    Transform {
        x,
        y,
        ..Transform::IDENTITY
    }
}

/// A two-bone arm reaching for a moving target, with a hand image and a glove tint.
fn demo_data() -> DragonBonesData {
    let mut armature = ArmatureData::new("arm");
    let root = armature.add_bone(BoneData::new("root"));
    let upper = armature.add_bone(BoneData::new("upper").with_parent(root).with_length(40.0));
    let lower = armature.add_bone(
        BoneData::new("lower")
            .with_parent(upper)
            .with_transform(at(40.0, 0.0))
            .with_length(30.0),
    );
    let hand = armature.add_bone(
        BoneData::new("hand")
            .with_parent(lower)
            .with_transform(at(30.0, 0.0)),
    );
    let target = armature.add_bone(
        BoneData::new("target")
            .with_parent(root)
            .with_transform(at(50.0, 20.0)),
    );

    let mut ik = IkConstraintData::new("reach", target, lower);
    ik.root = Some(upper);
    armature.add_constraint(ConstraintData::Ik(ik));

    let glove = armature.add_slot(SlotData::new("glove", hand));
    armature.add_slot(SlotData::new("sleeve", upper));
    let mut skin = SkinData::new("default");
    skin.add_display("glove", Some(DisplayData::image("glove")));
    skin.add_display("sleeve", Some(DisplayData::image("sleeve")));
    armature.add_skin(skin);

    let mut wave = AnimationData::new("wave", 1.0);
    wave.play_times = 0;
    let timeline = wave
        .timeline::<BoneFrame>()
        .with_frame(0.0, at(0.0, 0.0), Tween::Easing(2.0))
        .with_frame(0.5, at(-20.0, 30.0), Tween::Easing(2.0));
    wave.add_bone_timeline(target, timeline);
    let timeline = wave
        .timeline::<ColorTransform>()
        .with_frame(0.0, ColorTransform::IDENTITY, Tween::Linear)
        .with_frame(
            0.5,
            ColorTransform {
                red_offset: 80,
                ..ColorTransform::IDENTITY
            },
            Tween::Linear,
        );
    wave.add_slot_color_timeline(glove, timeline);
    wave.add_action(0.5, ActionData::new(ActionKind::Frame, "high_five"));
    armature.add_animation(wave);

    let mut data = DragonBonesData::new("demo", 24);
    data.add_armature(armature).expect("demo armature");
    data
}

fn main() {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let animation = args.first().cloned().unwrap_or_else(|| "wave".to_string());
    let time: f32 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(0.5);
    let step: f32 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(1.0 / 60.0);

    let mut factory = Factory::default();
    factory.add_dragonbones_data(demo_data(), None);
    let mut armature = factory
        .build_armature("arm", None, None, None)
        .expect("build armature");

    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    armature.add_listener(move |event: &ArmatureEvent| {
        sink.borrow_mut().push(json!({
            "type": event.kind().as_str(),
            "animation": event.animation(),
        }));
    });

    armature
        .animation_mut()
        .play(Some(&animation), None)
        .expect("play animation");
    let mut elapsed = 0.0;
    while elapsed < time {
        let dt = step.min(time - elapsed).max(0.0);
        armature.advance_time(dt);
        elapsed += step;
    }

    let bones: Vec<_> = armature
        .bones()
        .iter()
        .enumerate()
        .map(|(i, bone)| {
            let m = bone.global_transform_matrix();
            let g = bone.global();
            json!({
                "i": i,
                "name": bone.name(),
                "world": {"a": m.a, "b": m.b, "c": m.c, "d": m.d, "x": m.tx, "y": m.ty},
                "global": {
                    "rotation": g.rotation,
                    "skew": g.skew,
                    "scaleX": g.scale_x,
                    "scaleY": g.scale_y,
                },
            })
        })
        .collect();

    let slots: Vec<_> = armature
        .slots()
        .iter()
        .enumerate()
        .map(|(i, slot)| {
            let c = slot.color();
            json!({
                "i": i,
                "name": slot.name(),
                "display": slot.display().map(|d| d.name.as_str()),
                "displayIndex": slot.display_index(),
                "zOrder": slot.z_order(),
                "visible": slot.visible(),
                "color": [
                    c.alpha_multiplier, c.red_multiplier, c.green_multiplier, c.blue_multiplier,
                    c.alpha_offset, c.red_offset, c.green_offset, c.blue_offset,
                ],
            })
        })
        .collect();

    let constraints: Vec<_> = armature
        .constraints()
        .iter()
        .map(|c| {
            json!({
                "name": c.name(),
                "weight": c.weight,
                "bendPositive": c.bend_positive,
            })
        })
        .collect();

    let states: Vec<_> = armature
        .animation()
        .states()
        .map(|(_, s)| {
            json!({
                "name": s.name(),
                "time": s.current_time(),
                "playTimes": s.current_play_times(),
                "weight": s.blend_weight(),
            })
        })
        .collect();

    let out = json!({
        "animation": animation,
        "time": time,
        "bones": bones,
        "slots": slots,
        "drawOrder": armature.draw_order(),
        "constraints": constraints,
        "states": states,
        "events": *events.borrow(),
    });
    println!("{}", serde_json::to_string_pretty(&out).expect("serialize pose"));
}
