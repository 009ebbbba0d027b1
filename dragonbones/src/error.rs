use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown armature: {name}")]
    UnknownArmature { name: String },

    #[error("unknown DragonBones data: {name}")]
    UnknownDragonBonesData { name: String },

    #[error("unknown animation: {name}")]
    UnknownAnimation { name: String },

    #[error("unknown skin: {name}")]
    UnknownSkin { name: String },

    #[error("unknown bone: {name}")]
    UnknownBone { name: String },

    #[error("unknown slot: {name}")]
    UnknownSlot { name: String },

    #[error("bone '{bone}' references missing parent index {parent}")]
    InvalidBoneParent { bone: String, parent: usize },

    #[error("slot '{slot}' references missing bone index {parent}")]
    InvalidSlotParent { slot: String, parent: usize },

    #[error("invalid constraint '{constraint}': {message}")]
    InvalidConstraint { constraint: String, message: String },

    #[error("cyclic bone dependency in armature '{armature}': {bones:?}")]
    CyclicBoneDependency {
        armature: String,
        bones: Vec<String>,
    },

    #[error("invalid value: {message}")]
    InvalidValue { message: String },
}
