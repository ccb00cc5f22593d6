use std::collections::BTreeMap;

use super::{CatalogFile, EventArg, MethodEntry, MethodKind, extern_symbol};

const VOID: &str = "SystemVoid";

const TYPES: &[&str] = &[
    "SystemInt32",
    "SystemUInt32",
    "SystemInt64",
    "SystemSingle",
    "SystemDouble",
    "SystemString",
    "SystemBoolean",
    "SystemObject",
    "SystemInt32Array",
    "SystemSingleArray",
    "SystemBooleanArray",
    "SystemStringArray",
    "UnityEngineGameObject",
    "UnityEngineGameObjectArray",
    "UnityEngineTransform",
    "UnityEngineComponent",
    "UnityEngineRenderer",
    "UnityEngineMaterial",
    "UnityEngineVector3",
    "UnityEngineQuaternion",
    "UnityEngineColor",
    "UnityEngineCollider",
    "UnityEngineCollision",
    "VRCSDKBaseVRCPlayerApi",
];

/// Arithmetic and comparison operator members for one numeric type.
fn numeric_ops(out: &mut Vec<MethodEntry>, ty: &str, with_modulus: bool) {
    let mut arith = vec!["op_Addition", "op_Subtraction", "op_Multiplication", "op_Division"];
    if with_modulus {
        arith.push("op_Modulus");
    }
    for op in arith {
        out.push(stat(ty, op, &[ty, ty], ty));
    }
    for op in [
        "op_Equality",
        "op_Inequality",
        "op_LessThan",
        "op_GreaterThan",
        "op_LessThanOrEqual",
        "op_GreaterThanOrEqual",
    ] {
        out.push(stat(ty, op, &[ty, ty], "SystemBoolean"));
    }
    out.push(stat(ty, "op_UnaryMinus", &[ty], ty));
}

/// `Array.ctor(len)`, `Get(i)`, `Set(i, v)` for one element type.
fn array_members(out: &mut Vec<MethodEntry>, elem: &str) {
    let arr = format!("{}Array", elem);
    out.push(entry(MethodKind::Constructor, &arr, "ctor", &["SystemInt32"], &arr));
    out.push(entry(MethodKind::InstanceFunc, &arr, "Get", &["SystemInt32"], elem));
    out.push(entry(MethodKind::InstanceFunc, &arr, "Set", &["SystemInt32", elem], VOID));
}

fn entry(kind: MethodKind, owner: &str, name: &str, args: &[&str], ret: &str) -> MethodEntry {
    MethodEntry {
        kind,
        owner: owner.to_string(),
        name: name.to_string(),
        args: args.iter().map(|a| a.to_string()).collect(),
        ret: if ret == VOID { None } else { Some(ret.to_string()) },
        symbol: extern_symbol(owner, name, args, ret),
    }
}

fn stat(owner: &str, name: &str, args: &[&str], ret: &str) -> MethodEntry {
    entry(MethodKind::StaticFunc, owner, name, args, ret)
}

fn inst(owner: &str, name: &str, args: &[&str], ret: &str) -> MethodEntry {
    entry(MethodKind::InstanceFunc, owner, name, args, ret)
}

fn event(slots: &[(&str, &str)]) -> Vec<EventArg> {
    slots
        .iter()
        .map(|(ty, slot)| EventArg {
            ty: ty.to_string(),
            slot: slot.to_string(),
        })
        .collect()
}

pub(super) fn seed() -> CatalogFile {
    let mut types: BTreeMap<String, String> = TYPES
        .iter()
        .map(|t| (t.to_string(), t.to_string()))
        .collect();
    // No class carries this name, but the VM insists on it.
    types.insert(
        "VRCUdonCommonInterfacesIUdonEventReceiver".to_string(),
        "VRCUdonUdonBehaviour".to_string(),
    );

    let mut methods = Vec::new();

    numeric_ops(&mut methods, "SystemInt32", true);
    numeric_ops(&mut methods, "SystemSingle", false);

    for ty in ["SystemBoolean", "SystemString", "SystemObject"] {
        methods.push(stat(ty, "op_Equality", &[ty, ty], "SystemBoolean"));
        methods.push(stat(ty, "op_Inequality", &[ty, ty], "SystemBoolean"));
    }
    methods.push(stat("SystemBoolean", "op_LogicalAnd", &["SystemBoolean", "SystemBoolean"], "SystemBoolean"));
    methods.push(stat("SystemBoolean", "op_LogicalOr", &["SystemBoolean", "SystemBoolean"], "SystemBoolean"));
    methods.push(stat("SystemBoolean", "op_UnaryNegation", &["SystemBoolean"], "SystemBoolean"));
    methods.push(stat("SystemBoolean", "Parse", &["SystemString"], "SystemBoolean"));

    // String concatenation is spelled as `+` in scripts.
    methods.push(MethodEntry {
        symbol: extern_symbol("SystemString", "Concat", &["SystemString", "SystemString"], "SystemString"),
        ..stat("SystemString", "op_Addition", &["SystemString", "SystemString"], "SystemString")
    });

    methods.push(stat("SystemConvert", "ToString", &["SystemInt32"], "SystemString"));
    methods.push(stat("SystemConvert", "ToString", &["SystemSingle"], "SystemString"));
    methods.push(stat("SystemConvert", "ToSingle", &["SystemInt32"], "SystemSingle"));
    methods.push(stat("SystemConvert", "ToInt32", &["SystemSingle"], "SystemInt32"));

    methods.push(stat("UnityEngineDebug", "Log", &["SystemObject"], VOID));
    methods.push(stat("UnityEngineRandom", "Range", &["SystemInt32", "SystemInt32"], "SystemInt32"));
    methods.push(stat("UnityEngineRandom", "Range", &["SystemSingle", "SystemSingle"], "SystemSingle"));
    methods.push(stat("UnityEngineRandom", "ColorHSV", &[], "UnityEngineColor"));
    methods.push(stat("VRCInstantiate", "Instantiate", &["UnityEngineGameObject"], "UnityEngineGameObject"));

    methods.push(stat("UnityEngineGameObject", "Find", &["SystemString"], "UnityEngineGameObject"));
    methods.push(inst("UnityEngineGameObject", "GetComponent", &["SystemString"], "UnityEngineComponent"));
    methods.push(inst("UnityEngineGameObject", "SetActive", &["SystemBoolean"], VOID));
    methods.push(inst("UnityEngineGameObject", "get_transform", &[], "UnityEngineTransform"));

    methods.push(inst("UnityEngineTransform", "get_position", &[], "UnityEngineVector3"));
    methods.push(inst("UnityEngineTransform", "set_position", &["UnityEngineVector3"], VOID));
    methods.push(inst("UnityEngineTransform", "Rotate", &["SystemSingle", "SystemSingle", "SystemSingle"], VOID));

    methods.push(inst("UnityEngineRenderer", "get_material", &[], "UnityEngineMaterial"));
    methods.push(inst("UnityEngineMaterial", "get_color", &[], "UnityEngineColor"));
    methods.push(inst("UnityEngineMaterial", "set_color", &["UnityEngineColor"], VOID));
    methods.push(inst("UnityEngineColor", "Equals", &["UnityEngineColor"], "SystemBoolean"));

    methods.push(entry(
        MethodKind::Constructor,
        "UnityEngineVector3",
        "ctor",
        &["SystemSingle", "SystemSingle", "SystemSingle"],
        "UnityEngineVector3",
    ));
    methods.push(entry(
        MethodKind::Constructor,
        "UnityEngineColor",
        "ctor",
        &["SystemSingle", "SystemSingle", "SystemSingle"],
        "UnityEngineColor",
    ));

    for elem in ["SystemInt32", "SystemSingle", "SystemBoolean", "SystemString", "UnityEngineGameObject"] {
        array_members(&mut methods, elem);
    }

    let mut events = BTreeMap::new();
    for name in [
        "_start",
        "_update",
        "_lateUpdate",
        "_fixedUpdate",
        "_interact",
        "_onEnable",
        "_onDisable",
        "_onMouseDown",
    ] {
        events.insert(name.to_string(), Vec::new());
    }
    events.insert(
        "_onTriggerEnter".to_string(),
        event(&[("UnityEngineCollider", "onTriggerEnterOther")]),
    );
    events.insert(
        "_onTriggerExit".to_string(),
        event(&[("UnityEngineCollider", "onTriggerExitOther")]),
    );
    events.insert(
        "_onCollisionEnter".to_string(),
        event(&[("UnityEngineCollision", "onCollisionEnterOther")]),
    );
    events.insert(
        "_onPlayerJoined".to_string(),
        event(&[("VRCSDKBaseVRCPlayerApi", "onPlayerJoinedPlayer")]),
    );
    events.insert(
        "_onPlayerLeft".to_string(),
        event(&[("VRCSDKBaseVRCPlayerApi", "onPlayerLeftPlayer")]),
    );

    CatalogFile {
        types,
        methods,
        events,
    }
}
