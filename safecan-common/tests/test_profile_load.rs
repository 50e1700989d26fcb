use safecan_common::{
    network::BitTiming,
    pdo::{ObjectAddress, PdoId, PdoSlot, PdoTransmissionType},
    profile::{NodeProfile, ProfileError},
    safety_word::{SafetyControlWordId, SafetyFunctionId},
    srdo::SrdoId,
    NodeId,
};

const MINIMAL: &str = r#"
    name = "test"
    revision = 3
    node_id = 0x10
    bit_timing = 500
    rt_activated = false
    settle_delay_ms = 0
    polarity = true
    error_behavior = 0

    [velocity_ramps]
    acceleration_delta_speed = 10
    deceleration_delta_speed = 20

    [sto]
    restart_acknowledge_behavior = true

    [sls]
    id = "SLS_2"
    velocity_limit = 100
    time_to_velocity_monitoring = 50

    [manufacturer]
    speed_pid_p = 1
    speed_pid_i = 2
    speed_pid_d = 3

    [[pdo_communication]]
    direction = "transmit"
    pdo = 1
    cob_base = 0x180
    enabled = true
    transmission_type = 1

    [[pdo_communication]]
    direction = "transmit"
    pdo = 2
    cob_base = 0x280
    enabled = true
    transmission_type = 1

    [[pdo_communication]]
    direction = "transmit"
    pdo = 3
    cob_base = 0x380
    enabled = true
    transmission_type = 1

    [[pdo_communication]]
    direction = "transmit"
    pdo = 4
    cob_base = 0x480
    enabled = true
    transmission_type = 1

    [[pdo_communication]]
    direction = "receive"
    pdo = 1
    cob_base = 0x200
    enabled = true
    transmission_type = 1

    [[pdo_communication]]
    direction = "receive"
    pdo = 2
    cob_base = 0x300
    enabled = false
    transmission_type = 255

    [[pdo_communication]]
    direction = "receive"
    pdo = 3
    cob_base = 0x400
    enabled = true
    transmission_type = 1

    [[pdo_communication]]
    direction = "receive"
    pdo = 4
    cob_base = 0x500
    enabled = true
    transmission_type = 1
"#;

fn with(extra: &str) -> String {
    format!("{MINIMAL}\n{extra}")
}

#[test]
fn test_minimal_profile() {
    let profile = NodeProfile::load_from_str(MINIMAL).expect("Failed to parse profile");
    assert_eq!(NodeId::new(16).unwrap(), profile.node_id);
    assert_eq!(BitTiming::Bt500, profile.bit_timing);
    assert_eq!(3, profile.revision);
    assert_eq!("", profile.description);
    assert_eq!(50, profile.sls.parameters().time_for_velocity_in_limits);
    assert_eq!(8, profile.pdo_communication.len());
    assert!(profile.pdo_mapping.is_empty());
    assert!(profile.srdo.is_empty());
}

#[test]
fn test_pdo_sections() {
    let doc = with(
        r#"
        [[pdo_mapping]]
        direction = "transmit"
        pdo = 4
        items = [0x6041_00_10, 0x2000_01_08]
    "#,
    );
    let profile = NodeProfile::load_from_str(&doc).unwrap();

    let rpdo2 = profile
        .pdo_communication(PdoSlot::rpdo(PdoId::new(2).unwrap()))
        .unwrap();
    let params = rpdo2.parameters(profile.node_id);
    assert_eq!(0x310, params.cob_id.can_id);
    assert!(!params.cob_id.valid);
    assert!(!params.cob_id.flag);
    assert_eq!(PdoTransmissionType::EventProfile, params.transmission_type);

    let mapping = profile.pdo_mapping[0].parameters();
    assert_eq!(2, mapping.nb);
    assert_eq!(
        vec![
            ObjectAddress::new(0x6041, 0, 16),
            ObjectAddress::new(0x2000, 1, 8)
        ],
        mapping.items
    );
}

#[test]
fn test_srdo_section() {
    let doc = with(
        r#"
        [[srdo]]
        id = 3
        can_id1 = 0x105
        can_id2 = 0x106
        sct = 40
        srvt = 30
        control_word = "CAN_1"
        mapping = ["SS1", "SBC", "SLS_4"]
    "#,
    );
    let profile = NodeProfile::load_from_str(&doc).unwrap();
    let srdo = profile.srdo(SrdoId::new(3).unwrap()).unwrap();
    assert!(srdo.parameters().valid);
    let mapping = srdo.safety_word_mapping().unwrap().unwrap();
    assert_eq!(SafetyControlWordId::Can1, mapping.target());
    assert_eq!(
        vec![
            SafetyFunctionId::Ss1,
            SafetyFunctionId::Sbc,
            SafetyFunctionId::Sls4,
            SafetyFunctionId::None,
            SafetyFunctionId::None,
            SafetyFunctionId::None,
            SafetyFunctionId::None,
            SafetyFunctionId::None,
        ],
        mapping.decode()
    );
    assert!(profile.srdo(SrdoId::new(4).unwrap()).is_none());
}

#[test]
fn test_oversized_safe_input_mapping_is_rejected() {
    let doc = with(
        r#"
        [[srdo]]
        id = 16
        can_id1 = 0x160
        can_id2 = 0x161
        sct = 50
        srvt = 20
        control_word = "SAFEIN_1"
        mapping = ["STO", "STO", "SDIN_1", "SDIN_1", "SLS_1", "SLS_1", "NONE", "NONE", "STO"]
    "#,
    );
    let err = NodeProfile::load_from_str(&doc).unwrap_err();
    assert!(matches!(err, ProfileError::InvalidMapping { .. }), "{err}");
}

#[test]
fn test_duplicate_control_word_is_rejected() {
    let doc = with(
        r#"
        [[srdo]]
        id = 1
        can_id1 = 0x101
        can_id2 = 0x102
        sct = 50
        srvt = 20
        control_word = "CAN_1"
        mapping = ["STO"]

        [[srdo]]
        id = 2
        can_id1 = 0x103
        can_id2 = 0x104
        sct = 50
        srvt = 20
        control_word = "CAN_1"
        mapping = ["SS1"]
    "#,
    );
    let err = NodeProfile::load_from_str(&doc).unwrap_err();
    assert!(
        matches!(err, ProfileError::DuplicateControlWord { .. }),
        "{err}"
    );
}

#[test]
fn test_schema_errors() {
    // Unknown field
    let err = NodeProfile::load_from_str(&with("colour = \"red\"")).unwrap_err();
    assert!(matches!(err, ProfileError::Parse { .. }), "{err}");

    // Node ID out of range
    let err = NodeProfile::load_from_str(&MINIMAL.replace("node_id = 0x10", "node_id = 128"))
        .unwrap_err();
    assert!(matches!(err, ProfileError::Parse { .. }), "{err}");

    // Unknown safety function name
    let doc = with(
        r#"
        [[srdo]]
        id = 1
        can_id1 = 0x101
        can_id2 = 0x102
        sct = 50
        srvt = 20
        control_word = "CAN_1"
        mapping = ["STO", "SOS"]
    "#,
    );
    let err = NodeProfile::load_from_str(&doc).unwrap_err();
    assert!(matches!(err, ProfileError::Parse { .. }), "{err}");
}

#[test]
fn test_every_pdo_must_be_configured() {
    let tpdo2 = PdoSlot::tpdo(PdoId::new(2).unwrap());
    let mut profile = NodeProfile::load_from_str(MINIMAL).unwrap();
    profile.pdo_communication.retain(|pdo| pdo.slot() != tpdo2);
    let err = profile.validate().unwrap_err();
    assert!(
        matches!(err, ProfileError::MissingPdo { slot } if slot == tpdo2),
        "{err}"
    );
    assert_eq!("No communication parameters for TPDO_2", err.to_string());

    profile.pdo_communication.clear();
    assert!(profile.validate().is_err());

    // The same check applies when loading a document
    let doc = toml::to_string(&profile).unwrap();
    let err = NodeProfile::load_from_str(&doc).unwrap_err();
    assert_eq!("No communication parameters for TPDO_1", err.to_string());
}

#[test]
fn test_missing_file() {
    let err = NodeProfile::load_from_file("/nonexistent/profile.toml").unwrap_err();
    assert!(matches!(err, ProfileError::Io { .. }), "{err}");
}

#[test]
fn test_builtin_left() {
    let profile = NodeProfile::builtin("swd_left").unwrap();
    assert_eq!(4, profile.node_id.raw());
    assert!(profile.polarity);
    assert_eq!(500, profile.settle_delay_ms);
    assert_eq!(8, profile.pdo_communication.len());

    let srdo9 = profile.srdo(SrdoId::new(9).unwrap()).unwrap();
    assert_eq!(
        (0x109, 0x10A, 255, 100),
        (srdo9.can_id1, srdo9.can_id2, srdo9.sct, srdo9.srvt)
    );
    assert_eq!(Some(SafetyControlWordId::Can2), srdo9.control_word);

    let srdo16 = profile.srdo(SrdoId::new(16).unwrap()).unwrap();
    assert_eq!(
        (0x160, 0x161, 50, 20),
        (srdo16.can_id1, srdo16.can_id2, srdo16.sct, srdo16.srvt)
    );
    let mapping = srdo16.safety_word_mapping().unwrap().unwrap();
    assert_eq!(0b000011, mapping.mask_of(SafetyFunctionId::Sto));
    assert_eq!(0b001100, mapping.mask_of(SafetyFunctionId::Sdin1));
    assert_eq!(0b110000, mapping.mask_of(SafetyFunctionId::Sls1));
}

#[test]
fn test_builtin_right() {
    let profile = NodeProfile::builtin("swd_right").unwrap();
    assert_eq!(5, profile.node_id.raw());
    assert!(!profile.polarity);
    assert_eq!(1000, profile.settle_delay_ms);

    let srdo9 = profile.srdo(SrdoId::new(9).unwrap()).unwrap();
    assert_eq!(
        (0x160, 0x161, 50, 20),
        (srdo9.can_id1, srdo9.can_id2, srdo9.sct, srdo9.srvt)
    );
    assert_eq!(
        vec![
            SafetyFunctionId::Sto,
            SafetyFunctionId::Sto,
            SafetyFunctionId::Sdip1,
            SafetyFunctionId::Sdip1,
            SafetyFunctionId::Sls1,
            SafetyFunctionId::Sls1,
            SafetyFunctionId::None,
            SafetyFunctionId::None,
        ],
        srdo9.safety_word_mapping().unwrap().unwrap().decode()
    );
}

#[test]
fn test_builtin_mappings_cover_full_width() {
    for name in NodeProfile::builtin_names() {
        let profile = NodeProfile::builtin(name).unwrap();
        for srdo in &profile.srdo {
            let mapping = srdo.safety_word_mapping().unwrap().unwrap();
            assert_eq!(mapping.width(), srdo.mapping.len(), "{name} {}", srdo.id);
        }
    }
}

#[test]
fn test_builtin_cob_ids() {
    for name in NodeProfile::builtin_names() {
        let profile = NodeProfile::builtin(name).unwrap();
        let n = profile.node_id.raw() as u16;
        let expected = [
            (PdoSlot::tpdo(PdoId::new(1).unwrap()), 0x180 + n, true),
            (PdoSlot::tpdo(PdoId::new(2).unwrap()), 0x280 + n, true),
            (PdoSlot::tpdo(PdoId::new(3).unwrap()), 0x380 + n, true),
            (PdoSlot::tpdo(PdoId::new(4).unwrap()), 0x480 + n, true),
            (PdoSlot::rpdo(PdoId::new(1).unwrap()), 0x200 + n, true),
            (PdoSlot::rpdo(PdoId::new(2).unwrap()), 0x300 + n, false),
            (PdoSlot::rpdo(PdoId::new(3).unwrap()), 0x400 + n, false),
            (PdoSlot::rpdo(PdoId::new(4).unwrap()), 0x500 + n, true),
        ];
        for (slot, can_id, valid) in expected {
            let cob_id = profile
                .pdo_communication(slot)
                .unwrap()
                .parameters(profile.node_id)
                .cob_id;
            assert_eq!(can_id, cob_id.can_id, "{name} {slot}");
            assert_eq!(valid, cob_id.valid, "{name} {slot}");
        }
    }
}

#[test]
fn test_profile_serializes_back() {
    let profile = NodeProfile::builtin("right").unwrap();
    let doc = toml::to_string(&profile).unwrap();
    assert_eq!(profile, NodeProfile::load_from_str(&doc).unwrap());
}
