use assertables::*;
use integration_tests::prelude::*;
use safecan_client::{
    common::{
        constants::object_ids,
        motion::SlsId,
        pdo::{ObjectAddress, PdoId},
    },
    SafetyControlWordId, SafetyFunctionId, SafetyWordMapping,
};

const NONE: SafetyFunctionId = SafetyFunctionId::None;
const STO: SafetyFunctionId = SafetyFunctionId::Sto;
const SDIN_1: SafetyFunctionId = SafetyFunctionId::Sdin1;
const SDIP_1: SafetyFunctionId = SafetyFunctionId::Sdip1;
const SLS_1: SafetyFunctionId = SafetyFunctionId::Sls1;

fn tpdo3() -> PdoSlot {
    PdoSlot::tpdo(PdoId::new(3).unwrap())
}

fn set_object(node: &mut SimNode, index: u16, sub: u8, value: u8) {
    let object = node
        .active_mut()
        .objects
        .iter_mut()
        .find(|o| o.index == index && o.sub == sub)
        .unwrap();
    object.value = value;
}

#[tokio::test(start_paused = true)]
async fn test_journal_has_one_entry_per_domain() {
    let _ = env_logger::try_init();
    let profile = NodeProfile::builtin("right").unwrap();
    let mut session = commissioned_session(&profile).await;

    verify(&mut session, &profile, VerifyOptions::default())
        .await
        .unwrap();

    // Every domain is read with exactly one call
    assert_eq!(36, session.journal().len());
    assert_eq!(session.client().calls().len(), session.journal().len());
    assert_eq!(
        "Check network parameters : OK",
        session.journal()[0].to_string()
    );
    assert_eq!(
        "Check manufacturer parameters : OK",
        session.journal()[35].to_string()
    );
    assert_eq!(16, calls_matching(session.client(), "get_srdo_parameters"));
}

#[tokio::test(start_paused = true)]
async fn test_factory_node_fails_at_network() {
    let profile = NodeProfile::builtin("left").unwrap();
    let mut session = fresh_session();

    let err = verify(&mut session, &profile, VerifyOptions::default())
        .await
        .unwrap_err();
    assert_eq!(Some(Domain::Network), err.domain());
    assert_eq!("network parameters: node_id is 127, expected 4", err.to_string());
    assert_eq!(vec!["get_network_parameters".to_string()], session.client().calls());
    assert_eq!(1, session.journal().len());
    assert!(!session.journal()[0].ok);
}

#[tokio::test(start_paused = true)]
async fn test_srdo_mismatch_stops_before_later_domains() {
    let profile = NodeProfile::builtin("right").unwrap();
    let mut session = commissioned_session(&profile).await;
    session.client_mut().active_mut().srdo[srdo(9).index()].sct = 60;

    let err = verify(&mut session, &profile, VerifyOptions::default())
        .await
        .unwrap_err();
    match &err {
        VerificationFailure::Mismatch {
            domain,
            field,
            expected,
            actual,
        } => {
            assert_eq!(Domain::Srdo(srdo(9)), *domain);
            assert_eq!("sct", field);
            assert_eq!("50", expected);
            assert_eq!("60", actual);
        }
        other => panic!("Unexpected failure {other}"),
    }
    assert_eq!("SRDO_9 parameters: sct is 60, expected 50", err.to_string());

    let node = session.client();
    assert_eq!(0, calls_matching(node, "get_safety_word_mapping"));
    assert_eq!(0, calls_matching(node, "get_velocity_mode_parameters"));
    assert_eq!(0, calls_matching(node, "get_manufacturer_parameters"));
    assert_eq!(Some(&"get_srdo_parameters(SRDO_9)".to_string()), node.calls().last());
}

#[tokio::test(start_paused = true)]
async fn test_swapped_functions_name_the_bit() {
    let profile = NodeProfile::builtin("right").unwrap();
    let mut session = commissioned_session(&profile).await;
    let swapped = SafetyWordMapping::encode(
        SafetyControlWordId::Can2,
        &[STO, STO, SLS_1, SLS_1, SDIP_1, SDIP_1, NONE, NONE],
    )
    .unwrap();
    session
        .client_mut()
        .active_mut()
        .set_safety_word_mapping(&swapped);

    let err = verify(&mut session, &profile, VerifyOptions::default())
        .await
        .unwrap_err();
    assert_eq!(
        Some(Domain::SafetyWordMapping {
            srdo: srdo(9),
            control_word: SafetyControlWordId::Can2
        }),
        err.domain()
    );
    assert_eq!(
        "SRDO_9 safety word mapping CAN_2: bit 2 is SLS_1, expected SDIP_1",
        err.to_string()
    );
    assert_eq!(
        "Check SRDO_9 safety word mapping CAN_2 : Failed",
        session.journal().last().unwrap().to_string()
    );
}

#[tokio::test(start_paused = true)]
async fn test_stray_function_on_unused_bits_fails() {
    let cases = [
        (
            "left",
            SafetyControlWordId::Can2,
            srdo(9),
            vec![STO, STO, SLS_1, STO, SDIN_1, NONE, NONE, NONE],
        ),
        (
            "right",
            SafetyControlWordId::SafeIn1,
            srdo(16),
            vec![STO, STO, SLS_1, SLS_1, NONE, NONE],
        ),
    ];
    for (name, control_word, srdo_id, functions) in cases {
        let profile = NodeProfile::builtin(name).unwrap();
        let mut session = commissioned_session(&profile).await;
        let corrupted = SafetyWordMapping::encode(control_word, &functions).unwrap();
        session
            .client_mut()
            .active_mut()
            .set_safety_word_mapping(&corrupted);

        let err = verify(&mut session, &profile, VerifyOptions::default())
            .await
            .unwrap_err();
        assert_eq!(
            Some(Domain::SafetyWordMapping {
                srdo: srdo_id,
                control_word
            }),
            err.domain(),
            "{name}"
        );
        assert_contains!(err.to_string(), "bit 2 is SLS_1, expected NONE");
    }
}

#[tokio::test(start_paused = true)]
async fn test_short_mapping_list_checks_listed_bits_only() {
    // A profile may list fewer functions than the control word width. Prefix comparison
    // then leaves the remaining bits unchecked, full width comparison requires them NONE.
    let mut profile = NodeProfile::builtin("left").unwrap();
    profile.srdo[0].mapping.truncate(2);
    let mut session = commissioned_session(&profile).await;
    let extended =
        SafetyWordMapping::encode(SafetyControlWordId::Can2, &[STO, STO, SLS_1]).unwrap();
    session
        .client_mut()
        .active_mut()
        .set_safety_word_mapping(&extended);

    verify(&mut session, &profile, VerifyOptions::default())
        .await
        .unwrap();

    let err = verify(
        &mut session,
        &profile,
        VerifyOptions {
            mapping_comparison: MappingComparison::FullWidth,
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert_eq!(
        "SRDO_9 safety word mapping CAN_2: bit 2 is SLS_1, expected NONE",
        err.to_string()
    );
}

#[tokio::test(start_paused = true)]
async fn test_collect_all_reports_in_check_order() {
    let profile = NodeProfile::builtin("right").unwrap();
    let mut session = commissioned_session(&profile).await;
    {
        let active = session.client_mut().active_mut();
        active.manufacturer.speed_pid_p = 100;
        active.sls[0].velocity_limit = 700;
        active.polarity.velocity_polarity = true;
    }

    let options = VerifyOptions {
        failure_policy: FailurePolicy::CollectAll,
        ..Default::default()
    };
    let err = verify(&mut session, &profile, options).await.unwrap_err();
    let VerificationFailure::Multiple { failures } = &err else {
        panic!("Unexpected failure {err}");
    };
    let domains: Vec<_> = failures.iter().filter_map(|f| f.domain()).collect();
    assert_eq!(
        vec![Domain::Polarity, Domain::Sls(SlsId::Sls1), Domain::Manufacturer],
        domains
    );
    assert_eq!("3 domains failed verification", err.to_string());
    assert_eq!(1, calls_matching(session.client(), "get_manufacturer_parameters"));
    assert_eq!(3, session.journal().iter().filter(|s| !s.ok).count());

    // With the default policy, only the first one is reported
    session.clear_journal();
    let err = verify(&mut session, &profile, VerifyOptions::default())
        .await
        .unwrap_err();
    assert_eq!(Some(Domain::Polarity), err.domain());
    assert!(!session.journal().last().unwrap().ok);
}

#[tokio::test(start_paused = true)]
async fn test_single_collected_failure_is_not_wrapped() {
    let profile = NodeProfile::builtin("left").unwrap();
    let mut session = commissioned_session(&profile).await;
    session.client_mut().active_mut().sto.restart_acknowledge_behavior = true;

    let options = VerifyOptions {
        failure_policy: FailurePolicy::CollectAll,
        ..Default::default()
    };
    let err = verify(&mut session, &profile, options).await.unwrap_err();
    assert!(matches!(err, VerificationFailure::Mismatch { .. }), "{err}");
    assert_contains!(err.to_string(), "restart_acknowledge_behavior");
}

#[tokio::test(start_paused = true)]
async fn test_read_failure() {
    let profile = NodeProfile::builtin("right").unwrap();
    let mut session = commissioned_session(&profile).await;
    session.client_mut().fail_call(1, Status::Timeout);

    let err = verify(&mut session, &profile, VerifyOptions::default())
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            VerificationFailure::RemoteCall {
                domain: Domain::Network,
                status: Status::Timeout
            }
        ),
        "{err}"
    );
    assert_eq!(1, session.client().calls().len());
    assert_contains!(err.to_string(), "TIMEOUT");
}

#[tokio::test(start_paused = true)]
async fn test_pdo_mapping_order_is_ignored() {
    let profile = NodeProfile::builtin("right").unwrap();
    let mut session = commissioned_session(&profile).await;
    let pdo = session.client_mut().active_mut().pdo_mut(tpdo3()).unwrap();
    pdo.mapping.items.reverse();

    verify(&mut session, &profile, VerifyOptions::default())
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_pdo_mapping_extra_item() {
    let profile = NodeProfile::builtin("right").unwrap();
    let mut session = commissioned_session(&profile).await;
    let pdo = session.client_mut().active_mut().pdo_mut(tpdo3()).unwrap();
    pdo.mapping.items.push(ObjectAddress::new(0x606C, 0, 32));
    pdo.mapping.nb = 3;

    let err = verify(&mut session, &profile, VerifyOptions::default())
        .await
        .unwrap_err();
    assert_eq!(Some(Domain::PdoMapping(tpdo3())), err.domain());
    assert_eq!("TPDO_3 mapping parameters: nb is 3, expected 2", err.to_string());
}

#[tokio::test(start_paused = true)]
async fn test_pdo_mapping_missing_item() {
    let profile = NodeProfile::builtin("left").unwrap();
    let mut session = commissioned_session(&profile).await;
    let pdo = session.client_mut().active_mut().pdo_mut(tpdo3()).unwrap();
    pdo.mapping.items[1] = ObjectAddress::new(0x606C, 0, 32);

    let err = verify(&mut session, &profile, VerifyOptions::default())
        .await
        .unwrap_err();
    assert!(
        matches!(&err, VerificationFailure::Mismatch { field, .. } if field == "items"),
        "{err}"
    );
    assert_contains!(err.to_string(), "0x6064sub0:32 mapped");
}

#[tokio::test(start_paused = true)]
async fn test_error_behavior_mismatch() {
    let profile = NodeProfile::builtin("left").unwrap();
    let mut session = commissioned_session(&profile).await;
    set_object(session.client_mut(), object_ids::ERROR_BEHAVIOR, 2, 0);

    let err = verify(&mut session, &profile, VerifyOptions::default())
        .await
        .unwrap_err();
    assert_eq!(Some(Domain::ErrorBehavior), err.domain());
    // Only the manufacturer parameters remain unchecked
    assert_eq!(0, calls_matching(session.client(), "get_manufacturer_parameters"));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_srdo_configuration() {
    let profile = NodeProfile::builtin("right").unwrap();
    let mut session = commissioned_session(&profile).await;
    set_object(
        session.client_mut(),
        object_ids::SRDO_CONFIGURATION_VALID,
        0,
        0,
    );

    let err = verify(&mut session, &profile, VerifyOptions::default())
        .await
        .unwrap_err();
    assert_eq!(Some(Domain::SrdoConfigurationValidity), err.domain());
    assert_eq!(
        "SRDO configuration validity: valid is false, expected true",
        err.to_string()
    );
}

#[tokio::test(start_paused = true)]
async fn test_unused_srdo_enabled() {
    let profile = NodeProfile::builtin("left").unwrap();
    let mut session = commissioned_session(&profile).await;
    session.client_mut().active_mut().srdo[srdo(3).index()].valid = true;

    let err = verify(&mut session, &profile, VerifyOptions::default())
        .await
        .unwrap_err();
    assert_eq!(Some(Domain::Srdo(srdo(3))), err.domain());
    assert_eq!("SRDO_3 parameters: valid is true, expected false", err.to_string());
}

#[tokio::test(start_paused = true)]
async fn test_invalid_profile_makes_no_calls() {
    let mut profile = NodeProfile::builtin("right").unwrap();
    profile.srdo[0].mapping.push(NONE);

    let mut session = commissioned_session(&NodeProfile::builtin("right").unwrap()).await;
    let err = verify(&mut session, &profile, VerifyOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, VerificationFailure::InvalidProfile { .. }), "{err}");
    assert!(session.client().calls().is_empty());
    assert!(session.journal().is_empty());
}
