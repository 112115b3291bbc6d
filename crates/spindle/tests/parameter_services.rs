// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// The parameter RPC surface rides the ordinary service mechanism; a plain
// executor drain must serve it like any other service.

use spindle::parameters::srv::{
    GetParameters, GetParametersRequest, ListParameters, ListParametersRequest, SetParameters,
    SetParametersRequest,
};
use spindle::{Node, Parameter, ParameterService, ParameterValue, SingleThreadedExecutor};
use std::time::Duration;

#[test]
fn test_parameters_are_served_through_services() {
    let _ = env_logger::try_init();

    let node = Node::new("param_node").expect("node");
    let _parameter_service = ParameterService::new(&node).expect("parameter service");

    let set_client = node
        .create_client::<SetParameters>("param_node/set_parameters", None)
        .expect("set client");
    let get_client = node
        .create_client::<GetParameters>("param_node/get_parameters", None)
        .expect("get client");
    let list_client = node
        .create_client::<ListParameters>("param_node/list_parameters", None)
        .expect("list client");

    let executor = SingleThreadedExecutor::new();
    executor.add_node(&node, true);

    let pending_set = set_client
        .call_async(SetParametersRequest {
            parameters: vec![
                Parameter::new("drive.max_speed", ParameterValue::Double(2.0)),
                Parameter::new("drive.reversed", ParameterValue::Bool(false)),
            ],
        })
        .expect("set call");
    executor.spin_some().expect("spin_some");
    let set_response = pending_set
        .wait_timeout(Duration::from_secs(1))
        .expect("set response");
    assert!(set_response.results.iter().all(|result| result.successful));

    let pending_get = get_client
        .call_async(GetParametersRequest {
            names: vec!["drive.max_speed".to_string(), "missing".to_string()],
        })
        .expect("get call");
    executor.spin_some().expect("spin_some");
    let get_response = pending_get
        .wait_timeout(Duration::from_secs(1))
        .expect("get response");
    assert_eq!(
        get_response.values,
        vec![ParameterValue::Double(2.0), ParameterValue::NotSet]
    );

    let pending_list = list_client
        .call_async(ListParametersRequest {
            prefixes: vec!["drive".to_string()],
            depth: 1,
        })
        .expect("list call");
    executor.spin_some().expect("spin_some");
    let list_response = pending_list
        .wait_timeout(Duration::from_secs(1))
        .expect("list response");
    let mut names = list_response.result.names;
    names.sort();
    assert_eq!(names, vec!["drive.max_speed", "drive.reversed"]);
}

#[test]
fn test_duplicate_parameter_service_is_rejected() {
    let node = Node::new("param_twice").expect("node");
    let _first = ParameterService::new(&node).expect("first");
    assert!(ParameterService::new(&node).is_err());
}
