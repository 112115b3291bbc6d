// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The per-node parameter service endpoints.

use super::srv::{
    DescribeParameters, DescribeParametersResponse, GetParameterTypes,
    GetParameterTypesResponse, GetParameters, GetParametersResponse, ListParameters,
    ListParametersResponse, SetParameters, SetParametersAtomically,
    SetParametersAtomicallyResponse, SetParametersResponse,
};
use super::SetParametersResult;
use crate::node::Node;
use crate::service::Service;
use crate::Result;
use std::sync::{Arc, Weak};

/// Exposes a node's parameter table over six service endpoints named
/// `{node}/get_parameters`, `{node}/set_parameters` and so on.
///
/// The endpoints go through the ordinary service mechanism, so an engine
/// spinning the node dispatches parameter requests like any other service
/// callback. The callbacks hold the node weakly; the node's callback group
/// already owns the services, and a strong back-reference would keep the
/// node alive forever.
pub struct ParameterService {
    _get_parameters: Arc<Service<GetParameters>>,
    _get_parameter_types: Arc<Service<GetParameterTypes>>,
    _set_parameters: Arc<Service<SetParameters>>,
    _set_parameters_atomically: Arc<Service<SetParametersAtomically>>,
    _describe_parameters: Arc<Service<DescribeParameters>>,
    _list_parameters: Arc<Service<ListParameters>>,
}

impl ParameterService {
    /// Create the six endpoints on `node`'s default callback group.
    ///
    /// # Errors
    ///
    /// Fails when one of the service names is already taken, which happens
    /// when two `ParameterService`s are built for the same node.
    pub fn new(node: &Arc<Node>) -> Result<Self> {
        let owner: Weak<Node> = Arc::downgrade(node);

        let weak = Weak::clone(&owner);
        let get_parameters = node.create_service::<GetParameters, _>(
            &format!("{}/get_parameters", node.name()),
            move |request| GetParametersResponse {
                values: weak
                    .upgrade()
                    .map(|node| node.get_parameters(&request.names))
                    .unwrap_or_default(),
            },
            None,
        )?;

        let weak = Weak::clone(&owner);
        let get_parameter_types = node.create_service::<GetParameterTypes, _>(
            &format!("{}/get_parameter_types", node.name()),
            move |request| GetParameterTypesResponse {
                types: weak
                    .upgrade()
                    .map(|node| node.get_parameter_types(&request.names))
                    .unwrap_or_default(),
            },
            None,
        )?;

        let weak = Weak::clone(&owner);
        let set_parameters = node.create_service::<SetParameters, _>(
            &format!("{}/set_parameters", node.name()),
            move |request| SetParametersResponse {
                results: weak
                    .upgrade()
                    .map(|node| node.set_parameters(request.parameters))
                    .unwrap_or_default(),
            },
            None,
        )?;

        let weak = Weak::clone(&owner);
        let set_parameters_atomically = node.create_service::<SetParametersAtomically, _>(
            &format!("{}/set_parameters_atomically", node.name()),
            move |request| SetParametersAtomicallyResponse {
                result: match weak.upgrade() {
                    Some(node) => node.set_parameters_atomically(request.parameters),
                    None => SetParametersResult {
                        successful: false,
                        reason: "node destroyed".to_string(),
                    },
                },
            },
            None,
        )?;

        let weak = Weak::clone(&owner);
        let describe_parameters = node.create_service::<DescribeParameters, _>(
            &format!("{}/describe_parameters", node.name()),
            move |request| DescribeParametersResponse {
                descriptors: weak
                    .upgrade()
                    .map(|node| node.describe_parameters(&request.names))
                    .unwrap_or_default(),
            },
            None,
        )?;

        let weak = Weak::clone(&owner);
        let list_parameters = node.create_service::<ListParameters, _>(
            &format!("{}/list_parameters", node.name()),
            move |request| ListParametersResponse {
                result: weak
                    .upgrade()
                    .map(|node| node.list_parameters(&request.prefixes, request.depth))
                    .unwrap_or_default(),
            },
            None,
        )?;

        Ok(Self {
            _get_parameters: get_parameters,
            _get_parameter_types: get_parameter_types,
            _set_parameters: set_parameters,
            _set_parameters_atomically: set_parameters_atomically,
            _describe_parameters: describe_parameters,
            _list_parameters: list_parameters,
        })
    }
}
