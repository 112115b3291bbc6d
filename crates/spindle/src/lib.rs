// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # Spindle - wait-and-dispatch client middleware core
//!
//! A client-side middleware library for publish/subscribe and request/reply
//! messaging in robotic applications. Processes create nodes; nodes create
//! publishers, subscriptions, timers, services and clients; an executor
//! coordinates when their callbacks run.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use spindle::Node;
//!
//! fn main() -> spindle::Result<()> {
//!     spindle::init()?;
//!
//!     let node = Node::builder("listener").build()?;
//!     let _subscription = node.create_subscription::<String, _>("chatter", 10, |msg| {
//!         println!("heard: {}", msg);
//!     })?;
//!
//!     // Blocks until ctrl-c.
//!     spindle::spin(&node)
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------------+
//! |                        Application Layer                           |
//! |       Node -> Publisher/Subscription/Timer/Service/Client          |
//! +--------------------------------------------------------------------+
//! |                      Scheduling Layer                              |
//! |  Executors | Callback groups | AnyExecutable | Memory strategy     |
//! +--------------------------------------------------------------------+
//! |                     Intra-Process Layer                            |
//! |  IntraProcessManager | MappedRingBuffer | __intra notice topics    |
//! +--------------------------------------------------------------------+
//! |                       Middleware Layer                             |
//! |  rmw: handles | wait-sets | guard conditions | take/send           |
//! +--------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Node`] | Factory and registry for all communication entities |
//! | [`SingleThreadedExecutor`] | Serial wait-and-dispatch loop |
//! | [`MultiThreadedExecutor`] | The same loop on a fixed worker pool |
//! | [`CallbackGroup`] | Concurrency bucket: mutually exclusive or reentrant |
//! | [`IntraProcessManager`] | Ownership-transferring same-process delivery |
//!
//! ## Concurrency model
//!
//! Callbacks in a mutually exclusive group never overlap, across all engine
//! threads; the executor enforces this with a single atomic flag per group.
//! Reentrant groups allow full parallelism. Selection priority is timers,
//! then subscriptions, then services, then clients.
//!
//! [`shutdown`] (or SIGINT after [`init`]) is the single cancellation
//! source: it wakes every engine wait and every [`sleep_for`] in the
//! process. In-flight callbacks run to completion.

mod callback_group;
mod client;
mod context;
mod error;
mod executor;
mod memory_strategy;
mod message;
mod node;
mod publisher;
mod rate;
mod service;
mod subscription;
mod timer;

/// Intra-process message passing (ring buffers, manager).
pub mod intra_process;
/// Node parameters and the parameter RPC surface.
pub mod parameters;
/// Middleware abstraction layer (handles, wait-sets, take/send primitives).
pub mod rmw;

pub use callback_group::{CallbackGroup, CallbackGroupType};
pub use client::{Client, ClientBase, PendingResponse};
pub use context::{init, init_with_args, ok, shutdown, sigint_guard, sleep_for, Context};
pub use error::{Error, Result};
pub use executor::{
    spin, AnyExecutable, Executor, MultiThreadedExecutor, SingleThreadedExecutor,
};
pub use intra_process::{IntraProcessManager, IntraProcessMessage, MappedRingBuffer};
pub use memory_strategy::{DefaultMemoryStrategy, MemoryStrategy};
pub use message::{type_descriptor, type_id_of, Message, OwnedMessage, SharedMessage, TypeDescriptor};
pub use node::{Node, NodeBuilder, SubscriptionOptions};
pub use parameters::{
    Parameter, ParameterService, ParameterType, ParameterValue, SetParametersResult,
};
pub use publisher::Publisher;
pub use rate::Rate;
pub use service::{Service, ServiceBase, Srv};
pub use subscription::{Subscription, SubscriptionBase};
pub use timer::WallTimer;

/// Spindle version string.
pub const VERSION: &str = "0.2.0";
