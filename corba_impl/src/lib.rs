//! Do not use this crate directly.
//!
//! This is the implementation crate for `corba` and `corba_async`.
//!
//! If you need a blocking ORB, use `corba`.
//!
//! If you need an async ORB, use `corba_async`.

#![deny(missing_debug_implementations)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![cfg_attr(not(any(feature = "sync", feature = "async")), allow(unused_imports))]
#![cfg_attr(not(any(feature = "sync", feature = "async")), allow(dead_code))]

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

pub mod any;
pub mod cdr;
pub mod context;
pub mod error;
pub mod event;
pub mod exception;
pub mod giop;
pub mod ior;
pub mod marshal;
pub mod naming;
pub mod params;
pub mod request;
pub mod security;
pub mod transaction;
pub mod typecode;

#[cfg(feature = "async")]
pub mod a_sync;
#[cfg(feature = "sync")]
pub mod sync;

pub use crate::any::{Any, Value};
pub use crate::context::Context;
pub use crate::error::{CorbaError, CorbaResult};
pub use crate::exception::{
    CompletionStatus, CorbaException, ExceptionHolder, SystemException, SystemExceptionKind, UserException,
};
pub use crate::ior::{Component, IiopProfileBody, ObjectRef, Profile};
pub use crate::naming::{Name, NameComponent, NamingContext};
pub use crate::params::{ConnectParams, ConnectParamsBuilder, GiopVersion, IntoConnectParams, Tls};
pub use crate::request::{Direction, Parameter, Request, ServerRequest, Status as RequestStatus};
pub use crate::security::{SecurityCredentials, ServiceContext};
pub use crate::typecode::{get_basic, get_by_id, Kind, Label, TypeCode};

pub use crate::event::{
    Consumer, ProxyPullConsumer, ProxyPullSupplier, ProxyPushConsumer, ProxyPushSupplier, PullChannel, PushChannel,
    Supplier,
};
pub use crate::transaction::{
    Control as TransactionControl, Coordinator as TransactionCoordinator, Factory as TransactionFactory,
    RecoveryCoordinator, Resource, Status as TransactionStatus, Synchronization, Terminator as TransactionTerminator,
    Vote,
};
