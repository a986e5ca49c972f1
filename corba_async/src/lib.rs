//! A pure Rust, asynchronous CORBA/IIOP client and server runtime, built on `tokio`.
//!
//! `corba_async` exposes the same surface as `corba` — [`ObjectRef`], [`Request`]/
//! [`ServerRequest`], the [`TypeCode`]/[`Any`] dynamic typing system, and the standard
//! [`NamingContext`], event channel, and [`transaction`] services — driven over
//! `tokio::net::TcpStream` instead of a blocking socket.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_debug_implementations)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub use corba_impl::{
    any, cdr, context, error, event, exception, giop, ior, marshal, naming, params, request, security, transaction,
    typecode,
};

pub use corba_impl::{
    get_basic, get_by_id, Any, CompletionStatus, Component, ConnectParams, ConnectParamsBuilder, Consumer, Context,
    CorbaError, CorbaException, CorbaResult, Direction, ExceptionHolder, GiopVersion, IiopProfileBody,
    IntoConnectParams, Kind, Label, Name, NameComponent, NamingContext, ObjectRef, Parameter, Profile,
    ProxyPullConsumer, ProxyPullSupplier, ProxyPushConsumer, ProxyPushSupplier, PullChannel, PushChannel, Request,
    RequestStatus, RecoveryCoordinator, Resource, SecurityCredentials, ServerRequest, ServiceContext, Supplier,
    SystemException, SystemExceptionKind, Synchronization, Tls, TransactionControl, TransactionCoordinator,
    TransactionFactory, TransactionStatus, TransactionTerminator, TypeCode, UserException, Value, Vote,
};

/// Drives a [`Request`] through one invocation round trip over a `tokio::net::TcpStream` to its
/// target's primary IIOP profile.
pub use corba_impl::a_sync::{invoke, invoke_with_contexts};
