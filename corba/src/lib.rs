//! A pure Rust, synchronous CORBA/IIOP client and server runtime.
//!
//! `corba` gives you the pieces of a distributed-object ORB: [`ObjectRef`] (the Interoperable
//! Object Reference), [`Request`]/[`ServerRequest`] (the dynamic invocation and dispatch
//! objects), the [`TypeCode`]/[`Any`] dynamic typing system, and the standard
//! [`NamingContext`], event channel, and [`transaction`] services — all built on blocking
//! `std::net::TcpStream` transport.
//!
//! If you need an asynchronous ORB, use `corba_async` instead; it exposes the same surface on
//! top of `tokio`.

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

/// Drives a [`Request`] through one blocking invocation round trip over a `TcpStream` to its
/// target's primary IIOP profile.
pub use corba_impl::sync::{invoke, invoke_with_contexts};
