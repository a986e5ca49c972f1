//! Dynamic Invocation Interface: a client-side `Request` state machine carrying a named
//! operation and its parameters to a target object, with synchronous, deferred, and one-way
//! completion paths.

pub mod server_request;

use crate::any::Any;
use crate::context::Context;
use crate::error::{CorbaError, CorbaResult};
use crate::exception::ExceptionHolder;
use crate::ior::ObjectRef;
use std::sync::Mutex;

pub use server_request::ServerRequest;

/// Request lifecycle status.
///
/// ```text
/// Init  --invoke-->        InProgress  --reply ok-->   Completed
///                                      \--exception-->  Error
///                                      \--cancel------>  Error (TRANSIENT)
/// Init  --send_deferred--> InProgress (deferred flag set)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Init,
    InProgress,
    Completed,
    Error,
}

/// Parameter passing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
    InOut,
}

/// One named, directed argument attached to a request.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub value: Any,
    pub direction: Direction,
}

#[derive(Debug, Default)]
struct Outcome {
    result: Option<Any>,
    exception: Option<ExceptionHolder>,
}

#[derive(Debug)]
struct State {
    status: Status,
    deferred: bool,
    outcome: Outcome,
}

/// A dynamically constructed invocation against a target object reference.
///
/// `Request` owns only the state machine and parameter list; the actual wire round trip is
/// driven by the sync/async transport layers, which call [`Request::complete_ok`],
/// [`Request::complete_exception`], or [`Request::complete_one_way`] once a reply (or its
/// absence) is known.
#[derive(Debug)]
pub struct Request {
    target: ObjectRef,
    operation: String,
    response_expected: bool,
    parameters: Mutex<Vec<Parameter>>,
    context: Mutex<Context>,
    state: Mutex<State>,
}

impl Request {
    /// A request expecting a reply.
    pub fn new(target: ObjectRef, operation: impl Into<String>) -> Self {
        Self::with_response_expected(target, operation, true)
    }

    /// A one-way request: no reply slot, completes as soon as it is sent.
    pub fn one_way(target: ObjectRef, operation: impl Into<String>) -> Self {
        Self::with_response_expected(target, operation, false)
    }

    fn with_response_expected(target: ObjectRef, operation: impl Into<String>, response_expected: bool) -> Self {
        Self {
            target,
            operation: operation.into(),
            response_expected,
            parameters: Mutex::new(Vec::new()),
            context: Mutex::new(Context::new()),
            state: Mutex::new(State { status: Status::Init, deferred: false, outcome: Outcome::default() }),
        }
    }

    pub fn target(&self) -> &ObjectRef {
        &self.target
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn response_expected(&self) -> bool {
        self.response_expected
    }

    pub fn add_parameter(&self, name: impl Into<String>, value: Any, direction: Direction) -> CorbaResult<()> {
        self.parameters.lock()?.push(Parameter { name: name.into(), value, direction });
        Ok(())
    }

    pub fn parameters(&self) -> CorbaResult<Vec<Parameter>> {
        Ok(self.parameters.lock()?.clone())
    }

    pub fn context(&self) -> CorbaResult<Context> {
        Ok(self.context.lock()?.clone())
    }

    pub fn set_context(&self, context: Context) -> CorbaResult<()> {
        *self.context.lock()? = context;
        Ok(())
    }

    pub fn set_context_value(&self, name: impl Into<String>, value: impl Into<String>) -> CorbaResult<()> {
        self.context.lock()?.set_one_value(name, value);
        Ok(())
    }

    pub fn status(&self) -> CorbaResult<Status> {
        Ok(self.state.lock()?.status)
    }

    /// Marks the request sent and awaiting a reply.
    pub fn mark_in_progress(&self) -> CorbaResult<()> {
        let mut state = self.state.lock()?;
        if state.status != Status::Init {
            return Err(CorbaError::Usage("request already in progress or terminal"));
        }
        state.status = Status::InProgress;
        Ok(())
    }

    /// Marks the request as deferred: the caller will poll via [`Request::poll_response`] /
    /// [`Request::get_response`] instead of blocking in `invoke`.
    pub fn send_deferred(&self) -> CorbaResult<()> {
        let mut state = self.state.lock()?;
        if state.status != Status::Init {
            return Err(CorbaError::Usage("request already in progress or terminal"));
        }
        state.status = Status::InProgress;
        state.deferred = true;
        Ok(())
    }

    /// Applies a successful reply.
    pub fn complete_ok(&self, result: Any) -> CorbaResult<()> {
        let mut state = self.state.lock()?;
        state.outcome.result = Some(result);
        state.status = Status::Completed;
        Ok(())
    }

    /// Applies an exception reply.
    pub fn complete_exception(&self, exception: ExceptionHolder) -> CorbaResult<()> {
        let mut state = self.state.lock()?;
        state.outcome.exception = Some(exception);
        state.status = Status::Error;
        Ok(())
    }

    /// Completes a one-way request once the GIOP Request message has been flushed to the
    /// transport; there is no reply to wait for.
    pub fn complete_one_way(&self) -> CorbaResult<()> {
        if self.response_expected {
            return Err(CorbaError::Usage("complete_one_way called on a two-way request"));
        }
        let mut state = self.state.lock()?;
        state.status = Status::Completed;
        Ok(())
    }

    /// Cancels an in-progress request: transitions to `Error` with a `TRANSIENT` exception.
    pub fn cancel(&self) -> CorbaResult<()> {
        use crate::exception::{CompletionStatus, SystemException, SystemExceptionKind};
        let mut state = self.state.lock()?;
        if !matches!(state.status, Status::Init | Status::InProgress) {
            return Err(CorbaError::Usage("request already terminal"));
        }
        state.outcome.exception = Some(ExceptionHolder::System(SystemException::new(
            SystemExceptionKind::Transient,
            0,
            CompletionStatus::NotCompleted,
        )));
        state.status = Status::Error;
        Ok(())
    }

    /// Non-blocking inspection of a deferred request's completion.
    pub fn poll_response(&self) -> CorbaResult<Option<Status>> {
        let state = self.state.lock()?;
        match state.status {
            Status::Completed | Status::Error => Ok(Some(state.status)),
            _ => Ok(None),
        }
    }

    /// Returns the result if complete, the propagated exception if errored, or a local error
    /// describing why no response is available yet.
    pub fn get_response(&self) -> CorbaResult<Any> {
        let state = self.state.lock()?;
        match state.status {
            Status::Completed => state.outcome.result.clone().ok_or(CorbaError::NoResponse),
            Status::Error => match state.outcome.exception.clone() {
                Some(ExceptionHolder::System(ex)) => Err(CorbaError::Remote(ex)),
                Some(ExceptionHolder::User(ex)) => Err(CorbaError::RemoteUser(ex)),
                None => Err(CorbaError::NoResponse),
            },
            Status::Init | Status::InProgress => Err(CorbaError::OperationNotComplete),
        }
    }

    /// The exception set on this request, if it errored.
    pub fn exception(&self) -> CorbaResult<Option<ExceptionHolder>> {
        Ok(self.state.lock()?.outcome.exception.clone())
    }
}
