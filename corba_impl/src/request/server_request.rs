//! Dynamic Skeleton Interface: the server-side counterpart to [`super::Request`], handed to a
//! servant's `invoke`.

use super::{Direction, Parameter, Request};
use crate::any::Any;
use crate::context::Context;
use crate::error::{CorbaError, CorbaResult};
use crate::exception::ExceptionHolder;
use crate::giop::{next_request_id, RequestBody};
use crate::security::ServiceContext;

/// What a servant decided to reply with.
#[derive(Debug, Clone)]
pub enum ReplyOutcome {
    Result(Any),
    Exception(ExceptionHolder),
}

/// The inbound view of an invocation a DSI servant operates on: the operation name, the object
/// key and GIOP request id it arrived under (so a servant can locate its target and a reply can
/// be correlated back to the request that prompted it), its `In`/`InOut` arguments in order, and
/// the service contexts attached to the request header.
#[derive(Debug)]
pub struct ServerRequest {
    operation: String,
    object_key: Vec<u8>,
    request_id: u32,
    arguments: Vec<Parameter>,
    contexts: Vec<ServiceContext>,
    context: Context,
    outcome: Option<ReplyOutcome>,
}

impl ServerRequest {
    pub fn new(
        operation: impl Into<String>,
        object_key: Vec<u8>,
        request_id: u32,
        arguments: Vec<Parameter>,
        contexts: Vec<ServiceContext>,
        context: Context,
    ) -> Self {
        Self { operation: operation.into(), object_key, request_id, arguments, contexts, context, outcome: None }
    }

    /// Builds a `ServerRequest` from a decoded GIOP `RequestBody`, the path a dispatcher uses:
    /// the wire body carries no parameter names or directions (those come from the servant's own
    /// operation signature), so the dispatcher supplies them alongside the body.
    pub fn from_body(body: &RequestBody, names: &[&str], directions: &[Direction], context: Context) -> Self {
        let arguments = body
            .arguments
            .iter()
            .zip(names.iter())
            .zip(directions.iter())
            .map(|((value, name), direction)| Parameter {
                name: (*name).to_string(),
                value: value.clone(),
                direction: *direction,
            })
            .collect();
        Self::new(
            body.operation.clone(),
            body.object_key.clone(),
            body.request_id,
            arguments,
            body.service_contexts.clone(),
            context,
        )
    }

    /// Builds a `ServerRequest` from a client-side `Request`, carrying over its operation name,
    /// target object key, `In`/`InOut` parameter values (its `Out` parameters are the servant's
    /// to fill, not the caller's), and its `CORBA::Context` property list. Mints a fresh GIOP
    /// request id since a client-side `Request` has none of its own until a transport layer
    /// assigns one for the wire.
    pub fn from_request(request: &Request, contexts: Vec<ServiceContext>) -> CorbaResult<Self> {
        let object_key = request.target().primary_iiop_profile()?.map(|p| p.object_key).unwrap_or_default();
        let arguments = request
            .parameters()?
            .into_iter()
            .filter(|p| matches!(p.direction, Direction::In | Direction::InOut))
            .collect();
        Ok(Self::new(
            request.operation().to_string(),
            object_key,
            next_request_id(),
            arguments,
            contexts,
            request.context()?,
        ))
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn object_key(&self) -> &[u8] {
        &self.object_key
    }

    pub fn request_id(&self) -> u32 {
        self.request_id
    }

    pub fn arguments(&self) -> &[Parameter] {
        &self.arguments
    }

    pub fn argument(&self, name: &str) -> Option<&Any> {
        self.arguments.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    pub fn contexts(&self) -> &[ServiceContext] {
        &self.contexts
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn set_result(&mut self, result: Any) {
        self.outcome = Some(ReplyOutcome::Result(result));
    }

    pub fn set_exception(&mut self, exception: ExceptionHolder) {
        self.outcome = Some(ReplyOutcome::Exception(exception));
    }

    /// Consumes the request, yielding what the servant decided to reply with.
    pub fn into_outcome(self) -> CorbaResult<ReplyOutcome> {
        self.outcome.ok_or(CorbaError::Impl("servant did not set a result or exception"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::any::Value;
    use crate::typecode::{get_basic, Kind};

    fn target() -> crate::ior::ObjectRef {
        let body = crate::ior::IiopProfileBody::new(1, 2, "localhost", 8099, b"Calc".to_vec());
        crate::ior::ObjectRef::new("IDL:Calc:1.0", vec![crate::ior::Profile::iiop(&body)]).unwrap()
    }

    #[test]
    fn from_request_carries_in_and_inout_but_not_out_parameters() {
        let req = Request::new(target(), "add");
        req.add_parameter("a", Any::new(get_basic(Kind::Long), Value::Long(1)).unwrap(), Direction::In).unwrap();
        req.add_parameter("b", Any::new(get_basic(Kind::Long), Value::Long(2)).unwrap(), Direction::InOut).unwrap();
        req.add_parameter("c", Any::new(get_basic(Kind::Long), Value::Long(0)).unwrap(), Direction::Out).unwrap();

        req.set_context_value("locale", "en_US").unwrap();

        let server_req = ServerRequest::from_request(&req, vec![]).unwrap();
        assert_eq!(server_req.operation(), "add");
        assert_eq!(server_req.object_key(), b"Calc");
        assert_eq!(server_req.arguments().len(), 2);
        assert_eq!(server_req.argument("a").unwrap().value(), &Value::Long(1));
        assert!(server_req.argument("c").is_none());
        assert_eq!(server_req.context().get_value("locale"), Some("en_US"));
    }

    #[test]
    fn from_body_carries_object_key_and_request_id() {
        let body = RequestBody {
            request_id: 7,
            response_expected: true,
            object_key: b"Calc".to_vec(),
            operation: "add".into(),
            service_contexts: vec![],
            arguments: vec![Any::new(get_basic(Kind::Long), Value::Long(1)).unwrap()],
        };
        let server_req = ServerRequest::from_body(&body, &["a"], &[Direction::In], Context::new());
        assert_eq!(server_req.request_id(), 7);
        assert_eq!(server_req.object_key(), b"Calc");
        assert_eq!(server_req.argument("a").unwrap().value(), &Value::Long(1));
    }

    #[test]
    fn into_outcome_without_a_result_is_an_impl_error() {
        let server_req = ServerRequest::new("noop", vec![], 0, vec![], vec![], Context::new());
        let err = server_req.into_outcome().unwrap_err();
        assert!(matches!(err, CorbaError::Impl(_)));
    }

    #[test]
    fn set_result_round_trips_through_outcome() {
        let mut server_req = ServerRequest::new("add", vec![], 0, vec![], vec![], Context::new());
        server_req.set_result(Any::new(get_basic(Kind::Long), Value::Long(42)).unwrap());
        match server_req.into_outcome().unwrap() {
            ReplyOutcome::Result(any) => assert_eq!(any.value(), &Value::Long(42)),
            ReplyOutcome::Exception(_) => panic!("expected result"),
        }
    }
}
